//! Completion tracking for socket writer tasks
//!
//! Every writer task holds a [`WriterToken`]. Once the router has released
//! its channels the writers drain their queues, shut their sockets down and
//! drop their tokens; [`Writers::finish`] resolves when the last one is gone.

use std::time::Duration;

use tokio::sync::mpsc;

/// Held by a writer task for as long as it may still write
#[derive(Debug, Clone)]
pub struct WriterToken {
    _alive: mpsc::Sender<()>,
}

/// Issues tokens and waits for all of them to be dropped
#[derive(Debug)]
pub struct Writers {
    alive: mpsc::Sender<()>,
    done: mpsc::Receiver<()>,
}

impl Writers {
    pub fn new() -> Self {
        let (alive, done) = mpsc::channel(1);
        Self { alive, done }
    }

    /// Token for a new writer task
    pub fn token(&self) -> WriterToken {
        WriterToken {
            _alive: self.alive.clone(),
        }
    }

    /// Wait until every writer has finished, at most `timeout`
    ///
    /// Returns `false` if some writer was still running at the deadline.
    pub async fn finish(self, timeout: Duration) -> bool {
        let Writers { alive, mut done } = self;
        drop(alive);
        tokio::time::timeout(timeout, done.recv()).await.is_ok()
    }
}

impl Default for Writers {
    fn default() -> Self {
        Self::new()
    }
}
