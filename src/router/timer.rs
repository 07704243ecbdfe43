//! One-shot idle timer
//!
//! Armed by an end-of-run signal, pushed back by every inbound envelope, and
//! disarmed when it fires. The router awaits [`IdleTimer::expired`] inside its
//! tick; an unarmed timer never fires.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};

#[derive(Debug, Clone)]
pub struct IdleTimer {
    duration: Duration,
    deadline: Option<Instant>,
}

impl IdleTimer {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            deadline: None,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Start (or restart) the countdown
    pub fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.duration);
    }

    /// Restart the countdown if armed; no effect otherwise
    pub fn touch(&mut self) {
        if self.is_armed() {
            self.arm();
        }
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    /// Resolves at the current deadline; pending forever when disarmed
    ///
    /// The future does not borrow the timer. Re-arming after it was created
    /// takes effect on the next call.
    pub fn expired(&self) -> impl Future<Output = ()> + Send + 'static {
        let deadline = self.deadline;
        async move {
            match deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        }
    }
}
