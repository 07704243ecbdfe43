//! Duplex envelope queue between a channel and its transport

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::channel::ChannelError;
use crate::envelope::Envelope;

use super::codec;

/// One end of a bidirectional, bounded envelope queue
///
/// Sending never blocks: a full queue is reported as [`ChannelError::Full`]
/// so the router's tick stays non-blocking.
#[derive(Debug)]
pub struct Link {
    tx: mpsc::Sender<Envelope>,
    rx: mpsc::Receiver<Envelope>,
}

impl Link {
    /// Wrap an outbound sender and an inbound receiver
    pub fn new(tx: mpsc::Sender<Envelope>, rx: mpsc::Receiver<Envelope>) -> Self {
        Self { tx, rx }
    }

    /// Create two connected in-process ends
    pub fn pair(capacity: usize) -> (Link, Link) {
        let (a_tx, b_rx) = mpsc::channel(capacity);
        let (b_tx, a_rx) = mpsc::channel(capacity);
        (Link::new(a_tx, a_rx), Link::new(b_tx, b_rx))
    }

    /// Queue an envelope for the transport without waiting
    ///
    /// Envelopes too large to frame are refused here rather than by the
    /// receiving peer.
    pub fn try_send(&self, envelope: Envelope) -> Result<(), ChannelError> {
        codec::frame_body_len(&envelope).map_err(|_| ChannelError::TooLarge)?;
        self.tx.try_send(envelope).map_err(|e| match e {
            TrySendError::Full(_) => ChannelError::Full,
            TrySendError::Closed(_) => ChannelError::Disconnected,
        })
    }

    /// Receive the next inbound envelope; `None` once the transport is gone
    ///
    /// Cancel safe.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }

    /// Receive without waiting
    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.rx.try_recv().ok()
    }
}
