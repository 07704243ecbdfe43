//! Confirmed output towards a single downstream collector

use bytes::Bytes;

use crate::channel::{ChannelError, Delivery, OutputChannel};
use crate::envelope::{Envelope, Kind};
use crate::stats::ChannelStats;
use crate::transport::Link;

/// Reliable output to one downstream [`ConfirmedInput`]
///
/// Announces itself with `Hello` and counts envelopes that the downstream
/// has not confirmed yet.
///
/// [`ConfirmedInput`]: crate::channel::ConfirmedInput
#[derive(Debug)]
pub struct ConfirmedOutput {
    link: Link,
    unconfirmed: u64,
    closed: bool,
    stats: ChannelStats,
}

impl ConfirmedOutput {
    /// Create the output and announce it downstream
    pub fn new(link: Link) -> Self {
        let mut output = Self {
            link,
            unconfirmed: 0,
            closed: false,
            stats: ChannelStats::new("confirmed_output"),
        };

        if let Err(e) = output.transmit(Envelope::new(Kind::Hello, Bytes::new())) {
            tracing::warn!(error = %e, "Failed to announce to downstream");
        }
        output
    }

    /// Envelopes sent but not yet confirmed
    pub fn unconfirmed(&self) -> u64 {
        self.unconfirmed
    }

    fn transmit(&mut self, envelope: Envelope) -> Result<(), ChannelError> {
        match self.link.try_send(envelope) {
            Ok(()) => {
                self.unconfirmed += 1;
                self.stats.messages += 1;
                Ok(())
            }
            Err(e) => {
                self.stats.failures += 1;
                Err(e)
            }
        }
    }

    fn on_downstream(&mut self, envelope: Envelope) {
        match envelope.kind() {
            Kind::Confirm => {
                self.unconfirmed = self.unconfirmed.saturating_sub(1);
            }
            kind => {
                tracing::trace!(kind = %kind, "Ignoring downstream message");
            }
        }
    }
}

impl OutputChannel for ConfirmedOutput {
    fn send(&mut self, envelope: Envelope) -> Result<Delivery, ChannelError> {
        self.transmit(envelope.without_identity())?;
        Ok(Delivery::Sent)
    }

    fn clear(&mut self) {
        self.unconfirmed = 0;
    }

    async fn service(&mut self) {
        if self.closed {
            return std::future::pending().await;
        }

        match self.link.recv().await {
            Some(envelope) => self.on_downstream(envelope),
            None => {
                self.closed = true;
                tracing::warn!("Downstream transport closed");
            }
        }
    }

    fn stats(&self) -> ChannelStats {
        ChannelStats {
            pending: self.unconfirmed as usize,
            peers: usize::from(!self.closed),
            ..self.stats.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::envelope::Identity;

    use super::*;

    #[tokio::test]
    async fn test_hello_then_forward_without_identity() {
        let (link, mut downstream) = Link::pair(8);
        let mut output = ConfirmedOutput::new(link);

        assert!(downstream.recv().await.unwrap().is_kind(Kind::Hello));

        let env = Envelope::event(Bytes::from_static(b"E1")).with_identity(Identity::from("w1"));
        assert_eq!(output.send(env), Ok(Delivery::Sent));

        let forwarded = downstream.recv().await.unwrap();
        assert!(!forwarded.has_identity());
        assert_eq!(forwarded.payload(), &Bytes::from_static(b"E1"));
    }

    #[tokio::test]
    async fn test_confirms_reduce_unconfirmed() {
        let (link, downstream) = Link::pair(8);
        let mut output = ConfirmedOutput::new(link);

        output.send(Envelope::event(Bytes::from_static(b"E1"))).unwrap();
        assert_eq!(output.unconfirmed(), 2);

        downstream.try_send(Envelope::signal(Kind::Confirm)).unwrap();
        output.service().await;
        assert_eq!(output.unconfirmed(), 1);

        output.clear();
        assert_eq!(output.unconfirmed(), 0);
        assert_eq!(output.stats().pending, 0);
    }

    #[tokio::test]
    async fn test_disconnected_downstream_is_reported() {
        let (link, downstream) = Link::pair(8);
        let mut output = ConfirmedOutput::new(link);
        drop(downstream);

        assert_eq!(
            output.send(Envelope::event(Bytes::new())),
            Err(ChannelError::Disconnected)
        );
        assert_eq!(output.stats().failures, 1);
    }
}
