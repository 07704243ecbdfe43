//! Raw byte-stream output
//!
//! Writes event payloads to a plain byte sink (storage, event builder). With
//! `add_length_prefix` every payload is preceded by its length as a
//! big-endian `u32` so the consumer can re-split the stream:
//!
//! ```text
//! +-----------+------------+-----------+------------+
//! | Len(4)    | Payload... | Len(4)    | Payload... |
//! +-----------+------------+-----------+------------+
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::channel::{ChannelError, Delivery, OutputChannel};
use crate::envelope::Envelope;
use crate::stats::ChannelStats;

/// Stateless output writing payload bytes to a single sink
#[derive(Debug)]
pub struct RawOutput {
    sink: mpsc::Sender<Bytes>,
    add_length_prefix: bool,
    stats: ChannelStats,
}

impl RawOutput {
    /// Create a raw output
    pub fn new(sink: mpsc::Sender<Bytes>, add_length_prefix: bool) -> Self {
        Self {
            sink,
            add_length_prefix,
            stats: ChannelStats::new("raw_output"),
        }
    }

    /// Rename for monitoring (e.g. a second sink)
    pub fn named(mut self, name: &'static str) -> Self {
        self.stats.name = name;
        self
    }

    /// Bytes that go on the wire for a payload
    pub fn frame(&self, payload: &Bytes) -> Result<Bytes, ChannelError> {
        if !self.add_length_prefix {
            return Ok(payload.clone());
        }

        let len = length_prefix(payload.len())?;
        let mut buf = BytesMut::with_capacity(4 + payload.len());
        buf.put_u32(len);
        buf.extend_from_slice(payload);
        Ok(buf.freeze())
    }

    /// Write one payload to the sink
    pub fn write(&mut self, payload: &Bytes) -> Result<Delivery, ChannelError> {
        let framed = match self.frame(payload) {
            Ok(framed) => framed,
            Err(e) => {
                self.stats.failures += 1;
                tracing::warn!(size = payload.len(), "Payload too large for length prefix");
                return Err(e);
            }
        };
        match self.sink.try_send(framed) {
            Ok(()) => {
                self.stats.messages += 1;
                Ok(Delivery::Sent)
            }
            Err(e) => {
                self.stats.failures += 1;
                Err(match e {
                    TrySendError::Full(_) => ChannelError::Full,
                    TrySendError::Closed(_) => ChannelError::Disconnected,
                })
            }
        }
    }
}

fn length_prefix(len: usize) -> Result<u32, ChannelError> {
    u32::try_from(len).map_err(|_| ChannelError::TooLarge)
}

impl OutputChannel for RawOutput {
    fn send(&mut self, envelope: Envelope) -> Result<Delivery, ChannelError> {
        if !envelope.kind().is_data() {
            tracing::trace!(kind = %envelope.kind(), "Nothing to write for marker");
            return Ok(Delivery::Absorbed);
        }
        self.write(envelope.payload())
    }

    fn can_send(&self) -> bool {
        self.sink.is_closed() || self.sink.capacity() > 0
    }

    fn clear(&mut self) {}

    /// Resolves once a full sink has room again
    async fn service(&mut self) {
        if self.sink.capacity() == 0 {
            if let Ok(permit) = self.sink.reserve().await {
                drop(permit);
                return;
            }
        }
        std::future::pending().await
    }

    fn stats(&self) -> ChannelStats {
        ChannelStats {
            peers: usize::from(!self.sink.is_closed()),
            ..self.stats.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_pending, assert_ready, task};

    use crate::envelope::Kind;

    use super::*;

    #[test]
    fn test_writes_payload_verbatim() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut output = RawOutput::new(tx, false);

        assert_eq!(
            output.send(Envelope::raw_data(Bytes::from_static(b"abc"))),
            Ok(Delivery::Sent)
        );
        assert_eq!(rx.try_recv().unwrap(), Bytes::from_static(b"abc"));
    }

    #[test]
    fn test_length_prefix() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut output = RawOutput::new(tx, true);

        output.send(Envelope::event(Bytes::from_static(b"abc"))).unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            Bytes::from_static(&[0, 0, 0, 3, b'a', b'b', b'c'])
        );
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_length_prefix_must_fit_u32() {
        assert_eq!(length_prefix(3), Ok(3));
        assert_eq!(length_prefix(u32::MAX as usize), Ok(u32::MAX));
        assert_eq!(length_prefix(u32::MAX as usize + 1), Err(ChannelError::TooLarge));
    }

    #[test]
    fn test_markers_are_absorbed() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut output = RawOutput::new(tx, true);

        assert_eq!(
            output.send(Envelope::signal(Kind::Terminate)),
            Ok(Delivery::Absorbed)
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_sink_refuses_until_drained() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut output = RawOutput::new(tx, false);
        assert!(output.can_send());

        output.send(Envelope::event(Bytes::from_static(b"1"))).unwrap();
        assert!(!output.can_send());

        let mut service = task::spawn(output.service());
        assert_pending!(service.poll());

        assert_eq!(rx.recv().await, Some(Bytes::from_static(b"1")));
        assert!(service.is_woken());
        assert_ready!(service.poll());
        drop(service);
        assert!(output.can_send());
    }

    #[test]
    fn test_full_and_closed_sink() {
        let (tx, rx) = mpsc::channel(1);
        let mut output = RawOutput::new(tx, false);

        output.send(Envelope::event(Bytes::from_static(b"1"))).unwrap();
        assert_eq!(
            output.send(Envelope::event(Bytes::from_static(b"2"))),
            Err(ChannelError::Full)
        );

        drop(rx);
        assert_eq!(
            output.send(Envelope::event(Bytes::from_static(b"3"))),
            Err(ChannelError::Disconnected)
        );
        assert_eq!(output.stats().failures, 2);
        assert_eq!(output.stats().peers, 0);
    }
}
