//! Raw output with a region-of-interest side channel

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::channel::{ChannelError, Delivery, OutputChannel};
use crate::envelope::Envelope;
use crate::stats::ChannelStats;

use super::raw::RawOutput;

/// Main payloads to a data sink, ROI payloads to a second sink
#[derive(Debug)]
pub struct RawWithSideChannel {
    data: RawOutput,
    roi: RawOutput,
}

impl RawWithSideChannel {
    /// Create from two sinks sharing the same framing
    pub fn new(data: mpsc::Sender<Bytes>, roi: mpsc::Sender<Bytes>, add_length_prefix: bool) -> Self {
        Self {
            data: RawOutput::new(data, add_length_prefix).named("data_output"),
            roi: RawOutput::new(roi, add_length_prefix).named("roi_output"),
        }
    }
}

impl OutputChannel for RawWithSideChannel {
    fn send(&mut self, envelope: Envelope) -> Result<Delivery, ChannelError> {
        if !envelope.kind().is_data() {
            return Ok(Delivery::Absorbed);
        }

        let delivery = self.data.write(envelope.payload())?;
        if let Some(roi) = envelope.roi() {
            self.roi.write(roi)?;
        }
        Ok(delivery)
    }

    fn can_send(&self) -> bool {
        self.data.can_send() && self.roi.can_send()
    }

    fn clear(&mut self) {}

    async fn service(&mut self) {
        tokio::select! {
            _ = self.data.service() => {}
            _ = self.roi.service() => {}
        }
    }

    fn stats(&self) -> ChannelStats {
        self.data.stats()
    }

    fn side_stats(&self) -> Option<ChannelStats> {
        Some(self.roi.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roi_goes_to_side_sink() {
        let (data_tx, mut data_rx) = mpsc::channel(4);
        let (roi_tx, mut roi_rx) = mpsc::channel(4);
        let mut output = RawWithSideChannel::new(data_tx, roi_tx, false);

        let env = Envelope::raw_data(Bytes::from_static(b"hits")).with_roi(Bytes::from_static(b"roi"));
        assert_eq!(output.send(env), Ok(Delivery::Sent));

        assert_eq!(data_rx.try_recv().unwrap(), Bytes::from_static(b"hits"));
        assert_eq!(roi_rx.try_recv().unwrap(), Bytes::from_static(b"roi"));
    }

    #[test]
    fn test_without_roi_only_data_is_written() {
        let (data_tx, mut data_rx) = mpsc::channel(4);
        let (roi_tx, mut roi_rx) = mpsc::channel(4);
        let mut output = RawWithSideChannel::new(data_tx, roi_tx, true);

        output.send(Envelope::event(Bytes::from_static(b"E"))).unwrap();

        assert_eq!(data_rx.try_recv().unwrap(), Bytes::from_static(&[0, 0, 0, 1, b'E']));
        assert!(roi_rx.try_recv().is_err());
        assert_eq!(output.stats().messages, 1);
        assert_eq!(output.side_stats().unwrap().messages, 0);
    }

    #[test]
    fn test_full_roi_sink_blocks_sending() {
        let (data_tx, _data_rx) = mpsc::channel(4);
        let (roi_tx, _roi_rx) = mpsc::channel(1);
        let mut output = RawWithSideChannel::new(data_tx, roi_tx, false);
        assert!(output.can_send());

        let env = Envelope::raw_data(Bytes::from_static(b"d")).with_roi(Bytes::from_static(b"r"));
        output.send(env).unwrap();
        assert!(!output.can_send());
    }

    #[test]
    fn test_failed_roi_write_is_reported() {
        let (data_tx, _data_rx) = mpsc::channel(4);
        let (roi_tx, roi_rx) = mpsc::channel(4);
        let mut output = RawWithSideChannel::new(data_tx, roi_tx, false);
        drop(roi_rx);

        let env = Envelope::raw_data(Bytes::from_static(b"d")).with_roi(Bytes::from_static(b"r"));
        assert_eq!(output.send(env), Err(ChannelError::Disconnected));
        assert_eq!(output.side_stats().unwrap().failures, 1);
    }
}
