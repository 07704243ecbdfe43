//! Best-effort input pulling from an upstream load balancer
//!
//! The input announces itself and hands the upstream a fixed number of
//! `Ready` credits. Every data envelope received consumes one credit, so a
//! fresh `Ready` is returned right after it arrives. With a concurrency of 1
//! the upstream never has more than one event in flight towards us.

use std::time::Duration;

use crate::channel::InputChannel;
use crate::envelope::{Envelope, Kind};
use crate::stats::ChannelStats;
use crate::transport::Link;

/// Load-balanced input with fixed concurrency
#[derive(Debug)]
pub struct LoadBalancedInput {
    link: Link,
    concurrency: usize,
    closed: bool,
    stats: ChannelStats,
}

impl LoadBalancedInput {
    /// Create the input and announce `concurrency` credits upstream
    pub fn new(link: Link, concurrency: usize) -> Self {
        let mut input = Self {
            link,
            concurrency: concurrency.max(1),
            closed: false,
            stats: ChannelStats::new("load_balanced_input"),
        };
        input.announce();
        input
    }

    /// Number of credits kept outstanding upstream
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    fn announce(&mut self) {
        self.request(Kind::Hello);
        for _ in 0..self.concurrency {
            self.request(Kind::Ready);
        }
    }

    fn request(&mut self, kind: Kind) {
        if let Err(e) = self.link.try_send(Envelope::signal(kind)) {
            self.stats.failures += 1;
            tracing::warn!(kind = %kind, error = %e, "Failed to reach upstream");
        }
    }
}

impl InputChannel for LoadBalancedInput {
    async fn poll(&mut self, wait: Duration) -> Option<Envelope> {
        if self.closed {
            tokio::time::sleep(wait).await;
            return None;
        }

        match tokio::time::timeout(wait, self.link.recv()).await {
            Ok(Some(envelope)) => {
                self.stats.messages += 1;
                if envelope.kind().is_data() {
                    self.request(Kind::Ready);
                }
                Some(envelope)
            }
            Ok(None) => {
                self.closed = true;
                tracing::info!("Upstream transport closed");
                None
            }
            Err(_) => None,
        }
    }

    fn clear(&mut self) {}

    fn flush_backlog(&mut self) -> Option<Envelope> {
        None
    }

    fn stats(&self) -> ChannelStats {
        ChannelStats {
            peers: usize::from(!self.closed),
            ..self.stats.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[tokio::test]
    async fn test_announces_hello_and_credits() {
        let (link, mut upstream) = Link::pair(8);
        let _input = LoadBalancedInput::new(link, 2);

        assert!(upstream.recv().await.unwrap().is_kind(Kind::Hello));
        assert!(upstream.recv().await.unwrap().is_kind(Kind::Ready));
        assert!(upstream.recv().await.unwrap().is_kind(Kind::Ready));
        assert!(upstream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_data_returns_one_credit() {
        let (link, mut upstream) = Link::pair(8);
        let mut input = LoadBalancedInput::new(link, 1);
        while upstream.try_recv().is_some() {}

        upstream.try_send(Envelope::event(Bytes::from_static(b"X"))).unwrap();
        upstream.try_send(Envelope::signal(Kind::Terminate)).unwrap();

        let first = input.poll(Duration::from_millis(10)).await.unwrap();
        assert!(first.is_kind(Kind::Event));
        assert!(upstream.try_recv().unwrap().is_kind(Kind::Ready));

        let second = input.poll(Duration::from_millis(10)).await.unwrap();
        assert!(second.is_kind(Kind::Terminate));
        assert!(upstream.try_recv().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_times_out_empty() {
        let (link, _upstream) = Link::pair(8);
        let mut input = LoadBalancedInput::new(link, 1);

        assert_eq!(input.poll(Duration::from_millis(50)).await, None);
        assert_eq!(input.flush_backlog(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_upstream_is_not_an_error() {
        let (link, upstream) = Link::pair(8);
        let mut input = LoadBalancedInput::new(link, 1);
        drop(upstream);

        assert_eq!(input.poll(Duration::from_millis(50)).await, None);
        assert_eq!(input.poll(Duration::from_millis(50)).await, None);
        assert_eq!(input.stats().peers, 0);
    }
}
