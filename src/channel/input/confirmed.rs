//! Confirmed input
//!
//! Receives from any number of upstream peers on a bound endpoint and
//! acknowledges every meaningful envelope with a `Confirm` addressed back to
//! its sender, so the sender can release (or re-send) its copy.
//!
//! Run-end and shutdown are collective: each peer sends its own `LastEvent`
//! and `Terminate`, and the input only lets a single identity-less marker
//! through once every registered peer has sent one. If some peers never do,
//! the router's idle timer calls [`flush_backlog`] to close the run anyway.
//!
//! [`flush_backlog`]: InputChannel::flush_backlog

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;

use crate::channel::{ChannelError, InputChannel};
use crate::envelope::{Envelope, Identity, Kind};
use crate::stats::ChannelStats;
use crate::transport::Link;

/// Per-peer progress within the current run
#[derive(Debug, Clone, Default)]
struct PeerProgress {
    events: u64,
    stopped: bool,
    terminated: bool,
}

impl PeerProgress {
    fn is_pending(&self) -> bool {
        self.events > 0 || self.stopped
    }
}

/// Reliable multi-peer input
#[derive(Debug)]
pub struct ConfirmedInput {
    link: Link,
    peers: HashMap<Identity, PeerProgress>,
    closed: bool,
    stats: ChannelStats,
}

impl ConfirmedInput {
    /// Create an input over a bound endpoint
    pub fn new(link: Link) -> Self {
        Self {
            link,
            peers: HashMap::new(),
            closed: false,
            stats: ChannelStats::new("confirmed_input"),
        }
    }

    /// Number of registered upstream peers
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Whether any peer has progress in the current run
    pub fn has_backlog(&self) -> bool {
        self.peers.values().any(PeerProgress::is_pending)
    }

    fn confirm(&mut self, envelope: &Envelope) -> Result<(), ChannelError> {
        let identity = envelope
            .identity()
            .map_err(|_| ChannelError::MissingIdentity)?;
        self.link.try_send(Envelope::addressed(
            Kind::Confirm,
            identity.clone(),
            Bytes::new(),
        ))
    }

    fn progress(&mut self, identity: &Identity) -> &mut PeerProgress {
        if !self.peers.contains_key(identity) {
            tracing::info!(peer = %identity, peers = self.peers.len() + 1, "Upstream peer registered");
        }
        self.peers.entry(identity.clone()).or_default()
    }

    /// Bookkeeping for one inbound envelope; returns what the router should see
    fn accept(&mut self, envelope: Envelope) -> Option<Envelope> {
        self.stats.messages += 1;

        let kind = envelope.kind();
        let identity = match envelope.identity() {
            Ok(identity) => identity.clone(),
            Err(e) => {
                tracing::warn!(error = %e, "Unaddressed envelope on confirmed input");
                return Some(envelope);
            }
        };

        if kind == Kind::DeleteWorker {
            if self.peers.remove(&identity).is_some() {
                tracing::info!(peer = %identity, peers = self.peers.len(), "Upstream peer left");
            }
            return self.completed_marker();
        }

        if !matches!(
            kind,
            Kind::Hello | Kind::Event | Kind::RawData | Kind::LastEvent | Kind::Terminate
        ) {
            return Some(envelope);
        }

        if let Err(e) = self.confirm(&envelope) {
            self.stats.failures += 1;
            tracing::warn!(peer = %identity, error = %e, "Failed to confirm");
        }

        let progress = self.progress(&identity);
        match kind {
            Kind::Hello => None,
            Kind::Event | Kind::RawData => {
                progress.events += 1;
                Some(envelope)
            }
            Kind::LastEvent => {
                progress.stopped = true;
                tracing::debug!(peer = %identity, "Peer reached end of run");
                self.completed_marker()
            }
            _ => {
                progress.terminated = true;
                tracing::debug!(peer = %identity, "Peer terminated");
                self.completed_marker()
            }
        }
    }

    /// A collective marker, once every registered peer has sent its own
    fn completed_marker(&mut self) -> Option<Envelope> {
        if self.peers.is_empty() {
            return None;
        }

        if self.peers.values().all(|p| p.terminated) {
            tracing::info!(peers = self.peers.len(), "All upstream peers terminated");
            return Some(Envelope::signal(Kind::Terminate));
        }

        if self.peers.values().all(|p| p.stopped) {
            tracing::info!(peers = self.peers.len(), "All upstream peers reached end of run");
            self.reset_progress();
            return Some(Envelope::signal(Kind::LastEvent));
        }

        None
    }

    fn reset_progress(&mut self) {
        for progress in self.peers.values_mut() {
            progress.events = 0;
            progress.stopped = false;
        }
    }
}

impl InputChannel for ConfirmedInput {
    async fn poll(&mut self, wait: Duration) -> Option<Envelope> {
        if self.closed {
            tokio::time::sleep(wait).await;
            return None;
        }

        match tokio::time::timeout(wait, self.link.recv()).await {
            Ok(Some(envelope)) => self.accept(envelope),
            Ok(None) => {
                self.closed = true;
                tracing::info!("Input transport closed");
                None
            }
            Err(_) => None,
        }
    }

    fn clear(&mut self) {
        self.peers.clear();
    }

    fn flush_backlog(&mut self) -> Option<Envelope> {
        if !self.has_backlog() {
            return None;
        }

        let missing = self.peers.values().filter(|p| !p.stopped).count();
        tracing::warn!(
            peers = self.peers.len(),
            missing = missing,
            "Closing run without end-of-run from every peer"
        );

        self.reset_progress();
        Some(Envelope::signal(Kind::LastEvent))
    }

    fn stats(&self) -> ChannelStats {
        ChannelStats {
            pending: self.peers.values().filter(|p| p.is_pending()).count(),
            peers: self.peers.len(),
            ..self.stats.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_millis(10);

    fn from(peer: &'static str, kind: Kind, payload: &'static [u8]) -> Envelope {
        Envelope::addressed(kind, Identity::from(peer), Bytes::from_static(payload))
    }

    fn drain_confirms(upstream: &mut Link) -> Vec<Identity> {
        let mut confirmed = Vec::new();
        while let Some(env) = upstream.try_recv() {
            assert!(env.is_kind(Kind::Confirm));
            confirmed.push(env.identity().unwrap().clone());
        }
        confirmed
    }

    #[tokio::test]
    async fn test_events_are_confirmed_and_passed_on() {
        let (link, mut upstream) = Link::pair(16);
        let mut input = ConfirmedInput::new(link);

        upstream.try_send(from("w1", Kind::Hello, b"")).unwrap();
        upstream.try_send(from("w1", Kind::Event, b"E1")).unwrap();

        assert_eq!(input.poll(WAIT).await, None);
        let event = input.poll(WAIT).await.unwrap();
        assert_eq!(event.payload(), &Bytes::from_static(b"E1"));
        assert_eq!(event.identity().unwrap(), &Identity::from("w1"));

        assert_eq!(
            drain_confirms(&mut upstream),
            vec![Identity::from("w1"), Identity::from("w1")]
        );
        assert_eq!(input.peer_count(), 1);
        assert!(input.has_backlog());
    }

    #[tokio::test]
    async fn test_last_event_waits_for_every_peer() {
        let (link, upstream) = Link::pair(16);
        let mut input = ConfirmedInput::new(link);

        upstream.try_send(from("w1", Kind::Hello, b"")).unwrap();
        upstream.try_send(from("w2", Kind::Hello, b"")).unwrap();
        upstream.try_send(from("w1", Kind::LastEvent, b"")).unwrap();
        upstream.try_send(from("w2", Kind::LastEvent, b"")).unwrap();

        assert_eq!(input.poll(WAIT).await, None);
        assert_eq!(input.poll(WAIT).await, None);
        assert_eq!(input.poll(WAIT).await, None);

        let marker = input.poll(WAIT).await.unwrap();
        assert!(marker.is_kind(Kind::LastEvent));
        assert!(!marker.has_identity());
        assert!(!input.has_backlog());
    }

    #[tokio::test]
    async fn test_departed_peer_completes_run() {
        let (link, upstream) = Link::pair(16);
        let mut input = ConfirmedInput::new(link);

        upstream.try_send(from("w1", Kind::Event, b"E1")).unwrap();
        upstream.try_send(from("w2", Kind::Event, b"E2")).unwrap();
        upstream.try_send(from("w1", Kind::LastEvent, b"")).unwrap();
        upstream.try_send(from("w2", Kind::DeleteWorker, b"")).unwrap();

        assert!(input.poll(WAIT).await.is_some());
        assert!(input.poll(WAIT).await.is_some());
        assert_eq!(input.poll(WAIT).await, None);

        let marker = input.poll(WAIT).await.unwrap();
        assert!(marker.is_kind(Kind::LastEvent));
        assert_eq!(input.peer_count(), 1);
    }

    #[tokio::test]
    async fn test_terminate_is_collective() {
        let (link, upstream) = Link::pair(16);
        let mut input = ConfirmedInput::new(link);

        upstream.try_send(from("w1", Kind::Hello, b"")).unwrap();
        upstream.try_send(from("w2", Kind::Hello, b"")).unwrap();
        upstream.try_send(from("w2", Kind::Terminate, b"")).unwrap();
        upstream.try_send(from("w1", Kind::Terminate, b"")).unwrap();

        for _ in 0..3 {
            assert_eq!(input.poll(WAIT).await, None);
        }
        assert!(input.poll(WAIT).await.unwrap().is_kind(Kind::Terminate));
    }

    #[tokio::test]
    async fn test_flush_backlog_once() {
        let (link, upstream) = Link::pair(16);
        let mut input = ConfirmedInput::new(link);

        assert_eq!(input.flush_backlog(), None);

        upstream.try_send(from("w1", Kind::Event, b"E1")).unwrap();
        upstream.try_send(from("w2", Kind::LastEvent, b"")).unwrap();
        input.poll(WAIT).await;
        input.poll(WAIT).await;

        let stop = input.flush_backlog().unwrap();
        assert!(stop.is_kind(Kind::LastEvent));
        assert_eq!(input.flush_backlog(), None);
    }

    #[tokio::test]
    async fn test_clear_returns_to_initial_state() {
        let (link, upstream) = Link::pair(16);
        let mut input = ConfirmedInput::new(link);

        upstream.try_send(from("w1", Kind::Event, b"E1")).unwrap();
        upstream.try_send(from("w2", Kind::LastEvent, b"")).unwrap();
        input.poll(WAIT).await;
        input.poll(WAIT).await;

        input.clear();

        assert_eq!(input.peer_count(), 0);
        assert!(!input.has_backlog());
        assert_eq!(input.flush_backlog(), None);
        assert_eq!(input.stats().pending, 0);
    }

    #[tokio::test]
    async fn test_other_kinds_pass_through_unconfirmed() {
        let (link, mut upstream) = Link::pair(16);
        let mut input = ConfirmedInput::new(link);

        upstream.try_send(from("w1", Kind::NewRun, b"")).unwrap();
        let env = input.poll(WAIT).await.unwrap();
        assert!(env.is_kind(Kind::NewRun));
        assert!(drain_confirms(&mut upstream).is_empty());
        assert_eq!(input.peer_count(), 0);
    }
}
