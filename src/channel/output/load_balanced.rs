//! Load-balanced output over a pool of workers
//!
//! Workers connect to the bound output endpoint and ask for work by sending
//! `Ready`. Each `Ready` is one credit; a data envelope consumes one credit
//! and goes to that worker only. Stream markers (`NewRun`, `LastEvent`,
//! `Terminate`) go to every known worker.
//!
//! Without a credit the envelope is either dropped (lax) or held until one
//! arrives. Held envelopes are released strictly in order, markers included.

use std::collections::{BTreeSet, VecDeque};

use crate::channel::{ChannelError, Delivery, OutputChannel};
use crate::envelope::{Envelope, Identity, Kind};
use crate::stats::ChannelStats;
use crate::transport::Link;

/// Output distributing events across ready workers
#[derive(Debug)]
pub struct LoadBalancedOutput {
    link: Link,
    lax: bool,
    workers: BTreeSet<Identity>,
    ready: VecDeque<Identity>,
    held: VecDeque<Envelope>,
    closed: bool,
    stats: ChannelStats,
}

impl LoadBalancedOutput {
    /// Create an output over a bound endpoint
    pub fn new(link: Link, lax: bool) -> Self {
        Self {
            link,
            lax,
            workers: BTreeSet::new(),
            ready: VecDeque::new(),
            held: VecDeque::new(),
            closed: false,
            stats: ChannelStats::new("load_balanced_output"),
        }
    }

    /// Outstanding readiness credits
    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }

    /// Envelopes waiting for a credit
    pub fn held_count(&self) -> usize {
        self.held.len()
    }

    /// Known workers
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Process one message from a worker
    pub fn on_downstream(&mut self, envelope: Envelope) {
        let identity = match envelope.identity() {
            Ok(identity) => identity.clone(),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unaddressed worker message");
                return;
            }
        };

        match envelope.kind() {
            Kind::Hello => {
                self.register(&identity);
            }
            Kind::Ready => {
                self.register(&identity);
                self.ready.push_back(identity);
                self.dispatch_held();
            }
            Kind::DeleteWorker => {
                self.ready.retain(|id| id != &identity);
                if self.workers.remove(&identity) {
                    tracing::info!(worker = %identity, workers = self.workers.len(), "Worker removed");
                }
            }
            kind => {
                tracing::trace!(worker = %identity, kind = %kind, "Ignoring worker message");
            }
        }
    }

    fn register(&mut self, identity: &Identity) {
        if self.workers.insert(identity.clone()) {
            tracing::info!(worker = %identity, workers = self.workers.len(), "Worker registered");
        }
    }

    fn transmit(&mut self, identity: Identity, envelope: Envelope) -> Result<(), ChannelError> {
        match self.link.try_send(envelope.with_identity(identity)) {
            Ok(()) => {
                self.stats.messages += 1;
                Ok(())
            }
            Err(e) => {
                self.stats.failures += 1;
                Err(e)
            }
        }
    }

    fn broadcast(&mut self, envelope: Envelope) -> Result<Delivery, ChannelError> {
        if self.workers.is_empty() {
            tracing::debug!(kind = %envelope.kind(), "No workers to receive marker");
            return Ok(Delivery::Absorbed);
        }

        let targets: Vec<Identity> = self.workers.iter().cloned().collect();
        let mut delivered = 0usize;
        let mut last_error = None;

        for identity in targets {
            match self.transmit(identity, envelope.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => last_error = Some(e),
            }
        }

        match last_error {
            Some(e) if delivered == 0 => Err(e),
            _ => Ok(Delivery::Sent),
        }
    }

    /// Release held envelopes in order while credits last
    fn dispatch_held(&mut self) {
        while let Some(front) = self.held.front() {
            if front.kind().is_marker() {
                let Some(marker) = self.held.pop_front() else {
                    break;
                };
                match self.broadcast(marker.clone()) {
                    Ok(_) => continue,
                    Err(e) if e.is_transient() => {
                        self.held.push_front(marker);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(kind = %marker.kind(), error = %e, "Held marker lost");
                        continue;
                    }
                }
            }

            let Some(identity) = self.ready.pop_front() else {
                break;
            };
            let Some(envelope) = self.held.pop_front() else {
                break;
            };

            if let Err(e) = self.transmit(identity.clone(), envelope.clone()) {
                self.ready.push_front(identity.clone());
                if e.is_transient() {
                    self.held.push_front(envelope);
                    break;
                }
                tracing::warn!(worker = %identity, error = %e, "Held envelope lost");
            }
        }
    }
}

impl OutputChannel for LoadBalancedOutput {
    fn send(&mut self, envelope: Envelope) -> Result<Delivery, ChannelError> {
        let envelope = envelope.without_identity();

        // Anything queued behind held envelopes keeps its place
        if !self.held.is_empty() {
            self.held.push_back(envelope);
            return Ok(Delivery::Held);
        }

        if envelope.kind().is_marker() {
            return self.broadcast(envelope);
        }

        match self.ready.pop_front() {
            Some(identity) => match self.transmit(identity.clone(), envelope.clone()) {
                Ok(()) => Ok(Delivery::Sent),
                Err(e) => {
                    self.ready.push_front(identity);
                    if e.is_transient() && !self.lax {
                        self.held.push_back(envelope);
                        Ok(Delivery::Held)
                    } else {
                        Err(e)
                    }
                }
            },
            None if self.lax => {
                self.stats.dropped += 1;
                Err(ChannelError::NoReadyDestination)
            }
            None => {
                self.held.push_back(envelope);
                Ok(Delivery::Held)
            }
        }
    }

    fn can_send(&self) -> bool {
        self.lax || (self.held.is_empty() && !self.ready.is_empty())
    }

    fn has_held(&self) -> bool {
        !self.held.is_empty()
    }

    fn clear(&mut self) {
        if !self.held.is_empty() {
            tracing::warn!(held = self.held.len(), "Discarding held envelopes from previous run");
        }
        self.workers.clear();
        self.ready.clear();
        self.held.clear();
    }

    async fn service(&mut self) {
        if self.closed {
            return std::future::pending().await;
        }

        match self.link.recv().await {
            Some(envelope) => self.on_downstream(envelope),
            None => {
                self.closed = true;
                tracing::warn!("Worker transport closed");
            }
        }
    }

    fn stats(&self) -> ChannelStats {
        ChannelStats {
            pending: self.held.len(),
            peers: self.workers.len(),
            ..self.stats.clone()
        }
    }
}
