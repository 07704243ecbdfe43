//! Router control loop
//!
//! A single task owns the router and drives it one tick at a time. Each tick
//! races the control-signal stream, the idle timer, the output's downstream
//! traffic and the input against each other and handles exactly one of them.
//! Handlers run after the race is decided, so none of them ever overlap.

use std::time::Instant as StdInstant;

use tokio::time::Instant;

use crate::channel::{ChannelError, Delivery, InputChannel, OutputChannel};
use crate::envelope::{Envelope, Kind};
use crate::stats::{RouterCounters, RouterStats};
use crate::transport::Link;

use super::config::RouterConfig;
use super::timer::IdleTimer;
use super::variant::{Dispatch, Variant};

/// Router lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterPhase {
    /// Polling and forwarding
    Running,
    /// Terminate seen; the loop exits after the current tick
    Draining,
    /// Channels released
    Stopped,
}

/// Event router over one input and one output channel
pub struct Router<I, O> {
    config: RouterConfig,
    input: I,
    output: O,
    signals: Option<Link>,
    idle_timer: IdleTimer,
    phase: RouterPhase,
    counters: RouterCounters,
    started_at: StdInstant,
    last_report: Instant,
}

impl<I: InputChannel, O: OutputChannel> Router<I, O> {
    /// Create a router; channels are already connected
    pub fn new(config: RouterConfig, input: I, output: O) -> Self {
        Self {
            idle_timer: IdleTimer::new(config.stop_wait),
            config,
            input,
            output,
            signals: None,
            phase: RouterPhase::Running,
            counters: RouterCounters::default(),
            started_at: StdInstant::now(),
            last_report: Instant::now(),
        }
    }

    /// Subscribe to a control-signal stream
    pub fn with_signals(mut self, signals: Link) -> Self {
        self.signals = Some(signals);
        self
    }

    pub fn variant(&self) -> Variant {
        self.config.variant
    }

    pub fn phase(&self) -> RouterPhase {
        self.phase
    }

    /// Whether a Terminate has been seen
    pub fn is_terminating(&self) -> bool {
        self.phase != RouterPhase::Running
    }

    pub fn idle_timer(&self) -> &IdleTimer {
        &self.idle_timer
    }

    pub fn counters(&self) -> &RouterCounters {
        &self.counters
    }

    pub fn input(&self) -> &I {
        &self.input
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    /// Run until Terminate, then release both channels
    pub async fn run(mut self) -> RouterStats {
        tracing::info!(
            variant = %self.config.variant,
            stop_wait_ms = self.config.stop_wait.as_millis() as u64,
            lax = self.config.lax,
            "Router started"
        );

        while self.phase == RouterPhase::Running {
            self.tick().await;
        }

        self.drain().await;
        self.terminate()
    }

    /// Handle exactly one source of work
    ///
    /// The input is only read while the output can take an envelope without
    /// holding it. A tick never waits longer than `max_poll_wait` for input.
    pub async fn tick(&mut self) {
        let wait = self.config.max_poll_wait;
        let accepting = self.output.can_send();

        tokio::select! {
            biased;

            signal = next_signal(&mut self.signals) => match signal {
                Some(signal) => self.on_signal(signal),
                None => {
                    tracing::warn!("Control-signal stream closed");
                    self.signals = None;
                }
            },
            _ = self.idle_timer.expired() => self.on_idle_timeout(),
            _ = self.output.service() => {}
            envelope = self.input.poll(wait), if accepting => {
                if let Some(envelope) = envelope {
                    self.on_input(envelope);
                }
            }
            _ = tokio::time::sleep(wait), if !accepting => {}
        }

        self.maybe_report();
    }

    /// Serve the output until nothing is held, bounded by the drain timeout
    ///
    /// No input is read once Terminate has been seen.
    async fn drain(&mut self) {
        if !self.output.has_held() {
            return;
        }

        let timeout = self.config.drain_timeout;
        tracing::info!(
            pending = self.output.stats().pending,
            timeout_ms = timeout.as_millis() as u64,
            "Draining held envelopes"
        );

        let deadline = Instant::now() + timeout;
        while self.output.has_held() {
            tokio::select! {
                biased;

                _ = tokio::time::sleep_until(deadline) => {
                    tracing::warn!(
                        pending = self.output.stats().pending,
                        "Drain timed out"
                    );
                    break;
                }
                _ = self.output.service() => {}
            }
        }
    }

    /// Dispatch one inbound envelope
    pub fn on_input(&mut self, envelope: Envelope) {
        self.counters.received += 1;
        self.idle_timer.touch();

        let kind = envelope.kind();
        match self.config.variant.dispatch(kind) {
            Dispatch::Forward => self.forward(envelope.without_identity()),
            Dispatch::ForwardAndStop => {
                self.forward(envelope.without_identity());
                self.begin_drain();
            }
            Dispatch::Stop => self.begin_drain(),
            Dispatch::Drop => {
                self.counters.filtered += 1;
                tracing::trace!(kind = %kind, "Not forwarded by this variant");
            }
        }
    }

    /// React to one control signal
    pub fn on_signal(&mut self, signal: Envelope) {
        let kind = signal.kind();
        if !self.config.variant.subscriptions().contains(&kind) {
            tracing::trace!(kind = %kind, "Ignoring control signal");
            return;
        }

        self.counters.signals += 1;
        match kind {
            Kind::NewRun => {
                tracing::info!("New run, clearing channel state");
                self.input.clear();
                if self.config.variant.clears_output_on_new_run() {
                    self.output.clear();
                }
            }
            Kind::LastEvent => {
                self.idle_timer.arm();
                tracing::info!(
                    stop_wait_ms = self.idle_timer.duration().as_millis() as u64,
                    "End of run announced, idle timer armed"
                );
            }
            _ => {}
        }
    }

    /// The input stayed quiet for the whole stop wait
    pub fn on_idle_timeout(&mut self) {
        self.idle_timer.disarm();

        match self.input.flush_backlog() {
            Some(backlog) => {
                self.counters.flushes += 1;
                tracing::info!(kind = %backlog.kind(), "Idle after end of run, flushing backlog");
                self.forward(backlog);
            }
            None => tracing::debug!("Idle after end of run, nothing pending"),
        }
    }

    fn forward(&mut self, envelope: Envelope) {
        let kind = envelope.kind();
        match self.output.send(envelope) {
            Ok(Delivery::Sent) | Ok(Delivery::Absorbed) => self.counters.forwarded += 1,
            Ok(Delivery::Held) => self.counters.held += 1,
            Err(ChannelError::NoReadyDestination) => {
                self.counters.dropped += 1;
                tracing::trace!(kind = %kind, "No ready destination, dropped");
            }
            Err(e) => {
                self.counters.send_failures += 1;
                tracing::warn!(kind = %kind, error = %e, "Envelope lost");
            }
        }
    }

    fn begin_drain(&mut self) {
        if self.phase == RouterPhase::Running {
            tracing::info!(variant = %self.config.variant, "Terminate received");
            self.phase = RouterPhase::Draining;
        }
    }

    fn maybe_report(&mut self) {
        if self.last_report.elapsed() < self.config.stats_interval {
            return;
        }
        self.last_report = Instant::now();

        let stats = self.snapshot();
        tracing::info!(
            variant = %stats.variant,
            received = stats.counters.received,
            forwarded = stats.counters.forwarded,
            held = stats.counters.held,
            dropped = stats.counters.dropped,
            failures = stats.counters.send_failures,
            upstream_peers = stats.input.peers,
            downstream_peers = stats.output.peers,
            pending = stats.output.pending,
            rate = stats.forward_rate(),
            "Router stats"
        );
    }

    /// Current statistics
    pub fn snapshot(&self) -> RouterStats {
        RouterStats {
            variant: self.config.variant,
            phase: self.phase,
            uptime: self.started_at.elapsed(),
            counters: self.counters.clone(),
            input: self.input.stats(),
            output: self.output.stats(),
            roi_output: self.output.side_stats(),
        }
    }

    fn terminate(mut self) -> RouterStats {
        self.phase = RouterPhase::Stopped;
        let stats = self.snapshot();

        if stats.output.pending > 0 {
            tracing::warn!(pending = stats.output.pending, "Stopping with undelivered envelopes");
        }
        tracing::info!(
            variant = %stats.variant,
            received = stats.counters.received,
            forwarded = stats.counters.forwarded,
            "Router stopped"
        );

        stats
    }
}

async fn next_signal(signals: &mut Option<Link>) -> Option<Envelope> {
    match signals {
        Some(link) => link.recv().await,
        None => std::future::pending().await,
    }
}
