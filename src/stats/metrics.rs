//! Statistics for the router and its channels

use std::time::Duration;

use crate::router::{RouterPhase, Variant};

/// Channel-level statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Channel implementation name
    pub name: &'static str,
    /// Envelopes received (inputs) or transmitted (outputs)
    pub messages: u64,
    /// Envelopes discarded by policy
    pub dropped: u64,
    /// Transport send failures
    pub failures: u64,
    /// Held, unconfirmed or in-progress items
    pub pending: usize,
    /// Known peers or workers
    pub peers: usize,
}

impl ChannelStats {
    /// Create empty stats for a channel
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }
}

/// Router-level counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouterCounters {
    /// Envelopes returned by the input
    pub received: u64,
    /// Envelopes accepted by the output for transmission
    pub forwarded: u64,
    /// Envelopes waiting in the output for a destination
    pub held: u64,
    /// Envelopes dropped for lack of a ready destination (lax mode)
    pub dropped: u64,
    /// Envelopes whose kind this variant does not forward
    pub filtered: u64,
    /// Envelopes lost to transport failures
    pub send_failures: u64,
    /// Backlog flushes after the idle timer fired
    pub flushes: u64,
    /// Control signals handled
    pub signals: u64,
}

/// Complete router snapshot
#[derive(Debug, Clone)]
pub struct RouterStats {
    /// Router variant
    pub variant: Variant,
    /// Lifecycle phase
    pub phase: RouterPhase,
    /// Time since the router was constructed
    pub uptime: Duration,
    /// Router counters
    pub counters: RouterCounters,
    /// Input channel state
    pub input: ChannelStats,
    /// Output channel state
    pub output: ChannelStats,
    /// Secondary (ROI) output state
    pub roi_output: Option<ChannelStats>,
}

impl RouterStats {
    /// Forwarded envelopes per second since startup
    pub fn forward_rate(&self) -> f64 {
        let secs = self.uptime.as_secs_f64();
        if secs > 0.0 {
            self.counters.forwarded as f64 / secs
        } else {
            0.0
        }
    }
}
