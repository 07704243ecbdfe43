//! Input and output channel capabilities
//!
//! The router composes exactly one [`InputChannel`] and one
//! [`OutputChannel`]. Channels own their transport [`Link`]s and all
//! delivery bookkeeping (acknowledgements, readiness credits, framing); the
//! router only asks them to poll, send, clear and flush.
//!
//! ```text
//!   transport ──► InputChannel::poll() ──► Router ──► OutputChannel::send() ──► transport
//!                     ▲                                    │
//!                     └─ Confirm / Ready back upstream     └─ service(): Ready / Confirm
//!                                                             from downstream
//! ```
//!
//! Every method except `poll` and `service` is synchronous and never blocks.
//!
//! [`Link`]: crate::transport::Link

pub mod error;
pub mod input;
pub mod output;

use std::future::Future;
use std::time::Duration;

use crate::envelope::Envelope;
use crate::stats::ChannelStats;

pub use error::ChannelError;
pub use input::{ConfirmedInput, LoadBalancedInput};
pub use output::{ConfirmedOutput, LoadBalancedOutput, RawOutput, RawWithSideChannel};

/// Outcome of handing an envelope to an output channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued for the transport
    Sent,
    /// Waiting for a destination to become ready
    Held,
    /// Accepted but nothing to transmit for this kind (stream marker on a raw sink)
    Absorbed,
}

/// Source of inbound envelopes
pub trait InputChannel: Send {
    /// Wait at most `wait` for the next envelope
    ///
    /// Returns at most one envelope. `None` means nothing arrived in time (or
    /// the frame was absorbed by the channel's own bookkeeping). Must be cancel
    /// safe: the router races it against control signals and timers.
    fn poll(&mut self, wait: Duration) -> impl Future<Output = Option<Envelope>> + Send;

    /// Drop all per-run state
    fn clear(&mut self);

    /// Summarize whatever is still pending into one stop envelope
    fn flush_backlog(&mut self) -> Option<Envelope>;

    /// Monitoring snapshot
    fn stats(&self) -> ChannelStats;
}

/// Sink for outbound envelopes
pub trait OutputChannel: Send {
    /// Hand over an envelope. Never blocks.
    fn send(&mut self, envelope: Envelope) -> Result<Delivery, ChannelError>;

    /// Whether the next envelope can leave without being held
    ///
    /// The router stops reading its input while this is false, so the
    /// upstream sees backpressure instead of acknowledgements.
    fn can_send(&self) -> bool {
        true
    }

    /// Whether accepted envelopes are still waiting for a destination
    fn has_held(&self) -> bool {
        false
    }

    /// Drop all per-run state
    fn clear(&mut self);

    /// Wait for and absorb one message from the downstream side
    ///
    /// Readiness credits and confirmations arrive here. Must be cancel safe.
    /// Outputs without a return path never resolve.
    fn service(&mut self) -> impl Future<Output = ()> + Send {
        std::future::pending()
    }

    /// Monitoring snapshot
    fn stats(&self) -> ChannelStats;

    /// Monitoring snapshot of a secondary sink, if any
    fn side_stats(&self) -> Option<ChannelStats> {
        None
    }
}
