//! Monitoring snapshots
//!
//! The router does not export metrics itself; it exposes plain snapshots an
//! external monitoring collaborator can serialize, and logs them
//! periodically.

pub mod metrics;

pub use metrics::{ChannelStats, RouterCounters, RouterStats};
