//! Event router
//!
//! One [`Router`] per process. It composes one input and one output channel,
//! listens to a control-signal stream, and decides for every envelope
//! whether to forward, drop, or stop. The five deployment variants share the
//! same control loop and differ only in the channels they compose and in
//! their [`Variant`] dispatch table.
//!
//! ```text
//!   Variant                 Input            Output
//!   collector               Confirmed        LoadBalanced(lax)
//!   proxy-collector         Confirmed        Confirmed
//!   final-collector         Confirmed        Raw(length prefix?)
//!   final-collector-roi     Confirmed        RawWithSideChannel
//!   output-adapter          LoadBalanced(1)  Raw
//! ```

pub mod config;
pub mod error;
pub mod launch;
pub mod reactor;
pub mod timer;
pub mod variant;

pub use config::{RouterConfig, USAGE};
pub use error::ConfigError;
pub use launch::{launch, ADAPTER_CONCURRENCY};
pub use reactor::{Router, RouterPhase};
pub use timer::IdleTimer;
pub use variant::{Dispatch, Variant};
