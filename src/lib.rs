//! # daq-router
//!
//! Event-stream collector/router for online data acquisition.
//!
//! A router sits between pipeline stages, takes envelopes from one input
//! channel and forwards them to one output channel. Upstream peers get
//! acknowledgements, downstream workers are fed by readiness credits, and
//! storage sinks receive raw (optionally length-prefixed) records. Runs are
//! delimited by control signals: `NewRun` resets all per-run state, and
//! `LastEvent` arms an idle timer that closes the run even if some upstream
//! peers never report their own end.
//!
//! ## Example
//!
//! ```no_run
//! use daq_router::router::{launch, RouterConfig, Variant};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RouterConfig::new(Variant::Collector)
//!         .input("tcp://*:5555")
//!         .output("tcp://*:5556")
//!         .signals("tcp://run-control:5560")
//!         .lax(true);
//!
//!     let stats = launch(config).await?;
//!     println!("forwarded {} envelopes", stats.counters.forwarded);
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod envelope;
pub mod error;
pub mod router;
pub mod stats;
pub mod transport;

pub use channel::{ChannelError, Delivery, InputChannel, OutputChannel};
pub use envelope::{Envelope, Identity, Kind};
pub use error::{Error, Result};
pub use router::{launch, Router, RouterConfig, Variant};
pub use stats::RouterStats;
