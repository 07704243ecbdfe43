//! Transport collaborator
//!
//! The router and its channels only ever see [`Link`]s (bounded queues of
//! envelopes) and raw byte sinks. This module turns addresses into those:
//!
//! ```text
//!   tcp://*:PORT     bind: accept many peers, each gets an Identity
//!   tcp://HOST:PORT  connect: a single upstream/downstream peer
//! ```
//!
//! Outbound envelopes carrying an identity go to that peer only; envelopes
//! without one are published to every connected peer. When a bound peer
//! disconnects, a `DeleteWorker` envelope with its identity is injected into
//! the inbound queue so load-balancing state can forget it.

pub mod address;
pub mod codec;
pub mod error;
pub mod link;
pub mod tcp;
pub mod writers;

use bytes::Bytes;
use tokio::sync::mpsc;

pub use address::Address;
pub use codec::{decode, encode, MAX_FRAME_SIZE};
pub use error::{CodecError, TransportError};
pub use link::Link;
pub use writers::{WriterToken, Writers};

/// Open a message endpoint for an address
pub async fn open(
    address: &Address,
    capacity: usize,
    writers: &Writers,
) -> Result<Link, TransportError> {
    match address {
        Address::Bind(addr) => {
            let (link, local) = tcp::bind(*addr, capacity, writers.token()).await?;
            tracing::info!(addr = %local, "Endpoint listening");
            Ok(link)
        }
        Address::Connect(addr) => {
            let link = tcp::connect(addr, capacity, writers.token()).await?;
            tracing::info!(addr = %addr, "Endpoint connected");
            Ok(link)
        }
    }
}

/// Open a raw byte sink for an address
pub async fn open_raw(
    address: &Address,
    capacity: usize,
    writers: &Writers,
) -> Result<mpsc::Sender<Bytes>, TransportError> {
    match address {
        Address::Bind(addr) => {
            let (sink, local) = tcp::bind_raw(*addr, capacity, writers.token()).await?;
            tracing::info!(addr = %local, "Raw sink listening");
            Ok(sink)
        }
        Address::Connect(addr) => {
            let sink = tcp::connect_raw(addr, capacity, writers.token()).await?;
            tracing::info!(addr = %addr, "Raw sink connected");
            Ok(sink)
        }
    }
}
