//! Envelope value type
//!
//! An [`Envelope`] is the unit of flow between DAQ stages: a [`Kind`], an
//! optional [`Identity`] used for point-to-point addressing, and an opaque
//! payload. The router never looks inside the payload; it only inspects the
//! kind and adds, strips or rewrites the identity as envelopes cross a
//! channel boundary.
//!
//! Payloads are `bytes::Bytes`, so forwarding an envelope never copies the
//! event data.

pub mod error;
pub mod identity;
pub mod kind;
pub mod message;

pub use error::EnvelopeError;
pub use identity::Identity;
pub use kind::Kind;
pub use message::Envelope;
