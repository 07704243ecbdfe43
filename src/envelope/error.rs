//! Envelope error types

use super::kind::Kind;

/// Error type for envelope accessors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Identity was queried on an envelope that only travels on broadcast channels
    MissingIdentity(Kind),
}

impl std::fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvelopeError::MissingIdentity(kind) => {
                write!(f, "{} envelope carries no identity", kind)
            }
        }
    }
}

impl std::error::Error for EnvelopeError {}
