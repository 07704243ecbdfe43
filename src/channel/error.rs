//! Channel error types

/// Error type for channel sends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    /// No worker has granted a credit and the output is lax
    NoReadyDestination,
    /// Transport queue is full
    Full,
    /// Transport side has gone away
    Disconnected,
    /// Point-to-point sink was handed an envelope without identity
    MissingIdentity,
    /// Envelope exceeds what the transport can frame
    TooLarge,
}

impl ChannelError {
    /// Whether the envelope may be retried later
    pub fn is_transient(&self) -> bool {
        matches!(self, ChannelError::NoReadyDestination | ChannelError::Full)
    }
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelError::NoReadyDestination => write!(f, "No ready destination"),
            ChannelError::Full => write!(f, "Transport queue full"),
            ChannelError::Disconnected => write!(f, "Transport disconnected"),
            ChannelError::MissingIdentity => write!(f, "Envelope has no identity"),
            ChannelError::TooLarge => write!(f, "Envelope too large to frame"),
        }
    }
}

impl std::error::Error for ChannelError {}
