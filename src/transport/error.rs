//! Transport error types

/// Error type for frame decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Frame announces a body larger than the allowed maximum
    FrameTooLarge(usize),
    /// Kind code is not part of the taxonomy
    UnknownKind(u8),
    /// Frame body is shorter than its own headers claim
    Malformed,
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::FrameTooLarge(len) => write!(f, "Frame too large: {} bytes", len),
            CodecError::UnknownKind(code) => write!(f, "Unknown message kind: {}", code),
            CodecError::Malformed => write!(f, "Malformed frame"),
        }
    }
}

impl std::error::Error for CodecError {}

/// Error type for transport setup and framing
#[derive(Debug)]
pub enum TransportError {
    /// Could not bind or connect; fatal at startup
    Unavailable {
        address: String,
        source: std::io::Error,
    },
    /// Address string is not `tcp://HOST:PORT` or `tcp://*:PORT`
    InvalidAddress(String),
    /// Peer sent an undecodable frame
    Codec(CodecError),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Unavailable { address, source } => {
                write!(f, "Transport unavailable at {}: {}", address, source)
            }
            TransportError::InvalidAddress(addr) => write!(f, "Invalid address: {}", addr),
            TransportError::Codec(e) => write!(f, "Codec error: {}", e),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Unavailable { source, .. } => Some(source),
            TransportError::Codec(e) => Some(e),
            TransportError::InvalidAddress(_) => None,
        }
    }
}

impl From<CodecError> for TransportError {
    fn from(e: CodecError) -> Self {
        TransportError::Codec(e)
    }
}
