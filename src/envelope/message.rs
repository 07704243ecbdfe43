//! The envelope itself

use bytes::Bytes;

use super::error::EnvelopeError;
use super::identity::Identity;
use super::kind::Kind;

/// A message flowing between DAQ stages
///
/// Cheap to clone: payloads are reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    kind: Kind,
    identity: Option<Identity>,
    payload: Bytes,
    roi: Option<Bytes>,
}

impl Envelope {
    /// Create a broadcast envelope (no identity)
    pub fn new(kind: Kind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            identity: None,
            payload: payload.into(),
            roi: None,
        }
    }

    /// Create an envelope addressed to (or received from) a peer
    pub fn addressed(kind: Kind, identity: Identity, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            identity: Some(identity),
            payload: payload.into(),
            roi: None,
        }
    }

    /// Create an envelope with an empty payload
    pub fn signal(kind: Kind) -> Self {
        Self::new(kind, Bytes::new())
    }

    /// Create an event envelope
    pub fn event(payload: impl Into<Bytes>) -> Self {
        Self::new(Kind::Event, payload)
    }

    /// Create a raw data envelope
    pub fn raw_data(payload: impl Into<Bytes>) -> Self {
        Self::new(Kind::RawData, payload)
    }

    /// Attach a secondary region-of-interest payload
    pub fn with_roi(mut self, roi: impl Into<Bytes>) -> Self {
        self.roi = Some(roi.into());
        self
    }

    /// Message kind
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Check the message kind
    pub fn is_kind(&self, kind: Kind) -> bool {
        self.kind == kind
    }

    /// Peer identity, if this envelope travelled point-to-point
    pub fn identity(&self) -> Result<&Identity, EnvelopeError> {
        self.identity
            .as_ref()
            .ok_or(EnvelopeError::MissingIdentity(self.kind))
    }

    /// Whether an identity is attached
    pub fn has_identity(&self) -> bool {
        self.identity.is_some()
    }

    /// Main payload
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Secondary region-of-interest payload
    pub fn roi(&self) -> Option<&Bytes> {
        self.roi.as_ref()
    }

    /// Total payload size in bytes (main + ROI)
    pub fn size(&self) -> usize {
        self.payload.len() + self.roi.as_ref().map_or(0, Bytes::len)
    }

    /// Re-address this envelope to a peer
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Strip the identity before the envelope leaves through a different channel
    pub fn without_identity(mut self) -> Self {
        self.identity = None;
        self
    }

    /// Same logical event: kind and payloads match, identity is ignored
    pub fn same_event(&self, other: &Envelope) -> bool {
        self.kind == other.kind && self.payload == other.payload && self.roi == other.roi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_accessor() {
        let broadcast = Envelope::signal(Kind::NewRun);
        assert_eq!(
            broadcast.identity(),
            Err(EnvelopeError::MissingIdentity(Kind::NewRun))
        );

        let addressed = Envelope::addressed(Kind::Ready, Identity::from("worker-1"), Bytes::new());
        assert_eq!(addressed.identity().unwrap(), &Identity::from("worker-1"));
    }

    #[test]
    fn test_readdressing_keeps_payload() {
        let env = Envelope::event(Bytes::from_static(b"E1")).with_roi(Bytes::from_static(b"R1"));
        let sent = env.clone().with_identity(Identity::from("w"));

        assert!(sent.has_identity());
        assert_eq!(sent.payload(), env.payload());
        assert_eq!(sent.roi(), env.roi());
        assert!(sent.same_event(&env));
        assert_ne!(sent, env);

        let stripped = sent.without_identity();
        assert_eq!(stripped, env);
    }

    #[test]
    fn test_same_event_compares_kind() {
        let a = Envelope::event(Bytes::from_static(b"X"));
        let b = Envelope::raw_data(Bytes::from_static(b"X"));
        assert!(!a.same_event(&b));
        assert!(a.is_kind(Kind::Event));
        assert!(b.is_kind(Kind::RawData));
    }

    #[test]
    fn test_size_counts_roi() {
        let env = Envelope::raw_data(vec![0u8; 10]).with_roi(vec![0u8; 4]);
        assert_eq!(env.size(), 14);
        assert_eq!(Envelope::signal(Kind::Terminate).size(), 0);
    }
}
