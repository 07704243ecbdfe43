//! Message kind taxonomy

/// Discriminator selecting envelope semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Peer announces itself to a confirmed or load-balanced endpoint
    Hello,
    /// Worker grants one delivery credit
    Ready,
    /// Serialized event
    Event,
    /// Raw detector data
    RawData,
    /// Acknowledgement of a received envelope
    Confirm,
    /// A new run starts; per-run state must be dropped
    NewRun,
    /// End of run: no more events will follow
    LastEvent,
    /// Shut the pipeline down
    Terminate,
    /// Remove a worker from the pool
    DeleteWorker,
    /// Ask a worker process to exit
    KillWorker,
}

impl Kind {
    /// All kinds, in wire-code order
    pub const ALL: [Kind; 10] = [
        Kind::Hello,
        Kind::Ready,
        Kind::Event,
        Kind::RawData,
        Kind::Confirm,
        Kind::NewRun,
        Kind::LastEvent,
        Kind::Terminate,
        Kind::DeleteWorker,
        Kind::KillWorker,
    ];

    /// Wire code of this kind
    pub fn code(self) -> u8 {
        match self {
            Kind::Hello => 0,
            Kind::Ready => 1,
            Kind::Event => 2,
            Kind::RawData => 3,
            Kind::Confirm => 4,
            Kind::NewRun => 5,
            Kind::LastEvent => 6,
            Kind::Terminate => 7,
            Kind::DeleteWorker => 8,
            Kind::KillWorker => 9,
        }
    }

    /// Kind for a wire code
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Event payload kinds (`Event`, `RawData`)
    pub fn is_data(self) -> bool {
        matches!(self, Kind::Event | Kind::RawData)
    }

    /// Kinds that describe stream structure rather than carry events.
    ///
    /// Markers fan out to every downstream worker instead of being
    /// load-balanced.
    pub fn is_marker(self) -> bool {
        matches!(self, Kind::NewRun | Kind::LastEvent | Kind::Terminate)
    }

    /// Point-to-point bookkeeping between neighbouring stages. Never forwarded.
    pub fn is_housekeeping(self) -> bool {
        matches!(
            self,
            Kind::Hello | Kind::Ready | Kind::Confirm | Kind::DeleteWorker | Kind::KillWorker
        )
    }

    /// Human-readable name
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Hello => "hello",
            Kind::Ready => "ready",
            Kind::Event => "event",
            Kind::RawData => "raw_data",
            Kind::Confirm => "confirm",
            Kind::NewRun => "new_run",
            Kind::LastEvent => "last_event",
            Kind::Terminate => "terminate",
            Kind::DeleteWorker => "delete_worker",
            Kind::KillWorker => "kill_worker",
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
