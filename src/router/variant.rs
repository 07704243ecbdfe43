//! Router variants and their dispatch table

use std::str::FromStr;

use crate::envelope::Kind;

use super::error::ConfigError;

/// Deployment variant of the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// Confirmed input to a pool of workers
    Collector,
    /// Confirmed input to one downstream collector
    ProxyCollector,
    /// Confirmed input to a raw sink (storage)
    FinalCollector,
    /// Confirmed input to a raw data sink plus a raw ROI sink
    FinalCollectorWithRoi,
    /// Single-credit load-balanced input to a raw sink
    OutputAdapter,
}

/// What the router does with one inbound envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Strip the identity and hand it to the output
    Forward,
    /// Forward, then stop after this tick
    ForwardAndStop,
    /// Stop after this tick without forwarding
    Stop,
    /// Discard silently
    Drop,
}

impl Variant {
    /// All variants
    pub const ALL: [Variant; 5] = [
        Variant::Collector,
        Variant::ProxyCollector,
        Variant::FinalCollector,
        Variant::FinalCollectorWithRoi,
        Variant::OutputAdapter,
    ];

    /// Command-line name
    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Collector => "collector",
            Variant::ProxyCollector => "proxy-collector",
            Variant::FinalCollector => "final-collector",
            Variant::FinalCollectorWithRoi => "final-collector-roi",
            Variant::OutputAdapter => "output-adapter",
        }
    }

    /// Stream markers (`Terminate`, run-end `LastEvent`) travel on downstream
    pub fn forwards_markers(self) -> bool {
        !matches!(self, Variant::OutputAdapter)
    }

    /// Every kind that is not point-to-point housekeeping is forwarded
    pub fn forwards_verbatim(self) -> bool {
        matches!(
            self,
            Variant::ProxyCollector | Variant::FinalCollector | Variant::FinalCollectorWithRoi
        )
    }

    /// Control signals this variant reacts to
    pub fn subscriptions(self) -> &'static [Kind] {
        match self {
            Variant::OutputAdapter => &[],
            _ => &[Kind::NewRun, Kind::LastEvent],
        }
    }

    /// Whether `NewRun` also resets the output side
    pub fn clears_output_on_new_run(self) -> bool {
        !matches!(self, Variant::ProxyCollector)
    }

    /// Whether the `lax` output policy applies
    pub fn accepts_lax(self) -> bool {
        matches!(self, Variant::Collector)
    }

    /// Whether the output is a raw byte sink
    pub fn has_raw_output(self) -> bool {
        matches!(
            self,
            Variant::FinalCollector | Variant::FinalCollectorWithRoi | Variant::OutputAdapter
        )
    }

    /// Whether a second (ROI) sink is required
    pub fn has_roi_output(self) -> bool {
        matches!(self, Variant::FinalCollectorWithRoi)
    }

    /// Dispatch decision for an inbound envelope kind
    pub fn dispatch(self, kind: Kind) -> Dispatch {
        match kind {
            Kind::Terminate if self.forwards_markers() => Dispatch::ForwardAndStop,
            Kind::Terminate => Dispatch::Stop,
            Kind::Event | Kind::RawData => Dispatch::Forward,
            Kind::LastEvent if self.forwards_markers() => Dispatch::Forward,
            kind if self.forwards_verbatim() && !kind.is_housekeeping() => Dispatch::Forward,
            _ => Dispatch::Drop,
        }
    }
}

impl FromStr for Variant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownVariant(s.to_string()))
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        for variant in Variant::ALL {
            assert_eq!(variant.as_str().parse::<Variant>(), Ok(variant));
        }
        assert_eq!(
            "collecter".parse::<Variant>(),
            Err(ConfigError::UnknownVariant("collecter".into()))
        );
    }

    #[test]
    fn test_terminate_by_variant() {
        for variant in Variant::ALL {
            let expected = if variant == Variant::OutputAdapter {
                Dispatch::Stop
            } else {
                Dispatch::ForwardAndStop
            };
            assert_eq!(variant.dispatch(Kind::Terminate), expected, "{}", variant);
        }
    }

    #[test]
    fn test_data_always_forwarded() {
        for variant in Variant::ALL {
            assert_eq!(variant.dispatch(Kind::Event), Dispatch::Forward);
            assert_eq!(variant.dispatch(Kind::RawData), Dispatch::Forward);
        }
    }

    #[test]
    fn test_housekeeping_never_forwarded() {
        for variant in Variant::ALL {
            for kind in [Kind::Hello, Kind::Ready, Kind::Confirm, Kind::DeleteWorker, Kind::KillWorker] {
                assert_eq!(variant.dispatch(kind), Dispatch::Drop, "{} {}", variant, kind);
            }
        }
    }

    #[test]
    fn test_verbatim_variants_forward_new_run() {
        assert_eq!(Variant::Collector.dispatch(Kind::NewRun), Dispatch::Drop);
        assert_eq!(Variant::OutputAdapter.dispatch(Kind::NewRun), Dispatch::Drop);
        assert_eq!(Variant::ProxyCollector.dispatch(Kind::NewRun), Dispatch::Forward);
        assert_eq!(Variant::FinalCollector.dispatch(Kind::NewRun), Dispatch::Forward);
        assert_eq!(Variant::FinalCollectorWithRoi.dispatch(Kind::NewRun), Dispatch::Forward);
    }

    #[test]
    fn test_run_end_marker() {
        assert_eq!(Variant::Collector.dispatch(Kind::LastEvent), Dispatch::Forward);
        assert_eq!(Variant::OutputAdapter.dispatch(Kind::LastEvent), Dispatch::Drop);
    }

    #[test]
    fn test_subscriptions() {
        assert!(Variant::OutputAdapter.subscriptions().is_empty());
        assert_eq!(Variant::Collector.subscriptions(), &[Kind::NewRun, Kind::LastEvent]);
        assert!(!Variant::ProxyCollector.clears_output_on_new_run());
        assert!(Variant::Collector.clears_output_on_new_run());
    }
}
