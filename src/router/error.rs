//! Configuration error types

use super::variant::Variant;

/// Error type for router configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No variant given on the command line
    MissingVariant,
    /// Variant name not recognized
    UnknownVariant(String),
    /// Flag not recognized
    UnknownFlag(String),
    /// Required flag or flag value missing
    MissingValue(&'static str),
    /// Flag value could not be parsed
    InvalidValue { flag: &'static str, value: String },
    /// Flag does not apply to this variant
    NotApplicable { flag: &'static str, variant: Variant },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariant => write!(f, "Missing router variant"),
            ConfigError::UnknownVariant(name) => write!(f, "Unknown router variant: {}", name),
            ConfigError::UnknownFlag(flag) => write!(f, "Unknown flag: {}", flag),
            ConfigError::MissingValue(flag) => write!(f, "Missing value for {}", flag),
            ConfigError::InvalidValue { flag, value } => {
                write!(f, "Invalid value for {}: {}", flag, value)
            }
            ConfigError::NotApplicable { flag, variant } => {
                write!(f, "{} does not apply to {}", flag, variant)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
