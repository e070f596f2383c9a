use std::fmt;

/// Errors raised synchronously by parameter setters.
///
/// A rejected call leaves the engine untouched. Soft range violations
/// (pulses above steps, probabilities above 1, ...) are clamped instead and
/// never reach this type.
#[derive(Debug, Clone, PartialEq)]
pub enum PulsarError {
    /// A parameter that cannot be clamped into a meaningful value
    InvalidParameter { name: &'static str, reason: String },
}

impl PulsarError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        PulsarError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for PulsarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PulsarError::InvalidParameter { name, reason } => {
                write!(f, "Invalid parameter '{}': {}", name, reason)
            }
        }
    }
}

impl std::error::Error for PulsarError {}

pub type Result<T> = std::result::Result<T, PulsarError>;
