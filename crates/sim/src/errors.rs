use thiserror::Error;

/// Errors raised by the simulation core.
///
/// Every variant aborts the operation that produced it. Operations that
/// return a `SimError` leave the population exactly as it was before the
/// call.
#[derive(Debug, Error)]
pub enum SimError {
    /// Malformed model parameters (negative rates, empty regions, ...).
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Internal consistency check failed.
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    /// Caller-supplied data was rejected.
    #[error("Invalid input: {0}")]
    InputValidation(String),

    /// A numerical routine produced a value outside its domain.
    #[error("Numerical error in {context}: {detail}")]
    Numerical {
        context: &'static str,
        detail: String,
    },

    /// Encoding or decoding of a checkpoint failed.
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] bincode::Error),

    /// Reading a model description failed.
    #[error("Failed to read model parameters: {0}")]
    Io(#[from] std::io::Error),

    /// A model description could not be parsed.
    #[error("Failed to parse model parameters: {0}")]
    Parse(#[from] serde_json::Error),
}

impl SimError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub(crate) fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub(crate) fn input(msg: impl Into<String>) -> Self {
        Self::InputValidation(msg.into())
    }

    pub(crate) fn numerical(context: &'static str, detail: impl Into<String>) -> Self {
        Self::Numerical {
            context,
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_display() {
        let err = SimError::config("mutation rate must be >= 0");
        let msg = format!("{err}");
        assert!(msg.contains("Invalid configuration"));
        assert!(msg.contains("mutation rate"));
    }

    #[test]
    fn test_numerical_display_names_context() {
        let err = SimError::numerical("GSS", "exp returned NaN");
        assert_eq!(format!("{err}"), "Numerical error in GSS: exp returned NaN");
    }

    #[test]
    fn test_checkpoint_from_bincode() {
        let bad: Result<Vec<u32>, _> = bincode::deserialize(&[1u8, 2]);
        let err: SimError = bad.unwrap_err().into();
        assert!(matches!(err, SimError::Checkpoint(_)));
    }
}
