//! Error types for the event stream engine.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while writing, scanning or replaying the stream.
///
/// None of these are recovered from inside the engine. They propagate to the
/// owning component (segment manager, replayer, offline filter) and from there
/// to the caller.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Segment file error.
    #[error("storage error: {0}")]
    Storage(#[from] pces_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An event was written to a segment whose bounds cannot hold it.
    #[error("ancient indicator {indicator} is outside segment bounds [{lower_bound}, {upper_bound}]")]
    OutOfRange {
        /// Indicator of the rejected event.
        indicator: i64,
        /// Lower bound of the open segment.
        lower_bound: i64,
        /// Upper bound of the open segment.
        upper_bound: i64,
    },

    /// A caller supplied an argument that violates a monotonicity rule.
    #[error("illegal argument: {message}")]
    IllegalArgument {
        /// Description of the violation.
        message: String,
    },

    /// On-disk state is inconsistent.
    #[error("stream corruption: {message}")]
    Corruption {
        /// Description of the corruption.
        message: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// Replay was interrupted while waiting for the downstream to recover.
    #[error("replay interrupted while waiting for a healthy downstream")]
    Interrupted,

    /// Configuration value out of range.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the bad value.
        message: String,
    },

    /// Saved-state metadata could not be parsed or written.
    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
}

impl CoreError {
    /// Creates an out-of-range error.
    pub fn out_of_range(indicator: i64, lower_bound: i64, upper_bound: i64) -> Self {
        Self::OutOfRange {
            indicator,
            lower_bound,
            upper_bound,
        }
    }

    /// Creates an illegal argument error.
    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::IllegalArgument {
            message: message.into(),
        }
    }

    /// Creates a corruption error.
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption {
            message: message.into(),
        }
    }

    /// Creates an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_message_names_bounds() {
        let err = CoreError::out_of_range(150, 0, 100);
        assert_eq!(
            err.to_string(),
            "ancient indicator 150 is outside segment bounds [0, 100]"
        );
    }

    #[test]
    fn storage_errors_convert() {
        let storage = pces_storage::StorageError::Corrupted("bad".into());
        let err: CoreError = storage.into();
        assert!(matches!(err, CoreError::Storage(_)));
    }

    #[test]
    fn helper_constructors() {
        assert!(matches!(
            CoreError::illegal_argument("x"),
            CoreError::IllegalArgument { .. }
        ));
        assert!(matches!(CoreError::corruption("x"), CoreError::Corruption { .. }));
        assert!(matches!(CoreError::invalid_state("x"), CoreError::InvalidState { .. }));
    }
}
