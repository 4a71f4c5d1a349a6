//! Error types for the log record model.

use thiserror::Error;

/// Errors raised while validating or canonicalizing submitted log records.
#[derive(Debug, Error)]
pub enum LogError {
    /// A required field was absent or empty.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// The level is not one of DEBUG, INFO, WARN, ERROR, FATAL.
    #[error("invalid log level: {0}")]
    InvalidLevel(String),

    /// A batch with no items was submitted.
    #[error("no logs provided in batch")]
    EmptyBatch,

    /// A batch exceeded the maximum size.
    #[error("batch size too large: {size} logs (max {max})")]
    BatchTooLarge {
        /// Number of submitted items.
        size: usize,
        /// Maximum accepted items.
        max: usize,
    },

    /// One or more batch items failed validation.
    ///
    /// Each entry has the form `item N: reason`.
    #[error("validation failed for {} log(s) in batch", .0.len())]
    InvalidItems(Vec<String>),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for log model operations.
pub type Result<T> = std::result::Result<T, LogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        assert_eq!(LogError::MissingField("source").to_string(), "source is required");
        assert_eq!(
            LogError::InvalidLevel("LOUD".to_string()).to_string(),
            "invalid log level: LOUD"
        );
        assert_eq!(LogError::EmptyBatch.to_string(), "no logs provided in batch");
        assert_eq!(
            LogError::BatchTooLarge { size: 1001, max: 1000 }.to_string(),
            "batch size too large: 1001 logs (max 1000)"
        );
    }

    #[test]
    fn invalid_items_counts_entries() {
        let err = LogError::InvalidItems(vec![
            "item 0: source is required".to_string(),
            "item 4: invalid log level: x".to_string(),
        ]);
        assert_eq!(err.to_string(), "validation failed for 2 log(s) in batch");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LogError>();
    }
}
