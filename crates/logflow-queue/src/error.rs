//! Error types for the queue and the processing consumer.

use logflow_store::StoreError;
use thiserror::Error;

/// Errors raised by queue backends and record handlers.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue backend cannot be reached; retrying may succeed.
    #[error("queue unavailable: {0}")]
    Unavailable(String),

    /// The consumer group does not exist on the topic.
    #[error("no such consumer group {group} on {topic}")]
    GroupNotFound {
        /// Topic name.
        topic: String,
        /// Group name.
        group: String,
    },

    /// An envelope could not be decoded into a log record.
    #[error("poison message: {0}")]
    Poison(String),

    /// Serializing a record into an envelope failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persisting a record failed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Result type alias for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = QueueError::GroupNotFound {
            topic: "logs:incoming".to_string(),
            group: "log-processors".to_string(),
        };
        assert_eq!(err.to_string(), "no such consumer group log-processors on logs:incoming");

        let err = QueueError::Poison("missing log field".to_string());
        assert_eq!(err.to_string(), "poison message: missing log field");
    }

    #[test]
    fn storage_error_converts() {
        let err: QueueError = StoreError::Unavailable("down".to_string()).into();
        assert!(matches!(err, QueueError::Storage(_)));
    }
}
