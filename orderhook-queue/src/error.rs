//! Error types for queue operations.

use thiserror::Error;

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Queue-specific errors.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The backing store failed. Aborts the current batch.
    #[error("Store error: {0}")]
    Store(String),

    /// A single delivery attempt failed. Fed into the retry schedule.
    #[error("Delivery failed: {0}")]
    Delivery(String),

    /// Job not found
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Job ID already exists in the store
    #[error("Duplicate job: {0}")]
    DuplicateJob(String),

    /// Dead-letter entry not found
    #[error("Dead-letter entry not found: {0}")]
    EntryNotFound(String),

    /// Dead-letter entry was already replayed
    #[error("Dead-letter entry already replayed: {0}")]
    AlreadyReplayed(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl QueueError {
    /// Whether this error came from a delivery attempt rather than the store.
    pub fn is_delivery(&self) -> bool {
        matches!(self, QueueError::Delivery(_))
    }
}
