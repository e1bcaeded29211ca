//! Store error types.

use thiserror::Error;

/// Transient or infrastructure failures from the persistence layer.
///
/// These are deliberately separate from the domain's deterministic error
/// taxonomy: callers decide retry policy for these, while domain errors
/// are never retried.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A persisted row could not be mapped back into a domain value.
    #[error("corrupted row: {message}")]
    Corrupted { message: String },
}

impl StoreError {
    /// A `Corrupted` error for an unmappable persisted value.
    pub fn corrupted(message: impl Into<String>) -> Self {
        StoreError::Corrupted {
            message: message.into(),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
