//! Error types for the store module.

use payout_kernel_core::CoreError;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A log or settlement rule was violated (unknown checkpoint, lost race,
    /// broken chain).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Request or record serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A lock guarding store state was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// A blocking database task failed to complete.
    #[error("blocking task failed: {0}")]
    TaskJoin(String),
}

impl StoreError {
    /// The core rule violation behind this error, if any.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            StoreError::Core(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
