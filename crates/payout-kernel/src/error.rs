//! Error types for the Engine.

use payout_kernel_core::{Checkpoint, CoreError};
use payout_kernel_store::StoreError;
use thiserror::Error;

use crate::transfer::TransferError;

/// Errors that can occur during Engine operations.
///
/// The settlement failure modes are lifted out of the store and core errors
/// so callers can match on them directly.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The stored checkpoint does not identify a prefix of the log.
    /// Not retried: the stored state or the log is stale or corrupted.
    #[error("unknown checkpoint: {0}")]
    UnknownCheckpoint(Checkpoint),

    /// Another settlement committed first.
    #[error("non-monotonic checkpoint: stored {stored} (version {stored_version}), proposed {proposed}")]
    NonMonotonicCheckpoint {
        stored: Checkpoint,
        stored_version: u64,
        proposed: Checkpoint,
    },

    /// The value-transfer layer rejected the batch. Nothing was committed.
    #[error("transfer execution failed: {0}")]
    TransferExecutionFailed(#[from] TransferError),

    /// Counter or total accumulation would wrap. Nothing was committed.
    #[error("arithmetic overflow accumulating {0}")]
    ArithmeticOverflow(&'static str),

    /// Every commit attempt lost a race.
    #[error("settlement retries exhausted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// A commit failed after its transfers executed, and reversing them failed too.
    #[error("round {round} transfers could not be reversed: {reason}")]
    CompensationFailed { round: u64, reason: String },

    /// Other core rule violation (integrity, replay, malformed data).
    #[error("core error: {0}")]
    Core(CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(StoreError),

    /// Invalid operation.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl EngineError {
    /// Whether running the same settlement again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::NonMonotonicCheckpoint { .. }
                | EngineError::TransferExecutionFailed(_)
                | EngineError::RetriesExhausted { .. }
        )
    }
}

impl From<CoreError> for EngineError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::UnknownCheckpoint(c) => EngineError::UnknownCheckpoint(c),
            CoreError::NonMonotonicCheckpoint {
                stored,
                stored_version,
                proposed,
            } => EngineError::NonMonotonicCheckpoint {
                stored,
                stored_version,
                proposed,
            },
            CoreError::ArithmeticOverflow(what) => EngineError::ArithmeticOverflow(what),
            other => EngineError::Core(other),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Core(core) => core.into(),
            other => EngineError::Store(other),
        }
    }
}

/// Result type for Engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
