//! Error types for the Payout Kernel Core.

use thiserror::Error;

use crate::types::Checkpoint;

/// Core errors raised by the action log, the settlement fold and commit validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The checkpoint does not identify any prefix of the log.
    #[error("unknown checkpoint: {0}")]
    UnknownCheckpoint(Checkpoint),

    /// A commit does not extend the stored checkpoint (lost a race).
    #[error("non-monotonic checkpoint: stored {stored} (version {stored_version}), proposed {proposed}")]
    NonMonotonicCheckpoint {
        stored: Checkpoint,
        stored_version: u64,
        proposed: Checkpoint,
    },

    /// Counter, total or version accumulation would wrap.
    #[error("arithmetic overflow accumulating {0}")]
    ArithmeticOverflow(&'static str),

    /// A commit is structurally invalid (aggregates regress, version skips).
    #[error("invalid commit: {0}")]
    InvalidCommit(String),

    /// The hash chain of the log does not verify.
    #[error("integrity violation at position {position}: {reason}")]
    IntegrityViolation { position: u64, reason: String },

    /// Replaying a recorded round did not reproduce its aggregates.
    #[error("replay mismatch in round {round}: {reason}")]
    ReplayMismatch { round: u64, reason: String },

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("decoding error: {0}")]
    Decoding(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
