//! Store trait: the abstract interface for log and settlement persistence.
//!
//! This trait allows the engine to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use std::sync::Arc;

use async_trait::async_trait;
use payout_kernel_core::{
    replay_rounds, ActionLog, Checkpoint, CoreError, LogEntry, PayoutRequest, ReceiptRecord,
    ReceiptSink, SettlementCommit, SettlementRound, SettlementState,
};

use crate::error::Result;

/// The Store trait: async interface for the action log and settlement state.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
///
/// # Design Notes
///
/// - **Linearized appends**: concurrent appends are serialized into one log order.
/// - **Conditional commit**: `commit_settlement` validates the commit against the
///   stored state and applies state, round and receipts together or not at all.
/// - **Bit-exact checkpoints**: checkpoints are stored as raw 32-byte values and
///   used as lookup keys.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Action Log
    // ─────────────────────────────────────────────────────────────────────────

    /// Append a request after the current tail.
    async fn append_request(&self, request: &PayoutRequest) -> Result<LogEntry>;

    /// Every entry after `checkpoint`, in log order.
    ///
    /// Fails with `CoreError::UnknownCheckpoint` if `checkpoint` is not a
    /// prefix of this log.
    async fn entries_since(&self, checkpoint: &Checkpoint) -> Result<Vec<LogEntry>>;

    /// Entries with `after < position <= through`, ordered by position.
    async fn read_log(&self, after: u64, through: u64) -> Result<Vec<LogEntry>>;

    /// Length of the log and its tail checkpoint.
    async fn log_tail(&self) -> Result<(u64, Checkpoint)>;

    /// Prefix length identified by `checkpoint`.
    async fn position_of(&self, checkpoint: &Checkpoint) -> Result<Option<u64>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Settlement State
    // ─────────────────────────────────────────────────────────────────────────

    /// The last committed settlement state.
    async fn load_state(&self) -> Result<SettlementState>;

    /// Install `commit` if it extends the stored state.
    ///
    /// # Returns
    /// The receipt records appended, with their assigned sequence numbers.
    ///
    /// # Errors
    /// - `NonMonotonicCheckpoint` if another settlement committed first.
    /// - `UnknownCheckpoint` if the proposed checkpoint is not in the log.
    /// - `InvalidCommit` if the commit is structurally wrong.
    async fn commit_settlement(&self, commit: &SettlementCommit) -> Result<Vec<ReceiptRecord>>;

    /// Every committed round, oldest first.
    async fn rounds(&self) -> Result<Vec<SettlementRound>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Receipts
    // ─────────────────────────────────────────────────────────────────────────

    /// Receipt records with `seq > marker`, in order.
    async fn receipts_since(&self, marker: u64) -> Result<Vec<ReceiptRecord>>;
}

#[async_trait]
impl<S: Store + ?Sized> Store for Arc<S> {
    async fn append_request(&self, request: &PayoutRequest) -> Result<LogEntry> {
        (**self).append_request(request).await
    }

    async fn entries_since(&self, checkpoint: &Checkpoint) -> Result<Vec<LogEntry>> {
        (**self).entries_since(checkpoint).await
    }

    async fn read_log(&self, after: u64, through: u64) -> Result<Vec<LogEntry>> {
        (**self).read_log(after, through).await
    }

    async fn log_tail(&self) -> Result<(u64, Checkpoint)> {
        (**self).log_tail().await
    }

    async fn position_of(&self, checkpoint: &Checkpoint) -> Result<Option<u64>> {
        (**self).position_of(checkpoint).await
    }

    async fn load_state(&self) -> Result<SettlementState> {
        (**self).load_state().await
    }

    async fn commit_settlement(&self, commit: &SettlementCommit) -> Result<Vec<ReceiptRecord>> {
        (**self).commit_settlement(commit).await
    }

    async fn rounds(&self) -> Result<Vec<SettlementRound>> {
        (**self).rounds().await
    }

    async fn receipts_since(&self, marker: u64) -> Result<Vec<ReceiptRecord>> {
        (**self).receipts_since(marker).await
    }
}

/// Summary of a successful integrity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityReport {
    /// Log entries verified.
    pub entries: u64,
    /// Rounds replayed.
    pub rounds: u64,
    /// Receipt records checked.
    pub receipts: u64,
    /// Tail of the verified log.
    pub tail: Checkpoint,
    /// The stored state, confirmed by replay.
    pub state: SettlementState,
}

/// Extension trait for common store patterns.
pub trait StoreExt: Store {
    /// Verify the stored log, history and state against each other.
    ///
    /// Rebuilds the hash chain from every stored entry, replays every recorded
    /// round and checks the result equals the stored state.
    fn verify_integrity(&self) -> impl std::future::Future<Output = Result<IntegrityReport>> + Send;
}

impl<S: Store + ?Sized> StoreExt for S {
    async fn verify_integrity(&self) -> Result<IntegrityReport> {
        let (len, tail) = self.log_tail().await?;
        let log = ActionLog::from_entries(self.read_log(0, len).await?)?;
        if log.tail() != tail {
            return Err(CoreError::IntegrityViolation {
                position: len,
                reason: format!("stored tail {} but chain ends at {}", tail, log.tail()),
            }
            .into());
        }

        let rounds = self.rounds().await?;
        let replayed = replay_rounds(&log, &rounds)?;
        let state = self.load_state().await?;
        if replayed != state {
            return Err(CoreError::ReplayMismatch {
                round: state.version,
                reason: format!(
                    "stored counter {} total {} at {}, replay gives counter {} total {} at {}",
                    state.counter,
                    state.total,
                    state.checkpoint,
                    replayed.counter,
                    replayed.total,
                    replayed.checkpoint
                ),
            }
            .into());
        }

        let sink = ReceiptSink::from_records(self.receipts_since(0).await?)?;
        if let Some(last) = sink.records().last() {
            if last.round > state.version {
                return Err(CoreError::IntegrityViolation {
                    position: last.seq,
                    reason: format!("receipt from uncommitted round {}", last.round),
                }
                .into());
            }
        }

        tracing::debug!(
            entries = len,
            rounds = rounds.len(),
            receipts = sink.len(),
            "store integrity verified"
        );

        Ok(IntegrityReport {
            entries: len,
            rounds: rounds.len() as u64,
            receipts: sink.len() as u64,
            tail,
            state,
        })
    }
}
