//! The Engine: the payout settlement API.
//!
//! The Engine brings together the action log, the settlement fold, the
//! value-transfer layer and persistence. Callers submit requests and
//! trigger settlements; the engine does the rest.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use payout_kernel_core::{
    fold_pending, AdmissionRule, Amount, Checkpoint, FoldStats, LogEntry, PartyId, PayoutRequest,
    ReceiptRecord, SettlementRound, SettlementState,
};
use payout_kernel_store::{IntegrityReport, Store, StoreExt};

use crate::error::{EngineError, Result};
use crate::transfer::{TransferBatch, TransferExecutor};

/// Configuration for the Engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Whether [`Engine::open`] verifies the stored log and history.
    pub verify_on_open: bool,
    /// Commit attempts per settlement before giving up on a contended state.
    pub max_commit_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            verify_on_open: true,
            max_commit_attempts: 3,
        }
    }
}

/// Running aggregates across all settlements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregates {
    pub counter: u64,
    pub total: Amount,
}

/// What one settlement did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementSummary {
    pub round: u64,
    /// Requests paid in this round.
    pub paid_count: u64,
    /// Amount paid in this round.
    pub paid_total: Amount,
    /// Aggregates after the round.
    pub counter: u64,
    pub total: Amount,
    /// Checkpoint after the round.
    pub checkpoint: Checkpoint,
    /// One record per pending entry folded, paid or not.
    pub receipts: Vec<ReceiptRecord>,
    pub stats: FoldStats,
}

/// The main Engine struct.
///
/// Provides a unified API for:
/// - Submitting payout requests
/// - Running settlements under a cap
/// - Reading aggregates, receipts and settlement history
pub struct Engine<S: Store, X: TransferExecutor> {
    /// The storage backend.
    store: Arc<S>,
    /// The value-transfer layer.
    executor: Arc<X>,
    /// Configuration.
    config: EngineConfig,
    /// Serializes settlements issued through this engine.
    settle_lock: Mutex<()>,
}

impl<S: Store, X: TransferExecutor> Engine<S, X> {
    /// Create a new engine instance.
    pub fn new(store: S, executor: X, config: EngineConfig) -> Self {
        Self::with_shared(Arc::new(store), Arc::new(executor), config)
    }

    /// Create an engine over a store and executor shared with other owners.
    pub fn with_shared(store: Arc<S>, executor: Arc<X>, config: EngineConfig) -> Self {
        Self {
            store,
            executor,
            config,
            settle_lock: Mutex::new(()),
        }
    }

    /// Create an engine, verifying the store first if configured.
    pub async fn open(store: S, executor: X, config: EngineConfig) -> Result<Self> {
        let engine = Self::new(store, executor, config);
        if engine.config.verify_on_open {
            let report = engine.verify().await?;
            tracing::info!(
                entries = report.entries,
                rounds = report.rounds,
                counter = report.state.counter,
                total = %report.state.total,
                "store verified on open"
            );
        }
        Ok(engine)
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the transfer executor reference.
    pub fn executor(&self) -> &X {
        &self.executor
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Submission
    // ─────────────────────────────────────────────────────────────────────────

    /// Submit a payout request for `recipient`.
    ///
    /// Identical submissions are independent entries and may all be paid.
    pub async fn submit_request(&self, recipient: PartyId, amount: Amount) -> Result<LogEntry> {
        self.submit(PayoutRequest::new(recipient, amount)).await
    }

    /// Append any request, including filler entries.
    pub async fn submit(&self, request: PayoutRequest) -> Result<LogEntry> {
        let entry = self.store.append_request(&request).await?;
        tracing::debug!(
            position = entry.position,
            recipient = %request.recipient,
            amount = %request.amount,
            pending = request.is_pending,
            "request submitted"
        );
        Ok(entry)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Settlement
    // ─────────────────────────────────────────────────────────────────────────

    /// Pay every pending request since the last settlement whose amount is
    /// at most `cap`, and advance the checkpoint past everything read.
    ///
    /// Requests above the cap receive a receipt with unchanged aggregates and
    /// are not offered again.
    pub async fn run_settlement(&self, payer: PartyId, cap: Amount) -> Result<SettlementSummary> {
        let max_attempts = self.config.max_commit_attempts;
        if max_attempts == 0 {
            return Err(EngineError::InvalidOperation(
                "max_commit_attempts must be at least 1".into(),
            ));
        }

        let _guard = self.settle_lock.lock().await;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.settle_once(payer, cap).await {
                Ok(summary) => return Ok(summary),
                Err(EngineError::NonMonotonicCheckpoint {
                    stored_version, ..
                }) if attempt < max_attempts => {
                    tracing::warn!(
                        attempt,
                        stored_version,
                        "settlement lost a commit race, retrying"
                    );
                }
                Err(EngineError::NonMonotonicCheckpoint { .. }) => {
                    tracing::warn!(attempts = attempt, "settlement retries exhausted");
                    return Err(EngineError::RetriesExhausted { attempts: attempt });
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One attempt: read, fold, transfer, commit.
    async fn settle_once(&self, payer: PartyId, cap: Amount) -> Result<SettlementSummary> {
        let prior = self.store.load_state().await?;
        let pending = self.store.entries_since(&prior.checkpoint).await?;
        let outcome = fold_pending(&prior, &pending, &AdmissionRule::new(cap), payer)?;

        let batch = TransferBatch::new(outcome.round.round, payer, outcome.transfers.clone());
        if !batch.is_empty() {
            self.executor.execute(&batch).await?;
        }

        let receipts = match self.store.commit_settlement(&outcome.to_commit()).await {
            Ok(records) => records,
            Err(commit_err) => {
                if !batch.is_empty() {
                    tracing::warn!(
                        round = batch.round,
                        transfers = batch.instructions.len(),
                        error = %commit_err,
                        "commit failed, reversing transfers"
                    );
                    if let Err(e) = self.executor.reverse(&batch).await {
                        tracing::error!(round = batch.round, error = %e, "transfer reversal failed");
                        return Err(EngineError::CompensationFailed {
                            round: batch.round,
                            reason: format!("{} (commit failed: {})", e, commit_err),
                        });
                    }
                }
                return Err(commit_err.into());
            }
        };

        tracing::info!(
            round = outcome.round.round,
            folded = outcome.stats.folded,
            admitted = outcome.stats.admitted,
            rejected = outcome.stats.rejected,
            paid = %outcome.stats.paid_total,
            counter = outcome.next.counter,
            total = %outcome.next.total,
            checkpoint = %outcome.next.checkpoint,
            "settlement committed"
        );

        Ok(SettlementSummary {
            round: outcome.round.round,
            paid_count: outcome.stats.admitted,
            paid_total: outcome.stats.paid_total,
            counter: outcome.next.counter,
            total: outcome.next.total,
            checkpoint: outcome.next.checkpoint,
            receipts,
            stats: outcome.stats,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Query Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Current counter and total.
    pub async fn current_aggregates(&self) -> Result<Aggregates> {
        let state = self.store.load_state().await?;
        Ok(Aggregates {
            counter: state.counter,
            total: state.total,
        })
    }

    /// The full committed settlement state.
    pub async fn settlement_state(&self) -> Result<SettlementState> {
        Ok(self.store.load_state().await?)
    }

    /// Receipt records after `marker` (0 for all).
    pub async fn receipts_since(&self, marker: u64) -> Result<Vec<ReceiptRecord>> {
        Ok(self.store.receipts_since(marker).await?)
    }

    /// Settlement history, oldest first.
    pub async fn rounds(&self) -> Result<Vec<SettlementRound>> {
        Ok(self.store.rounds().await?)
    }

    /// Verify the stored log, history and state against each other.
    pub async fn verify(&self) -> Result<IntegrityReport> {
        Ok(self.store.verify_integrity().await?)
    }
}
