//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use payout_kernel_core::{
    ActionLog, Checkpoint, LogEntry, PayoutRequest, ReceiptRecord, ReceiptSink, SettlementCommit,
    SettlementRound, SettlementState,
};

use crate::error::{Result, StoreError};
use crate::traits::Store;

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

struct MemoryStoreInner {
    /// The action log with its checkpoint index.
    log: ActionLog,

    /// Last committed settlement state.
    state: SettlementState,

    /// Settlement history.
    rounds: Vec<SettlementRound>,

    /// Receipt audit trail.
    receipts: ReceiptSink,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner {
                log: ActionLog::new(),
                state: SettlementState::genesis(),
                rounds: Vec::new(),
                receipts: ReceiptSink::new(),
            }),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn append_request(&self, request: &PayoutRequest) -> Result<LogEntry> {
        let mut inner = self.write()?;
        let entry = inner.log.append(request.clone());
        tracing::debug!(position = entry.position, checkpoint = %entry.checkpoint, "request appended");
        Ok(entry)
    }

    async fn entries_since(&self, checkpoint: &Checkpoint) -> Result<Vec<LogEntry>> {
        let inner = self.read()?;
        Ok(inner.log.entries_since(checkpoint)?.to_vec())
    }

    async fn read_log(&self, after: u64, through: u64) -> Result<Vec<LogEntry>> {
        let inner = self.read()?;
        Ok(inner.log.range(after, through).to_vec())
    }

    async fn log_tail(&self) -> Result<(u64, Checkpoint)> {
        let inner = self.read()?;
        Ok((inner.log.len(), inner.log.tail()))
    }

    async fn position_of(&self, checkpoint: &Checkpoint) -> Result<Option<u64>> {
        let inner = self.read()?;
        Ok(inner.log.position_of(checkpoint))
    }

    async fn load_state(&self) -> Result<SettlementState> {
        let inner = self.read()?;
        Ok(inner.state)
    }

    async fn commit_settlement(&self, commit: &SettlementCommit) -> Result<Vec<ReceiptRecord>> {
        let mut inner = self.write()?;

        inner
            .state
            .validate_successor(commit, |c| inner.log.position_of(c))?;

        inner.state = commit.next;
        inner.rounds.push(commit.round.clone());
        let records = inner
            .receipts
            .append_batch(commit.round.round, commit.receipts.clone());

        tracing::debug!(
            round = commit.round.round,
            checkpoint = %commit.next.checkpoint,
            receipts = records.len(),
            "settlement committed"
        );
        Ok(records)
    }

    async fn rounds(&self) -> Result<Vec<SettlementRound>> {
        let inner = self.read()?;
        Ok(inner.rounds.clone())
    }

    async fn receipts_since(&self, marker: u64) -> Result<Vec<ReceiptRecord>> {
        let inner = self.read()?;
        Ok(inner.receipts.since(marker).to_vec())
    }
}
