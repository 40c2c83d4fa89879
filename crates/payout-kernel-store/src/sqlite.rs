//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for the Payout Kernel. It uses
//! rusqlite with bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

use payout_kernel_core::{
    canonical_request_bytes, chain_step, decode_request, Amount, Checkpoint, CoreError, LogEntry,
    PartyId, PayoutReceipt, PayoutRequest, ReceiptRecord, SettlementCommit, SettlementRound,
    SettlementState,
};

use crate::error::{Result, StoreError};
use crate::migration::{self, now_millis};
use crate::traits::Store;

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::LockPoisoned(format!("connection mutex: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::TaskJoin(e.to_string()))?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row helpers
// ─────────────────────────────────────────────────────────────────────────────

fn blob32(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<[u8; 32]> {
    let bytes: Vec<u8> = row.get(idx)?;
    bytes.try_into().map_err(|_| {
        rusqlite::Error::InvalidColumnType(idx, "expected 32-byte blob".into(), rusqlite::types::Type::Blob)
    })
}

fn uint(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    row.get::<_, i64>(idx).map(|v| v as u64)
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<(u64, Vec<u8>, [u8; 32])> {
    Ok((uint(row, 0)?, row.get(1)?, blob32(row, 2)?))
}

fn decode_entry((position, request, checkpoint): (u64, Vec<u8>, [u8; 32])) -> Result<LogEntry> {
    let request = decode_request(&request).map_err(|e| {
        StoreError::Serialization(format!("log entry {}: {}", position, e))
    })?;
    Ok(LogEntry {
        position,
        request,
        checkpoint: Checkpoint::from_bytes(checkpoint),
    })
}

fn row_to_state(row: &rusqlite::Row<'_>) -> rusqlite::Result<SettlementState> {
    Ok(SettlementState {
        counter: uint(row, 0)?,
        total: Amount(uint(row, 1)?),
        checkpoint: Checkpoint::from_bytes(blob32(row, 2)?),
        version: uint(row, 3)?,
    })
}

fn row_to_round(row: &rusqlite::Row<'_>) -> rusqlite::Result<SettlementRound> {
    Ok(SettlementRound {
        round: uint(row, 0)?,
        payer: PartyId::from_bytes(blob32(row, 1)?),
        cap: Amount(uint(row, 2)?),
        from_checkpoint: Checkpoint::from_bytes(blob32(row, 3)?),
        to_checkpoint: Checkpoint::from_bytes(blob32(row, 4)?),
        folded: uint(row, 5)?,
        admitted: uint(row, 6)?,
        counter_after: uint(row, 7)?,
        total_after: Amount(uint(row, 8)?),
    })
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReceiptRecord> {
    Ok(ReceiptRecord {
        seq: uint(row, 0)?,
        round: uint(row, 1)?,
        receipt: PayoutReceipt {
            payer: PartyId::from_bytes(blob32(row, 2)?),
            recipient: PartyId::from_bytes(blob32(row, 3)?),
            amount: Amount(uint(row, 4)?),
            counter_after: uint(row, 5)?,
            total_after: Amount(uint(row, 6)?),
        },
    })
}

fn load_state_in(conn: &Connection) -> Result<SettlementState> {
    conn.query_row(
        "SELECT counter, total, checkpoint, version FROM settlement_state WHERE id = 1",
        [],
        row_to_state,
    )
    .optional()?
    .ok_or_else(|| StoreError::InvalidData("settlement state row missing".into()))
}

fn position_in(conn: &Connection, checkpoint: &Checkpoint) -> Result<Option<u64>> {
    if checkpoint.is_genesis() {
        return Ok(Some(0));
    }
    Ok(conn
        .query_row(
            "SELECT position FROM log_entries WHERE checkpoint = ?1",
            params![checkpoint.as_bytes().as_slice()],
            |row| uint(row, 0),
        )
        .optional()?)
}

fn tail_in(conn: &Connection) -> Result<(u64, Checkpoint)> {
    let tail = conn
        .query_row(
            "SELECT position, checkpoint FROM log_entries ORDER BY position DESC LIMIT 1",
            [],
            |row| Ok((uint(row, 0)?, blob32(row, 1)?)),
        )
        .optional()?;
    Ok(match tail {
        Some((position, checkpoint)) => (position, Checkpoint::from_bytes(checkpoint)),
        None => (0, Checkpoint::genesis()),
    })
}

fn read_range(conn: &Connection, after: u64, through: u64) -> Result<Vec<LogEntry>> {
    if through <= after {
        return Ok(Vec::new());
    }
    // Positions never exceed i64::MAX, so clamp the upper bound before casting.
    let through = through.min(i64::MAX as u64);
    let mut stmt = conn.prepare_cached(
        "SELECT position, request, checkpoint FROM log_entries
         WHERE position > ?1 AND position <= ?2
         ORDER BY position",
    )?;
    let rows = stmt
        .query_map(params![after as i64, through as i64], row_to_entry)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(decode_entry).collect()
}

fn apply_commit(tx: &Transaction<'_>, commit: &SettlementCommit) -> Result<Vec<ReceiptRecord>> {
    let stored = load_state_in(tx)?;

    let stored_position = position_in(tx, &stored.checkpoint)?;
    let proposed_position = position_in(tx, &commit.next.checkpoint)?;
    stored.validate_successor(commit, |c| {
        if *c == commit.next.checkpoint {
            proposed_position
        } else if *c == stored.checkpoint {
            stored_position
        } else {
            None
        }
    })?;

    let now = now_millis();
    let next = &commit.next;
    let updated = tx.execute(
        "UPDATE settlement_state
         SET counter = ?1, total = ?2, checkpoint = ?3, version = ?4, updated_at = ?5
         WHERE id = 1 AND version = ?6",
        params![
            next.counter as i64,
            next.total.get() as i64,
            next.checkpoint.as_bytes().as_slice(),
            next.version as i64,
            now,
            stored.version as i64,
        ],
    )?;
    if updated != 1 {
        return Err(CoreError::NonMonotonicCheckpoint {
            stored: stored.checkpoint,
            stored_version: stored.version,
            proposed: next.checkpoint,
        }
        .into());
    }

    let round = &commit.round;
    tx.execute(
        "INSERT INTO settlement_rounds (
            round, payer, cap, from_checkpoint, to_checkpoint,
            folded, admitted, counter_after, total_after, committed_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            round.round as i64,
            round.payer.as_bytes().as_slice(),
            round.cap.get() as i64,
            round.from_checkpoint.as_bytes().as_slice(),
            round.to_checkpoint.as_bytes().as_slice(),
            round.folded as i64,
            round.admitted as i64,
            round.counter_after as i64,
            round.total_after.get() as i64,
            now,
        ],
    )?;

    let last_seq: i64 = tx.query_row("SELECT COALESCE(MAX(seq), 0) FROM receipts", [], |row| {
        row.get(0)
    })?;

    let mut records = Vec::with_capacity(commit.receipts.len());
    let mut stmt = tx.prepare_cached(
        "INSERT INTO receipts (
            seq, round, payer, recipient, amount, counter_after, total_after
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for (i, receipt) in commit.receipts.iter().enumerate() {
        let seq = last_seq as u64 + i as u64 + 1;
        stmt.execute(params![
            seq as i64,
            round.round as i64,
            receipt.payer.as_bytes().as_slice(),
            receipt.recipient.as_bytes().as_slice(),
            receipt.amount.get() as i64,
            receipt.counter_after as i64,
            receipt.total_after.get() as i64,
        ])?;
        records.push(ReceiptRecord {
            seq,
            round: round.round,
            receipt: receipt.clone(),
        });
    }

    Ok(records)
}

#[async_trait]
impl Store for SqliteStore {
    async fn append_request(&self, request: &PayoutRequest) -> Result<LogEntry> {
        let request = request.clone();

        let entry = self
            .blocking(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                let (len, tail) = tail_in(&tx)?;
                let position = len
                    .checked_add(1)
                    .ok_or(CoreError::ArithmeticOverflow("log position"))?;
                let checkpoint = chain_step(&tail, position, &request);

                tx.execute(
                    "INSERT INTO log_entries (position, request, checkpoint, appended_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        position as i64,
                        canonical_request_bytes(&request).as_ref(),
                        checkpoint.as_bytes().as_slice(),
                        now_millis(),
                    ],
                )?;
                tx.commit()?;

                Ok(LogEntry {
                    position,
                    request,
                    checkpoint,
                })
            })
            .await?;

        tracing::debug!(position = entry.position, checkpoint = %entry.checkpoint, "request appended");
        Ok(entry)
    }

    async fn entries_since(&self, checkpoint: &Checkpoint) -> Result<Vec<LogEntry>> {
        let checkpoint = *checkpoint;
        self.blocking(move |conn| {
            let position = position_in(conn, &checkpoint)?
                .ok_or(CoreError::UnknownCheckpoint(checkpoint))?;
            read_range(conn, position, u64::MAX)
        })
        .await
    }

    async fn read_log(&self, after: u64, through: u64) -> Result<Vec<LogEntry>> {
        self.blocking(move |conn| read_range(conn, after, through))
            .await
    }

    async fn log_tail(&self) -> Result<(u64, Checkpoint)> {
        self.blocking(|conn| tail_in(conn)).await
    }

    async fn position_of(&self, checkpoint: &Checkpoint) -> Result<Option<u64>> {
        let checkpoint = *checkpoint;
        self.blocking(move |conn| position_in(conn, &checkpoint))
            .await
    }

    async fn load_state(&self) -> Result<SettlementState> {
        self.blocking(|conn| load_state_in(conn)).await
    }

    async fn commit_settlement(&self, commit: &SettlementCommit) -> Result<Vec<ReceiptRecord>> {
        let commit = commit.clone();
        let round = commit.round.round;

        let records = self
            .blocking(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                // Dropping `tx` on error rolls everything back.
                let records = apply_commit(&tx, &commit)?;
                tx.commit()?;
                Ok(records)
            })
            .await?;

        tracing::debug!(round, receipts = records.len(), "settlement committed");
        Ok(records)
    }

    async fn rounds(&self) -> Result<Vec<SettlementRound>> {
        self.blocking(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT round, payer, cap, from_checkpoint, to_checkpoint,
                        folded, admitted, counter_after, total_after
                 FROM settlement_rounds ORDER BY round",
            )?;
            let rounds = stmt
                .query_map([], row_to_round)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rounds)
        })
        .await
    }

    async fn receipts_since(&self, marker: u64) -> Result<Vec<ReceiptRecord>> {
        let marker = marker.min(i64::MAX as u64) as i64;
        self.blocking(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT seq, round, payer, recipient, amount, counter_after, total_after
                 FROM receipts WHERE seq > ?1 ORDER BY seq",
            )?;
            let records = stmt
                .query_map(params![marker], row_to_record)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StoreExt;
    use payout_kernel_core::{fold_pending, AdmissionRule};

    const PAYER: PartyId = PartyId::from_bytes([0xaa; 32]);

    fn request(byte: u8, amount: u64) -> PayoutRequest {
        PayoutRequest::new(PartyId::from_bytes([byte; 32]), Amount(amount))
    }

    async fn settle(store: &SqliteStore, cap: Amount) -> Result<Vec<ReceiptRecord>> {
        let state = store.load_state().await?;
        let pending = store.entries_since(&state.checkpoint).await?;
        let outcome = fold_pending(&state, &pending, &AdmissionRule::new(cap), PAYER)?;
        store.commit_settlement(&outcome.to_commit()).await
    }

    #[tokio::test]
    async fn test_fresh_store_is_genesis() {
        let store = SqliteStore::open_memory().unwrap();
        assert_eq!(store.load_state().await.unwrap(), SettlementState::genesis());
        assert_eq!(store.log_tail().await.unwrap(), (0, Checkpoint::genesis()));
        assert!(store.rounds().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_matches_in_memory_chain() {
        let store = SqliteStore::open_memory().unwrap();
        let mut log = payout_kernel_core::ActionLog::new();

        for i in 0..4u8 {
            let req = request(i, i as u64 * 10);
            let stored = store.append_request(&req).await.unwrap();
            let local = log.append(req);
            assert_eq!(stored, local);
        }

        let entries = store.read_log(0, 4).await.unwrap();
        assert_eq!(entries, log.entries());
        assert_eq!(store.read_log(1, 3).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_large_values_are_bit_exact() {
        let store = SqliteStore::open_memory().unwrap();
        store.append_request(&request(1, u64::MAX)).await.unwrap();

        settle(&store, Amount(u64::MAX)).await.unwrap();

        let state = store.load_state().await.unwrap();
        assert_eq!(state.total, Amount(u64::MAX));
        let entries = store.read_log(0, 1).await.unwrap();
        assert_eq!(entries[0].request.amount, Amount(u64::MAX));
        let receipts = store.receipts_since(0).await.unwrap();
        assert_eq!(receipts[0].receipt.total_after, Amount(u64::MAX));
    }

    #[tokio::test]
    async fn test_entries_since_unknown() {
        let store = SqliteStore::open_memory().unwrap();
        store.append_request(&request(1, 1)).await.unwrap();
        let err = store
            .entries_since(&Checkpoint::from_bytes([0xcd; 32]))
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_core(),
            Some(CoreError::UnknownCheckpoint(_))
        ));
    }

    #[tokio::test]
    async fn test_commit_and_receipts() {
        let store = SqliteStore::open_memory().unwrap();
        store.append_request(&request(1, 10)).await.unwrap();
        store.append_request(&request(2, 50)).await.unwrap();

        let first = settle(&store, Amount(20)).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].receipt.counter_after, 1);

        store.append_request(&request(3, 5)).await.unwrap();
        let second = settle(&store, Amount(20)).await.unwrap();
        assert_eq!(second[0].seq, 3);
        assert_eq!(second[0].round, 2);

        assert_eq!(store.receipts_since(2).await.unwrap(), second);
        let state = store.load_state().await.unwrap();
        assert_eq!((state.counter, state.total.get(), state.version), (2, 15, 2));
    }

    #[tokio::test]
    async fn test_stale_commit_leaves_no_trace() {
        let store = SqliteStore::open_memory().unwrap();
        store.append_request(&request(1, 1)).await.unwrap();

        let state = store.load_state().await.unwrap();
        let pending = store.entries_since(&state.checkpoint).await.unwrap();
        let stale = fold_pending(&state, &pending, &AdmissionRule::new(Amount(1)), PAYER)
            .unwrap()
            .to_commit();

        settle(&store, Amount(1)).await.unwrap();
        let err = store.commit_settlement(&stale).await.unwrap_err();
        assert!(matches!(
            err.as_core(),
            Some(CoreError::NonMonotonicCheckpoint { .. })
        ));

        assert_eq!(store.rounds().await.unwrap().len(), 1);
        assert_eq!(store.receipts_since(0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reopen_restores_committed_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payout.db");

        let committed = {
            let store = SqliteStore::open(&path).unwrap();
            store.append_request(&request(1, 3)).await.unwrap();
            store.append_request(&request(2, 9)).await.unwrap();
            settle(&store, Amount(5)).await.unwrap();
            store.append_request(&request(3, 1)).await.unwrap();
            store.load_state().await.unwrap()
        };

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.load_state().await.unwrap(), committed);
        assert_eq!(store.log_tail().await.unwrap().0, 3);

        let report = store.verify_integrity().await.unwrap();
        assert_eq!(report.entries, 3);
        assert_eq!(report.rounds, 1);
        assert_eq!(report.receipts, 2);
        assert_eq!(report.state, committed);
    }

    #[tokio::test]
    async fn test_verify_integrity_detects_tampered_log() {
        let store = SqliteStore::open_memory().unwrap();
        store.append_request(&request(1, 3)).await.unwrap();
        store.append_request(&request(2, 4)).await.unwrap();

        let forged = canonical_request_bytes(&request(1, 300));
        store
            .blocking(move |conn| {
                conn.execute(
                    "UPDATE log_entries SET request = ?1 WHERE position = 1",
                    params![forged.as_ref()],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let err = store.verify_integrity().await.unwrap_err();
        assert!(matches!(
            err.as_core(),
            Some(CoreError::IntegrityViolation { position: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_verify_integrity_detects_tampered_state() {
        let store = SqliteStore::open_memory().unwrap();
        store.append_request(&request(1, 3)).await.unwrap();
        settle(&store, Amount(5)).await.unwrap();

        store
            .blocking(|conn| {
                conn.execute("UPDATE settlement_state SET total = 1000 WHERE id = 1", [])?;
                Ok(())
            })
            .await
            .unwrap();

        let err = store.verify_integrity().await.unwrap_err();
        assert!(matches!(
            err.as_core(),
            Some(CoreError::ReplayMismatch { .. })
        ));
    }
}
