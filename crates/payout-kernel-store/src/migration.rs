//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.
//!
//! All u64 quantities (positions, amounts, counters, versions) are stored in
//! INTEGER columns as the bit pattern of the value cast to i64. Checkpoints and
//! party ids are 32-byte BLOBs.

use payout_kernel_core::Checkpoint;
use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    // Create migrations table if it doesn't exist
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    // Apply migrations
    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(from = current, to = CURRENT_VERSION, "schema migrated");
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Action log: append-only, one row per request
        CREATE TABLE log_entries (
            position INTEGER PRIMARY KEY,     -- 1-indexed
            request BLOB NOT NULL,            -- canonical CBOR of the request
            checkpoint BLOB NOT NULL UNIQUE,  -- 32 bytes, chain hash ending here
            appended_at INTEGER NOT NULL      -- local time (Unix ms)
        );

        -- Settlement state: exactly one row, replaced on every commit
        CREATE TABLE settlement_state (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            counter INTEGER NOT NULL,
            total INTEGER NOT NULL,
            checkpoint BLOB NOT NULL,         -- 32 bytes
            version INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Settlement history
        CREATE TABLE settlement_rounds (
            round INTEGER PRIMARY KEY,
            payer BLOB NOT NULL,              -- 32 bytes
            cap INTEGER NOT NULL,
            from_checkpoint BLOB NOT NULL,
            to_checkpoint BLOB NOT NULL,
            folded INTEGER NOT NULL,
            admitted INTEGER NOT NULL,
            counter_after INTEGER NOT NULL,
            total_after INTEGER NOT NULL,
            committed_at INTEGER NOT NULL
        );

        -- Receipt audit trail
        CREATE TABLE receipts (
            seq INTEGER PRIMARY KEY,          -- 1-indexed, gap-free
            round INTEGER NOT NULL REFERENCES settlement_rounds(round),
            payer BLOB NOT NULL,
            recipient BLOB NOT NULL,
            amount INTEGER NOT NULL,
            counter_after INTEGER NOT NULL,
            total_after INTEGER NOT NULL
        );

        CREATE INDEX idx_receipts_round ON receipts(round);
        "#,
    )?;

    let genesis = Checkpoint::genesis();
    conn.execute(
        "INSERT INTO settlement_state (id, counter, total, checkpoint, version, updated_at)
         VALUES (1, 0, 0, ?1, 0, ?2)",
        rusqlite::params![genesis.as_bytes().as_slice(), now_millis()],
    )?;

    Ok(())
}

/// Get current time in milliseconds.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}
