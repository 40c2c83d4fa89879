//! The action log: an append-only arena of payout requests addressed by a
//! running Blake3 hash chain.
//!
//! ```text
//! C_0 = genesis
//! C_n = Blake3("payout-log-v0:" || C_{n-1} || be_u64(n) || canonical(request_n))
//! ```
//!
//! Every prefix of the log is identified by its checkpoint `C_n`. The log
//! keeps an index from checkpoint to prefix length so "everything after
//! this checkpoint" is a slice, not a rescan.

use std::collections::HashMap;

use crate::canonical::canonical_request_bytes;
use crate::error::{CoreError, Result};
use crate::request::{LogEntry, PayoutRequest};
use crate::types::{Checkpoint, LOG_DOMAIN};
use crate::validation::verify_chain;

/// Extend the chain by one entry.
pub fn chain_step(prev: &Checkpoint, position: u64, request: &PayoutRequest) -> Checkpoint {
    let mut hasher = blake3::Hasher::new();
    hasher.update(LOG_DOMAIN);
    hasher.update(prev.as_bytes());
    hasher.update(&position.to_be_bytes());
    hasher.update(&canonical_request_bytes(request));
    Checkpoint(*hasher.finalize().as_bytes())
}

/// The checkpoint reached by folding `entries` onto `base`.
///
/// Order-sensitive. Returns `base` for an empty slice.
pub fn hash_of(base: Checkpoint, entries: &[LogEntry]) -> Checkpoint {
    entries
        .iter()
        .fold(base, |acc, e| chain_step(&acc, e.position, &e.request))
}

/// Append-only sequence of [`LogEntry`] with a checkpoint index.
#[derive(Debug, Clone)]
pub struct ActionLog {
    entries: Vec<LogEntry>,
    index: HashMap<Checkpoint, u64>,
}

impl Default for ActionLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionLog {
    /// An empty log whose tail is the genesis checkpoint.
    pub fn new() -> Self {
        let mut index = HashMap::new();
        index.insert(Checkpoint::genesis(), 0);
        Self {
            entries: Vec::new(),
            index,
        }
    }

    /// Rebuild a log from stored entries, verifying every link.
    pub fn from_entries(entries: Vec<LogEntry>) -> Result<Self> {
        verify_chain(Checkpoint::genesis(), 0, &entries)?;

        let mut index = HashMap::with_capacity(entries.len() + 1);
        index.insert(Checkpoint::genesis(), 0);
        for e in &entries {
            index.insert(e.checkpoint, e.position);
        }
        Ok(Self { entries, index })
    }

    /// Append a request after the current tail.
    ///
    /// Never rejects on content; identical requests are independent entries.
    pub fn append(&mut self, request: PayoutRequest) -> LogEntry {
        let position = self.entries.len() as u64 + 1;
        let checkpoint = chain_step(&self.tail(), position, &request);
        let entry = LogEntry {
            position,
            request,
            checkpoint,
        };
        self.index.insert(checkpoint, position);
        self.entries.push(entry.clone());
        entry
    }

    /// Every entry appended after `checkpoint`, in insertion order.
    pub fn entries_since(&self, checkpoint: &Checkpoint) -> Result<&[LogEntry]> {
        let position = self
            .position_of(checkpoint)
            .ok_or(CoreError::UnknownCheckpoint(*checkpoint))?;
        Ok(&self.entries[position as usize..])
    }

    /// Entries with `after < position <= through`.
    pub fn range(&self, after: u64, through: u64) -> &[LogEntry] {
        let len = self.entries.len() as u64;
        let start = after.min(len) as usize;
        let end = through.min(len) as usize;
        if start >= end {
            return &[];
        }
        &self.entries[start..end]
    }

    /// Prefix length identified by `checkpoint`, if it belongs to this log.
    pub fn position_of(&self, checkpoint: &Checkpoint) -> Option<u64> {
        self.index.get(checkpoint).copied()
    }

    /// Checkpoint of the whole log.
    pub fn tail(&self) -> Checkpoint {
        self.entries
            .last()
            .map(|e| e.checkpoint)
            .unwrap_or_else(Checkpoint::genesis)
    }

    pub fn len(&self) -> u64 {
        self.entries.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn get(&self, position: u64) -> Option<&LogEntry> {
        if position == 0 {
            return None;
        }
        usize::try_from(position - 1)
            .ok()
            .and_then(|index| self.entries.get(index))
    }
}
