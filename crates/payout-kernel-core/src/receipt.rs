//! Payout receipts and the append-only receipt sink.
//!
//! One receipt is produced per pending entry folded, paid or not. A receipt
//! for a cap-rejected entry carries the aggregates unchanged, which is how
//! an auditor tells it apart from a paid one.

use serde::{Deserialize, Serialize};

use crate::crypto::PartyId;
use crate::error::{CoreError, Result};
use crate::types::Amount;

/// Audit record for one pending entry folded in a settlement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PayoutReceipt {
    /// Settlement identity that authorized the round.
    pub payer: PartyId,
    pub recipient: PartyId,

    /// Requested amount, paid only if the aggregates moved.
    pub amount: Amount,

    /// Counter after this entry was folded.
    pub counter_after: u64,

    /// Total after this entry was folded.
    pub total_after: Amount,
}

/// A receipt at its position in the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptRecord {
    /// 1-indexed, gap-free across all rounds.
    pub seq: u64,

    /// The settlement round that emitted it.
    pub round: u64,

    pub receipt: PayoutReceipt,
}

/// Ordered, append-only list of receipt records.
#[derive(Debug, Clone, Default)]
pub struct ReceiptSink {
    records: Vec<ReceiptRecord>,
}

impl ReceiptSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from stored records, checking that sequence numbers are contiguous.
    pub fn from_records(records: Vec<ReceiptRecord>) -> Result<Self> {
        for (i, record) in records.iter().enumerate() {
            if record.seq != i as u64 + 1 {
                return Err(CoreError::IntegrityViolation {
                    position: record.seq,
                    reason: format!("receipt seq {} at index {}", record.seq, i),
                });
            }
        }
        Ok(Self { records })
    }

    /// Append one round's receipts in fold order, returning the new records.
    pub fn append_batch(&mut self, round: u64, receipts: Vec<PayoutReceipt>) -> Vec<ReceiptRecord> {
        let start = self.records.len();
        for receipt in receipts {
            let seq = self.records.len() as u64 + 1;
            self.records.push(ReceiptRecord {
                seq,
                round,
                receipt,
            });
        }
        self.records[start..].to_vec()
    }

    /// Records with `seq > marker`. Marker 0 returns everything.
    pub fn since(&self, marker: u64) -> &[ReceiptRecord] {
        // Clamp in u64 before narrowing to usize
        let start = marker.min(self.records.len() as u64) as usize;
        &self.records[start..]
    }

    /// Sequence number of the newest record, 0 when empty.
    pub fn last_seq(&self) -> u64 {
        self.records.len() as u64
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ReceiptRecord] {
        &self.records
    }
}
