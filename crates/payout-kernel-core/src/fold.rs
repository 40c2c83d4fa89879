//! The settlement fold.
//!
//! A single left-to-right pass over the entries read since the stored
//! checkpoint. The fold is pure: it returns the next state, the transfers to
//! execute and the receipts to emit, and leaves executing them to the caller.
//!
//! The checkpoint always advances to the end of what was read, including
//! entries rejected by the cap. Those entries are never offered to a later
//! round.

use serde::{Deserialize, Serialize};

use crate::crypto::PartyId;
use crate::error::{CoreError, Result};
use crate::receipt::PayoutReceipt;
use crate::request::{LogEntry, PayoutRequest};
use crate::state::{SettlementCommit, SettlementRound, SettlementState};
use crate::types::Amount;
use crate::validation::verify_slice;

/// Per-entry admission under a caller-supplied cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionRule {
    pub cap: Amount,
}

impl AdmissionRule {
    pub fn new(cap: Amount) -> Self {
        Self { cap }
    }

    /// Pending and within the cap. Fillers are never admitted.
    pub fn admits(&self, request: &PayoutRequest) -> bool {
        request.is_pending && request.amount <= self.cap
    }
}

/// Move `amount` from the settlement authority to a recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferInstruction {
    pub from: PartyId,
    pub to: PartyId,
    pub amount: Amount,
}

/// Size of one fold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldStats {
    /// Entries read, fillers included.
    pub folded: u64,
    pub admitted: u64,
    /// Pending entries over the cap.
    pub rejected: u64,
    pub filler: u64,
    pub paid_total: Amount,
}

/// Everything a settlement round produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementOutcome {
    pub prior: SettlementState,
    pub next: SettlementState,
    pub transfers: Vec<TransferInstruction>,
    pub receipts: Vec<PayoutReceipt>,
    pub stats: FoldStats,
    pub round: SettlementRound,
}

impl SettlementOutcome {
    /// Nothing changes but the version.
    pub fn is_empty(&self) -> bool {
        self.stats.folded == 0
    }

    /// The commit that installs this outcome.
    pub fn to_commit(&self) -> SettlementCommit {
        SettlementCommit {
            prior: self.prior,
            next: self.next,
            round: self.round.clone(),
            receipts: self.receipts.clone(),
        }
    }
}

/// Fold `pending` (the entries after `prior.checkpoint`) under `rule`.
///
/// Fails if `pending` does not chain onto `prior.checkpoint`, or if the
/// counter, total or version would overflow. Nothing is partially applied
/// on failure since nothing is applied at all.
pub fn fold_pending(
    prior: &SettlementState,
    pending: &[LogEntry],
    rule: &AdmissionRule,
    payer: PartyId,
) -> Result<SettlementOutcome> {
    // Every link is rechecked, not only the last one
    let checkpoint = verify_slice(prior.checkpoint, pending)?;

    let mut counter = prior.counter;
    let mut total = prior.total;
    let mut stats = FoldStats::default();
    let mut transfers = Vec::new();
    let mut receipts = Vec::new();

    for entry in pending {
        let request = &entry.request;
        stats.folded += 1;

        if !request.is_pending {
            stats.filler += 1;
            continue;
        }

        if rule.admits(request) {
            counter = counter
                .checked_add(1)
                .ok_or(CoreError::ArithmeticOverflow("counter"))?;
            total = total
                .checked_add(request.amount)
                .ok_or(CoreError::ArithmeticOverflow("total"))?;
            stats.admitted += 1;
            stats.paid_total = stats
                .paid_total
                .checked_add(request.amount)
                .ok_or(CoreError::ArithmeticOverflow("paid total"))?;
            transfers.push(TransferInstruction {
                from: payer,
                to: request.recipient,
                amount: request.amount,
            });
        } else {
            stats.rejected += 1;
        }

        receipts.push(PayoutReceipt {
            payer,
            recipient: request.recipient,
            amount: request.amount,
            counter_after: counter,
            total_after: total,
        });
    }

    let version = prior
        .version
        .checked_add(1)
        .ok_or(CoreError::ArithmeticOverflow("version"))?;

    let next = SettlementState {
        counter,
        total,
        checkpoint,
        version,
    };

    let round = SettlementRound {
        round: version,
        payer,
        cap: rule.cap,
        from_checkpoint: prior.checkpoint,
        to_checkpoint: checkpoint,
        folded: stats.folded,
        admitted: stats.admitted,
        counter_after: counter,
        total_after: total,
    };

    Ok(SettlementOutcome {
        prior: *prior,
        next,
        transfers,
        receipts,
        stats,
        round,
    })
}
