//! Settlement state: the single versioned aggregate record.
//!
//! `SettlementState` is mutated only by committing a [`SettlementCommit`].
//! The `version` field is the optimistic-concurrency token: a commit names
//! the state it was computed from, and is rejected if anything else was
//! committed in between.

use serde::{Deserialize, Serialize};

use crate::crypto::PartyId;
use crate::error::{CoreError, Result};
use crate::receipt::PayoutReceipt;
use crate::types::{Amount, Checkpoint};

/// Aggregates plus the checkpoint they were folded up to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SettlementState {
    /// Number of requests admitted across all rounds.
    pub counter: u64,

    /// Sum of admitted amounts across all rounds.
    pub total: Amount,

    /// Everything at or before this checkpoint has been folded.
    pub checkpoint: Checkpoint,

    /// Number of committed rounds.
    pub version: u64,
}

impl Default for SettlementState {
    fn default() -> Self {
        Self::genesis()
    }
}

impl SettlementState {
    /// The state before any settlement.
    pub fn genesis() -> Self {
        Self {
            counter: 0,
            total: Amount::ZERO,
            checkpoint: Checkpoint::genesis(),
            version: 0,
        }
    }

    /// Check that `commit` may replace `self` (the stored state).
    ///
    /// `position_of` resolves a checkpoint to its prefix length in the log.
    pub fn validate_successor(
        &self,
        commit: &SettlementCommit,
        position_of: impl Fn(&Checkpoint) -> Option<u64>,
    ) -> Result<()> {
        let next = &commit.next;

        let proposed_position = position_of(&next.checkpoint)
            .ok_or(CoreError::UnknownCheckpoint(next.checkpoint))?;
        let stored_position = position_of(&self.checkpoint)
            .ok_or(CoreError::UnknownCheckpoint(self.checkpoint))?;

        let conflict = || CoreError::NonMonotonicCheckpoint {
            stored: self.checkpoint,
            stored_version: self.version,
            proposed: next.checkpoint,
        };

        if commit.prior.version != self.version || proposed_position < stored_position {
            return Err(conflict());
        }
        if commit.prior != *self {
            return Err(CoreError::InvalidCommit(
                "prior state does not match stored state".into(),
            ));
        }

        let expected_version = self
            .version
            .checked_add(1)
            .ok_or(CoreError::ArithmeticOverflow("version"))?;
        if next.version != expected_version {
            return Err(CoreError::InvalidCommit(format!(
                "version {} does not follow {}",
                next.version, self.version
            )));
        }

        if next.counter < self.counter || next.total < self.total {
            return Err(CoreError::InvalidCommit("aggregates regress".into()));
        }

        if commit.round.round != next.version
            || commit.round.from_checkpoint != self.checkpoint
            || commit.round.to_checkpoint != next.checkpoint
            || commit.round.counter_after != next.counter
            || commit.round.total_after != next.total
        {
            return Err(CoreError::InvalidCommit(
                "round record does not describe the transition".into(),
            ));
        }

        Ok(())
    }
}

/// History record of one committed settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRound {
    /// Equals the state version this round produced.
    pub round: u64,

    /// Authorizing settlement identity.
    pub payer: PartyId,

    /// Per-entry ceiling applied in this round.
    pub cap: Amount,

    pub from_checkpoint: Checkpoint,
    pub to_checkpoint: Checkpoint,

    /// Entries read, including fillers.
    pub folded: u64,

    /// Entries paid.
    pub admitted: u64,

    pub counter_after: u64,
    pub total_after: Amount,
}

/// The single mutation unit applied to a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementCommit {
    /// The state the fold started from.
    pub prior: SettlementState,

    /// The state to install.
    pub next: SettlementState,

    pub round: SettlementRound,

    /// Receipts in fold order.
    pub receipts: Vec<PayoutReceipt>,
}
