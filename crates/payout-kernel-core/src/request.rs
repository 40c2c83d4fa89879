//! Payout requests and the log entries that carry them.
//!
//! A request is immutable once appended. Changes are represented as new
//! requests; nothing in the log is edited or removed.

use serde::{Deserialize, Serialize};

use crate::crypto::PartyId;
use crate::types::{Amount, Checkpoint};

/// A submitted payout request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PayoutRequest {
    /// Who is to be paid.
    pub recipient: PartyId,

    /// Requested amount in base units.
    pub amount: Amount,

    /// `true` for genuine requests. `false` marks filler entries that are
    /// folded over but never paid, counted or receipted.
    pub is_pending: bool,
}

impl PayoutRequest {
    /// A genuine request.
    pub fn new(recipient: PartyId, amount: Amount) -> Self {
        Self {
            recipient,
            amount,
            is_pending: true,
        }
    }

    /// A padding entry.
    pub fn filler() -> Self {
        Self {
            recipient: PartyId::ZERO,
            amount: Amount::ZERO,
            is_pending: false,
        }
    }

    pub fn is_filler(&self) -> bool {
        !self.is_pending
    }
}

/// A request at its position in the action log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Position in the log (1-indexed).
    pub position: u64,

    /// The request.
    pub request: PayoutRequest,

    /// Checkpoint of the prefix ending at this entry.
    pub checkpoint: Checkpoint,
}
