//! # Payout Kernel Core
//!
//! Pure primitives for the Payout Kernel: the action log, checkpoints, the
//! settlement fold and receipts.
//!
//! This crate contains no I/O, no storage, no networking. It is pure computation
//! over hash-chained data structures.
//!
//! ## Key Types
//!
//! - [`ActionLog`] - Append-only log of [`PayoutRequest`]s addressed by [`Checkpoint`]s
//! - [`fold_pending`] - The settlement reduction under an [`AdmissionRule`]
//! - [`SettlementState`] - Versioned aggregates (counter, total, checkpoint)
//! - [`PayoutReceipt`] - Audit record per pending entry folded
//!
//! ## Canonicalization
//!
//! Requests are hashed over deterministic CBOR. See [`canonical`] module.

pub mod canonical;
pub mod crypto;
pub mod error;
pub mod fold;
pub mod log;
pub mod receipt;
pub mod replay;
pub mod request;
pub mod state;
pub mod types;
pub mod validation;

pub use canonical::{canonical_request_bytes, decode_request};
pub use crypto::{Keypair, PartyId};
pub use error::{CoreError, Result};
pub use fold::{fold_pending, AdmissionRule, FoldStats, SettlementOutcome, TransferInstruction};
pub use log::{chain_step, hash_of, ActionLog};
pub use receipt::{PayoutReceipt, ReceiptRecord, ReceiptSink};
pub use replay::replay_rounds;
pub use request::{LogEntry, PayoutRequest};
pub use state::{SettlementCommit, SettlementRound, SettlementState};
pub use types::{Amount, Checkpoint, LOG_DOMAIN};
pub use validation::{verify_chain, verify_slice};
