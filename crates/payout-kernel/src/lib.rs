//! # Payout Kernel
//!
//! The unified API for batched payout settlement: parties submit payout
//! requests into an append-only log, and a settlement pays the eligible ones
//! in a single deterministic pass.
//!
//! ## Overview
//!
//! The Payout Kernel provides:
//!
//! - **Action log**: Append-only, hash-chained sequence of payout requests
//! - **Settlement**: A pure fold over the entries since the last checkpoint,
//!   admitting each request whose amount is within a per-round cap
//! - **Aggregates**: A request counter and paid total, versioned and committed
//!   atomically with the checkpoint
//! - **Receipts**: An audit record for every pending request folded
//!
//! ## Key Concepts
//!
//! - **Checkpoint**: Content hash of the log prefix already settled. Only moves forward.
//! - **Cap**: Per-settlement ceiling. Requests above it are skipped for good.
//! - **Filler**: A non-pending entry that is folded over but never paid or receipted.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use payout_kernel::{Engine, EngineConfig, InMemoryBalances};
//! use payout_kernel::core::{Amount, Keypair};
//! use payout_kernel::store::SqliteStore;
//!
//! async fn example() {
//!     let payer = Keypair::generate().party_id();
//!     let bob = Keypair::generate().party_id();
//!
//!     // Open storage and a funded ledger
//!     let store = SqliteStore::open("payouts.db").unwrap();
//!     let balances = InMemoryBalances::new();
//!     balances.fund(payer, Amount::units(10)).await.unwrap();
//!
//!     // Create the engine
//!     let engine = Engine::open(store, balances, EngineConfig::default())
//!         .await
//!         .unwrap();
//!
//!     // Submit and settle
//!     engine.submit_request(bob, Amount::units(1)).await.unwrap();
//!     let summary = engine.run_settlement(payer, Amount::units(1)).await.unwrap();
//!     assert_eq!(summary.paid_count, 1);
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `payout_kernel::core` - Core primitives (ActionLog, fold, receipts)
//! - `payout_kernel::store` - Storage abstraction and SQLite

pub mod engine;
pub mod error;
pub mod transfer;

// Re-export component crates
pub use payout_kernel_core as core;
pub use payout_kernel_store as store;

// Re-export main types for convenience
pub use engine::{Aggregates, Engine, EngineConfig, SettlementSummary};
pub use error::{EngineError, Result};
pub use transfer::{InMemoryBalances, TransferBatch, TransferError, TransferExecutor};

// Re-export commonly used core types
pub use payout_kernel_core::{
    Amount, Checkpoint, Keypair, LogEntry, PartyId, PayoutReceipt, PayoutRequest, ReceiptRecord,
    SettlementRound, SettlementState, TransferInstruction,
};
