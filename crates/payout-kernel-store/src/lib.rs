//! # Payout Kernel Store
//!
//! Storage abstraction for the Payout Kernel. Provides a trait-based interface
//! for persisting the action log, the settlement state and the receipt trail,
//! with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The store module abstracts persistence behind the [`Store`] trait,
//! allowing the engine to be storage-agnostic. The primary implementation
//! is [`SqliteStore`], with [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`StoreExt`] - Integrity verification over any store
//! - [`IntegrityReport`] - Result of a successful verification
//!
//! ## Usage
//!
//! ```rust,no_run
//! use payout_kernel_store::{SqliteStore, Store};
//! use payout_kernel_core::{Amount, PartyId, PayoutRequest};
//!
//! async fn example() {
//!     // Open a SQLite database
//!     let store = SqliteStore::open("payouts.db").unwrap();
//!
//!     // Append a request
//!     let request = PayoutRequest::new(PartyId::from_bytes([1; 32]), Amount::units(1));
//!     let entry = store.append_request(&request).await.unwrap();
//!     assert_eq!(entry.position, 1);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Append-only log**: entries are never updated or deleted
//! - **Conditional commit**: a settlement commit is validated against the stored
//!   version inside the same transaction that applies it
//! - **Bit-exact checkpoints**: stored as raw BLOBs and compared for equality

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{IntegrityReport, Store, StoreExt};
