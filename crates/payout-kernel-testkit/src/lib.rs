//! # Payout Kernel Testkit
//!
//! Testing utilities for the Payout Kernel.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: Named parties with fixed keys and a funded in-memory engine
//! - **Scenarios**: Scripted submit-then-settle steps with JSON reports
//! - **Generators**: Proptest strategies and a workload simulator for
//!   property-based testing
//!
//! ## Scenarios
//!
//! ```rust,no_run
//! use payout_kernel_core::Amount;
//! use payout_kernel_testkit::fixtures::TestFixture;
//! use payout_kernel_testkit::scenarios::{local_run, run_all, to_json};
//!
//! async fn example() {
//!     let fixture = TestFixture::funded(Amount::units(100)).await.unwrap();
//!     let reports = run_all(&fixture, &local_run()).await.unwrap();
//!     println!("{}", to_json(&reports).unwrap());
//! }
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use payout_kernel_testkit::generators::{naive_totals, simulate, Workload};
//!
//! proptest! {
//!     #[test]
//!     fn aggregates_match_model(workload: Workload) {
//!         let sim = simulate(&workload, payer).unwrap();
//!         prop_assert_eq!(sim.state.counter, naive_totals(&workload).0);
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod scenarios;

pub use fixtures::{multi_party, MemoryEngine, Parties, TestFixture, TestParty};
pub use generators::{simulate, Simulation, Workload};
pub use scenarios::{local_run, run_all, Scenario, ScenarioReport};
