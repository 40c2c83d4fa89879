//! Proptest generators for property-based testing.
//!
//! Besides value strategies, this module has a [`Workload`] (requests
//! interleaved with settlements under varying caps) and [`simulate`], which
//! drives a workload through the core types exactly as the engine does,
//! minus storage and transfers.

use proptest::prelude::*;

use payout_kernel_core::{
    fold_pending, ActionLog, AdmissionRule, Amount, CoreError, PartyId, PayoutRequest,
    ReceiptSink, SettlementRound, SettlementState, TransferInstruction,
};

use crate::fixtures::multi_party;

/// Generate a party: either fresh, or one of a small pool so duplicates occur.
pub fn party_id() -> impl Strategy<Value = PartyId> {
    prop_oneof![
        any::<[u8; 32]>().prop_map(PartyId::from_bytes),
        prop::sample::select(multi_party(4)),
    ]
}

/// Generate an amount up to 1000 whole units, in thousandths.
pub fn amount() -> impl Strategy<Value = Amount> {
    (0u64..=1_000_000).prop_map(Amount::milli_units)
}

/// Generate a cap, including the extremes.
pub fn cap() -> impl Strategy<Value = Amount> {
    prop_oneof![
        1 => Just(Amount::ZERO),
        1 => Just(Amount(u64::MAX)),
        8 => amount(),
    ]
}

/// Generate a request; roughly one in five is a filler.
pub fn payout_request() -> impl Strategy<Value = PayoutRequest> {
    prop_oneof![
        1 => Just(PayoutRequest::filler()),
        4 => (party_id(), amount()).prop_map(|(to, amt)| PayoutRequest::new(to, amt)),
    ]
}

/// Requests appended before one settlement, and that settlement's cap.
#[derive(Debug, Clone)]
pub struct Batch {
    pub requests: Vec<PayoutRequest>,
    pub cap: Amount,
}

/// A sequence of append-then-settle steps.
#[derive(Debug, Clone)]
pub struct Workload {
    pub batches: Vec<Batch>,
}

impl Arbitrary for Workload {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop::collection::vec(
            (prop::collection::vec(payout_request(), 0..24), cap())
                .prop_map(|(requests, cap)| Batch { requests, cap }),
            1..8,
        )
        .prop_map(|batches| Workload { batches })
        .boxed()
    }
}

impl Workload {
    /// Pending requests across all batches.
    pub fn pending_count(&self) -> usize {
        self.batches
            .iter()
            .flat_map(|b| &b.requests)
            .filter(|r| r.is_pending)
            .count()
    }
}

/// The result of driving a workload through the core.
#[derive(Debug, Clone)]
pub struct Simulation {
    pub log: ActionLog,
    pub state: SettlementState,
    pub rounds: Vec<SettlementRound>,
    pub receipts: ReceiptSink,
    pub transfers: Vec<TransferInstruction>,
}

/// Append each batch, then fold and commit it, validating every commit.
pub fn simulate(workload: &Workload, payer: PartyId) -> Result<Simulation, CoreError> {
    let mut log = ActionLog::new();
    let mut state = SettlementState::genesis();
    let mut rounds = Vec::new();
    let mut receipts = ReceiptSink::new();
    let mut transfers = Vec::new();

    for batch in &workload.batches {
        for request in &batch.requests {
            log.append(request.clone());
        }

        let pending = log.entries_since(&state.checkpoint)?;
        let outcome = fold_pending(&state, pending, &AdmissionRule::new(batch.cap), payer)?;
        state.validate_successor(&outcome.to_commit(), |c| log.position_of(c))?;

        receipts.append_batch(outcome.round.round, outcome.receipts);
        transfers.extend(outcome.transfers);
        rounds.push(outcome.round);
        state = outcome.next;
    }

    Ok(Simulation {
        log,
        state,
        rounds,
        receipts,
        transfers,
    })
}

/// Expected aggregates, judging each request once against its own batch's cap.
pub fn naive_totals(workload: &Workload) -> (u64, u128) {
    let mut counter = 0u64;
    let mut total = 0u128;
    for batch in &workload.batches {
        for request in &batch.requests {
            if request.is_pending && request.amount <= batch.cap {
                counter += 1;
                total += u128::from(request.amount.get());
            }
        }
    }
    (counter, total)
}
