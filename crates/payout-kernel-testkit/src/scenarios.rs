//! Scripted settlement scenarios.
//!
//! Each scenario submits a list of requests and runs one settlement. Run
//! in order on one fixture they reproduce the local run: Bob within the cap,
//! Danny over it, then a mixed batch that is admitted in full.

use serde::Serialize;

use payout_kernel::{EngineError, ReceiptRecord};
use payout_kernel_core::{Amount, Checkpoint, PartyId};

use crate::fixtures::{Parties, TestFixture};

/// A named recipient from [`Parties`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Who {
    Alice,
    Bob,
    Danny,
    Eve,
}

impl Who {
    pub fn resolve(self, parties: &Parties) -> PartyId {
        match self {
            Who::Alice => parties.alice.id(),
            Who::Bob => parties.bob.id(),
            Who::Danny => parties.danny.id(),
            Who::Eve => parties.eve.id(),
        }
    }
}

/// Requests to submit, then one settlement under `cap`.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: &'static str,
    pub requests: Vec<(Who, Amount)>,
    pub cap: Amount,
}

/// What a scenario observed.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub cap: Amount,
    pub submitted: usize,
    pub paid_count: u64,
    pub paid_total: Amount,
    pub counter_before: u64,
    pub counter_after: u64,
    pub total_before: Amount,
    pub total_after: Amount,
    pub checkpoint_before: Checkpoint,
    pub checkpoint_after: Checkpoint,
    /// Log tail right before settling.
    pub log_tail: Checkpoint,
    pub receipts: Vec<ReceiptRecord>,
}

impl ScenarioReport {
    /// The settlement consumed everything submitted before it.
    pub fn reached_tail(&self) -> bool {
        self.checkpoint_after == self.log_tail
    }
}

impl Scenario {
    /// Submit the requests and settle once.
    pub async fn run(&self, fixture: &TestFixture) -> Result<ScenarioReport, EngineError> {
        let engine = &fixture.engine;
        let before = engine.settlement_state().await?;

        let mut log_tail = before.checkpoint;
        for (who, amount) in &self.requests {
            let entry = engine
                .submit_request(who.resolve(&fixture.parties), *amount)
                .await?;
            log_tail = entry.checkpoint;
        }

        let summary = engine.run_settlement(fixture.payer(), self.cap).await?;

        Ok(ScenarioReport {
            name: self.name.to_string(),
            cap: self.cap,
            submitted: self.requests.len(),
            paid_count: summary.paid_count,
            paid_total: summary.paid_total,
            counter_before: before.counter,
            counter_after: summary.counter,
            total_before: before.total,
            total_after: summary.total,
            checkpoint_before: before.checkpoint,
            checkpoint_after: summary.checkpoint,
            log_tail,
            receipts: summary.receipts,
        })
    }
}

/// Bob asks for 1 under a cap of 1.
pub fn bob_within_cap() -> Scenario {
    Scenario {
        name: "bob_within_cap",
        requests: vec![(Who::Bob, Amount::units(1))],
        cap: Amount::units(1),
    }
}

/// Danny asks for 2 under a cap of 1.5.
pub fn danny_over_cap() -> Scenario {
    Scenario {
        name: "danny_over_cap",
        requests: vec![(Who::Danny, Amount::units(2))],
        cap: Amount::milli_units(1_500),
    }
}

/// Four 1s to Eve, two 1.5s to Danny and a 3 to Bob under a cap of 3.
pub fn mixed_batch() -> Scenario {
    let mut requests = vec![(Who::Eve, Amount::units(1)); 4];
    requests.extend([(Who::Danny, Amount::milli_units(1_500)); 2]);
    requests.push((Who::Bob, Amount::units(3)));
    Scenario {
        name: "mixed_batch",
        requests,
        cap: Amount::units(3),
    }
}

/// The local run, in order.
pub fn local_run() -> Vec<Scenario> {
    vec![bob_within_cap(), danny_over_cap(), mixed_batch()]
}

/// Run `scenarios` in order on one fixture.
pub async fn run_all(
    fixture: &TestFixture,
    scenarios: &[Scenario],
) -> Result<Vec<ScenarioReport>, EngineError> {
    let mut reports = Vec::with_capacity(scenarios.len());
    for scenario in scenarios {
        reports.push(scenario.run(fixture).await?);
    }
    Ok(reports)
}

pub fn to_json(reports: &[ScenarioReport]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(reports)
}
