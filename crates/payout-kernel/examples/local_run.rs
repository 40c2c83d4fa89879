//! Local run: three settlement rounds against an in-memory ledger.
//!
//! ```text
//! cargo run -p payout-kernel --example local_run [path/to/payouts.db]
//! ```
//!
//! With a path the log and settlement state persist in SQLite; rerunning
//! continues from the stored checkpoint.

use anyhow::Context;
use payout_kernel::core::{Amount, Keypair, PartyId};
use payout_kernel::store::SqliteStore;
use payout_kernel::{Engine, EngineConfig, InMemoryBalances, SettlementSummary};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "payout_kernel=info".into()),
        )
        .init();

    let payer = Keypair::from_seed(&[0xaa; 32]).party_id();
    let bob = Keypair::from_seed(&[0xb0; 32]).party_id();
    let danny = Keypair::from_seed(&[0xd0; 32]).party_id();
    let eve = Keypair::from_seed(&[0xe0; 32]).party_id();

    let store = match std::env::args().nth(1) {
        Some(path) => SqliteStore::open(&path).with_context(|| format!("opening {path}"))?,
        None => SqliteStore::open_memory()?,
    };
    let balances = InMemoryBalances::new();
    balances.fund(payer, Amount::units(100)).await?;

    let engine = Engine::open(store, balances, EngineConfig::default()).await?;

    // Round 1: Bob asks for 1.0 under a 1.0 cap
    engine.submit_request(bob, Amount::units(1)).await?;
    let summary = engine.run_settlement(payer, Amount::units(1)).await?;
    report("bob within cap", &summary);

    // Round 2: Danny asks for 2.0 under a 1.5 cap
    engine.submit_request(danny, Amount::units(2)).await?;
    let summary = engine
        .run_settlement(payer, Amount::milli_units(1_500))
        .await?;
    report("danny over cap", &summary);

    // Round 3: a mixed batch under a 3.0 cap
    for _ in 0..4 {
        engine.submit_request(eve, Amount::units(1)).await?;
    }
    for _ in 0..2 {
        engine
            .submit_request(danny, Amount::milli_units(1_500))
            .await?;
    }
    engine.submit_request(bob, Amount::units(3)).await?;
    let summary = engine.run_settlement(payer, Amount::units(3)).await?;
    report("mixed batch", &summary);

    println!();
    for (name, party) in [("payer", payer), ("bob", bob), ("danny", danny), ("eve", eve)] {
        print_balance(&engine, name, party).await;
    }

    let aggregates = engine.current_aggregates().await?;
    println!(
        "\naggregates: {}",
        serde_json::to_string(&aggregates).context("encoding aggregates")?
    );

    let report = engine.verify().await?;
    println!(
        "verified {} entries, {} rounds, {} receipts",
        report.entries, report.rounds, report.receipts
    );
    Ok(())
}

fn report(label: &str, summary: &SettlementSummary) {
    println!(
        "round {} ({label}): paid {} for {}, counter {}, total {}, checkpoint {}",
        summary.round,
        summary.paid_count,
        summary.paid_total,
        summary.counter,
        summary.total,
        summary.checkpoint
    );
    for record in &summary.receipts {
        println!(
            "  #{} {} {} -> counter {} total {}",
            record.seq,
            record.receipt.recipient,
            record.receipt.amount,
            record.receipt.counter_after,
            record.receipt.total_after
        );
    }
}

async fn print_balance(
    engine: &Engine<SqliteStore, InMemoryBalances>,
    name: &str,
    party: PartyId,
) {
    println!("{name:>6}: {}", engine.executor().balance_of(&party).await);
}
