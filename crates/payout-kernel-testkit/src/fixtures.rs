//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: named parties with fixed keys
//! and a funded in-memory engine.

use payout_kernel::{Engine, EngineConfig, InMemoryBalances, TransferError};
use payout_kernel_core::{Amount, Keypair, PartyId};
use payout_kernel_store::MemoryStore;

/// The in-memory engine used by fixtures and scenarios.
pub type MemoryEngine = Engine<MemoryStore, InMemoryBalances>;

/// A party with a deterministic keypair.
pub struct TestParty {
    pub name: &'static str,
    pub keypair: Keypair,
}

impl TestParty {
    /// Create with a deterministic keypair from seed.
    pub fn with_seed(name: &'static str, seed: [u8; 32]) -> Self {
        Self {
            name,
            keypair: Keypair::from_seed(&seed),
        }
    }

    pub fn id(&self) -> PartyId {
        self.keypair.party_id()
    }
}

/// The cast of the local run.
pub struct Parties {
    /// Funds every settlement.
    pub payer: TestParty,
    pub alice: TestParty,
    pub bob: TestParty,
    pub danny: TestParty,
    pub eve: TestParty,
}

impl Parties {
    pub fn new() -> Self {
        Self {
            payer: TestParty::with_seed("payer", [0xaa; 32]),
            alice: TestParty::with_seed("alice", [0xa1; 32]),
            bob: TestParty::with_seed("bob", [0xb0; 32]),
            danny: TestParty::with_seed("danny", [0xd0; 32]),
            eve: TestParty::with_seed("eve", [0xe0; 32]),
        }
    }

    /// Every recipient, payer excluded.
    pub fn recipients(&self) -> [&TestParty; 4] {
        [&self.alice, &self.bob, &self.danny, &self.eve]
    }
}

impl Default for Parties {
    fn default() -> Self {
        Self::new()
    }
}

/// A test fixture with named parties and an engine whose payer is funded.
pub struct TestFixture {
    pub parties: Parties,
    pub engine: MemoryEngine,
}

impl TestFixture {
    /// Create a fixture whose payer holds `funds`.
    pub async fn funded(funds: Amount) -> Result<Self, TransferError> {
        Self::funded_with(funds, EngineConfig::default()).await
    }

    pub async fn funded_with(funds: Amount, config: EngineConfig) -> Result<Self, TransferError> {
        let parties = Parties::new();
        let balances = InMemoryBalances::new();
        balances.fund(parties.payer.id(), funds).await?;
        Ok(Self {
            engine: Engine::new(MemoryStore::new(), balances, config),
            parties,
        })
    }

    pub fn payer(&self) -> PartyId {
        self.parties.payer.id()
    }

    /// Current balance of `party` in the fixture's ledger.
    pub async fn balance(&self, party: &TestParty) -> Amount {
        self.engine.executor().balance_of(&party.id()).await
    }
}

/// Create `count` recipients with distinct seeds for bulk tests.
pub fn multi_party(count: usize) -> Vec<PartyId> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[..8].copy_from_slice(&(i as u64).to_be_bytes());
            Keypair::from_seed(&seed).party_id()
        })
        .collect()
}
