//! Value transfer: the layer that actually moves funds for a settlement.
//!
//! The engine hands a whole round's instructions to a [`TransferExecutor`]
//! as one [`TransferBatch`]. Executors apply a batch entirely or not at all,
//! and can reverse a batch whose settlement commit later failed.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use payout_kernel_core::{Amount, PartyId, TransferInstruction};

/// Errors reported by a value-transfer layer, per batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("insufficient funds: {payer} holds {available}, batch needs {required}")]
    InsufficientFunds {
        payer: PartyId,
        required: Amount,
        available: Amount,
    },

    #[error("balance overflow for {0}")]
    BalanceOverflow(PartyId),

    #[error("batch total overflows")]
    BatchOverflow,

    /// The executor refused the batch for its own reasons.
    #[error("transfer rejected: {0}")]
    Rejected(String),
}

/// All transfers of one settlement round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferBatch {
    pub round: u64,
    pub payer: PartyId,
    pub instructions: Vec<TransferInstruction>,
}

impl TransferBatch {
    pub fn new(round: u64, payer: PartyId, instructions: Vec<TransferInstruction>) -> Self {
        Self {
            round,
            payer,
            instructions,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Sum of all instruction amounts.
    pub fn total(&self) -> Result<Amount, TransferError> {
        self.instructions
            .iter()
            .try_fold(Amount::ZERO, |acc, t| acc.checked_add(t.amount))
            .ok_or(TransferError::BatchOverflow)
    }
}

/// Executes transfer batches atomically.
#[async_trait]
pub trait TransferExecutor: Send + Sync {
    /// Apply every instruction of `batch`, or none.
    async fn execute(&self, batch: &TransferBatch) -> Result<(), TransferError>;

    /// Undo a previously executed batch.
    async fn reverse(&self, batch: &TransferBatch) -> Result<(), TransferError>;
}

#[async_trait]
impl<X: TransferExecutor + ?Sized> TransferExecutor for Arc<X> {
    async fn execute(&self, batch: &TransferBatch) -> Result<(), TransferError> {
        (**self).execute(batch).await
    }

    async fn reverse(&self, batch: &TransferBatch) -> Result<(), TransferError> {
        (**self).reverse(batch).await
    }
}

/// Reference executor over an in-memory balance map.
#[derive(Debug, Default)]
pub struct InMemoryBalances {
    balances: Mutex<HashMap<PartyId, Amount>>,
}

impl InMemoryBalances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `party` with `amount`, returning the new balance.
    pub async fn fund(&self, party: PartyId, amount: Amount) -> Result<Amount, TransferError> {
        let mut balances = self.balances.lock().await;
        let balance = balances.entry(party).or_insert(Amount::ZERO);
        *balance = balance
            .checked_add(amount)
            .ok_or(TransferError::BalanceOverflow(party))?;
        Ok(*balance)
    }

    pub async fn balance_of(&self, party: &PartyId) -> Amount {
        self.balances
            .lock()
            .await
            .get(party)
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    /// Apply `moves` to a copy of the balances and swap it in only if every
    /// move succeeds.
    async fn apply(
        &self,
        moves: impl Iterator<Item = (PartyId, PartyId, Amount)>,
    ) -> Result<(), TransferError> {
        let mut balances = self.balances.lock().await;
        let mut staged = balances.clone();

        for (from, to, amount) in moves {
            let available = staged.get(&from).copied().unwrap_or(Amount::ZERO);
            let debited = available
                .checked_sub(amount)
                .ok_or(TransferError::InsufficientFunds {
                    payer: from,
                    required: amount,
                    available,
                })?;
            staged.insert(from, debited);

            let credited = staged
                .get(&to)
                .copied()
                .unwrap_or(Amount::ZERO)
                .checked_add(amount)
                .ok_or(TransferError::BalanceOverflow(to))?;
            staged.insert(to, credited);
        }

        *balances = staged;
        Ok(())
    }
}

#[async_trait]
impl TransferExecutor for InMemoryBalances {
    async fn execute(&self, batch: &TransferBatch) -> Result<(), TransferError> {
        let required = batch.total()?;
        let available = self.balance_of(&batch.payer).await;
        if required > available {
            return Err(TransferError::InsufficientFunds {
                payer: batch.payer,
                required,
                available,
            });
        }

        self.apply(batch.instructions.iter().map(|t| (t.from, t.to, t.amount)))
            .await
    }

    async fn reverse(&self, batch: &TransferBatch) -> Result<(), TransferError> {
        self.apply(
            batch
                .instructions
                .iter()
                .rev()
                .map(|t| (t.to, t.from, t.amount)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYER: PartyId = PartyId::from_bytes([0xaa; 32]);
    const BOB: PartyId = PartyId::from_bytes([0xb0; 32]);
    const EVE: PartyId = PartyId::from_bytes([0xe0; 32]);

    fn batch(amounts: &[(PartyId, u64)]) -> TransferBatch {
        TransferBatch::new(
            1,
            PAYER,
            amounts
                .iter()
                .map(|(to, units)| TransferInstruction {
                    from: PAYER,
                    to: *to,
                    amount: Amount::units(*units),
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_execute_moves_funds() {
        let balances = InMemoryBalances::new();
        balances.fund(PAYER, Amount::units(10)).await.unwrap();

        balances.execute(&batch(&[(BOB, 3), (EVE, 2)])).await.unwrap();

        assert_eq!(balances.balance_of(&PAYER).await, Amount::units(5));
        assert_eq!(balances.balance_of(&BOB).await, Amount::units(3));
        assert_eq!(balances.balance_of(&EVE).await, Amount::units(2));
    }

    #[tokio::test]
    async fn test_insufficient_funds_is_all_or_nothing() {
        let balances = InMemoryBalances::new();
        balances.fund(PAYER, Amount::units(4)).await.unwrap();

        let err = balances
            .execute(&batch(&[(BOB, 3), (EVE, 2)]))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::InsufficientFunds { .. }));
        assert_eq!(balances.balance_of(&PAYER).await, Amount::units(4));
        assert_eq!(balances.balance_of(&BOB).await, Amount::ZERO);
    }

    #[tokio::test]
    async fn test_reverse_restores_balances() {
        let balances = InMemoryBalances::new();
        balances.fund(PAYER, Amount::units(10)).await.unwrap();
        let b = batch(&[(BOB, 3), (EVE, 2)]);

        balances.execute(&b).await.unwrap();
        balances.reverse(&b).await.unwrap();

        assert_eq!(balances.balance_of(&PAYER).await, Amount::units(10));
        assert_eq!(balances.balance_of(&BOB).await, Amount::ZERO);
    }

    #[tokio::test]
    async fn test_reverse_fails_when_recipient_spent() {
        let balances = InMemoryBalances::new();
        balances.fund(PAYER, Amount::units(10)).await.unwrap();
        let b = batch(&[(BOB, 3)]);
        balances.execute(&b).await.unwrap();

        // Bob moves the funds on before the reversal
        balances
            .execute(&TransferBatch::new(
                9,
                BOB,
                vec![TransferInstruction {
                    from: BOB,
                    to: EVE,
                    amount: Amount::units(3),
                }],
            ))
            .await
            .unwrap();

        assert!(balances.reverse(&b).await.is_err());
        assert_eq!(balances.balance_of(&PAYER).await, Amount::units(7));
    }

    #[tokio::test]
    async fn test_fund_overflow() {
        let balances = InMemoryBalances::new();
        balances.fund(BOB, Amount(u64::MAX)).await.unwrap();
        assert_eq!(
            balances.fund(BOB, Amount(1)).await,
            Err(TransferError::BalanceOverflow(BOB))
        );
    }

    #[test]
    fn test_batch_total() {
        let b = batch(&[(BOB, 1), (EVE, 4)]);
        assert_eq!(b.total().unwrap(), Amount::units(5));
        assert!(TransferBatch::new(1, PAYER, Vec::new()).is_empty());
    }
}
