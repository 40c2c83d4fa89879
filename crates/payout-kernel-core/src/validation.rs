//! Log validation: position and hash-chain checks.

use crate::error::{CoreError, Result};
use crate::log::chain_step;
use crate::request::LogEntry;
use crate::types::Checkpoint;

/// Verify that `entries` extend the prefix `(base, base_position)`.
///
/// This performs, per entry:
/// - Position check (contiguous, starting at `base_position + 1`)
/// - Chain link check (stored checkpoint equals the recomputed one)
///
/// Returns the checkpoint of the last entry, or `base` when empty.
pub fn verify_chain(
    base: Checkpoint,
    base_position: u64,
    entries: &[LogEntry],
) -> Result<Checkpoint> {
    let mut expected_position = base_position;
    let mut prev = base;

    for entry in entries {
        // 1. Contiguous positions
        expected_position = expected_position
            .checked_add(1)
            .ok_or(CoreError::ArithmeticOverflow("log position"))?;
        if entry.position != expected_position {
            return Err(CoreError::IntegrityViolation {
                position: entry.position,
                reason: format!("expected position {expected_position}"),
            });
        }

        // 2. Recompute link
        let computed = chain_step(&prev, entry.position, &entry.request);
        if computed != entry.checkpoint {
            return Err(CoreError::IntegrityViolation {
                position: entry.position,
                reason: format!("checkpoint {} does not match chain {}", entry.checkpoint, computed),
            });
        }
        prev = computed;
    }

    Ok(prev)
}

/// Verify `entries` as a slice read after `base`, where the base position is
/// implied by the first entry.
pub fn verify_slice(base: Checkpoint, entries: &[LogEntry]) -> Result<Checkpoint> {
    match entries.first() {
        Some(first) if first.position == 0 => Err(CoreError::IntegrityViolation {
            position: 0,
            reason: "position 0 is reserved for genesis".into(),
        }),
        Some(first) => verify_chain(base, first.position - 1, entries),
        None => Ok(base),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PartyId;
    use crate::log::ActionLog;
    use crate::request::PayoutRequest;
    use crate::types::Amount;

    fn sample_log(n: u8) -> ActionLog {
        let mut log = ActionLog::new();
        for i in 0..n {
            log.append(PayoutRequest::new(
                PartyId::from_bytes([i; 32]),
                Amount::units(i as u64 + 1),
            ));
        }
        log
    }

    #[test]
    fn test_valid_chain() {
        let log = sample_log(4);
        let tail = verify_chain(Checkpoint::genesis(), 0, log.entries()).unwrap();
        assert_eq!(tail, log.tail());
    }

    #[test]
    fn test_empty_chain_returns_base() {
        let base = Checkpoint::from_bytes([9; 32]);
        assert_eq!(verify_chain(base, 7, &[]).unwrap(), base);
        assert_eq!(verify_slice(base, &[]).unwrap(), base);
    }

    #[test]
    fn test_position_gap() {
        let log = sample_log(3);
        let mut entries = log.entries().to_vec();
        entries.remove(1);
        assert!(matches!(
            verify_chain(Checkpoint::genesis(), 0, &entries),
            Err(CoreError::IntegrityViolation { position: 3, .. })
        ));
    }

    #[test]
    fn test_reordered_entries() {
        let log = sample_log(3);
        let mut entries = log.entries().to_vec();
        entries.swap(0, 1);
        assert!(verify_chain(Checkpoint::genesis(), 0, &entries).is_err());
    }

    #[test]
    fn test_slice_from_middle() {
        let log = sample_log(5);
        let base = log.get(2).unwrap().checkpoint;
        let tail = verify_slice(base, log.range(2, 5)).unwrap();
        assert_eq!(tail, log.tail());
    }

    #[test]
    fn test_slice_against_wrong_base() {
        let log = sample_log(5);
        let wrong = log.get(1).unwrap().checkpoint;
        assert!(matches!(
            verify_slice(wrong, log.range(2, 5)),
            Err(CoreError::IntegrityViolation { position: 3, .. })
        ));
    }
}
