//! Replay of recorded settlement rounds against the log.
//!
//! Aggregates are reproducible from the log alone: re-folding each recorded
//! round with the cap it used must land on the same checkpoint, counter and
//! total. Any divergence means the stored state or history was tampered
//! with or computed by a different rule.

use crate::error::{CoreError, Result};
use crate::fold::{fold_pending, AdmissionRule};
use crate::log::ActionLog;
use crate::state::{SettlementRound, SettlementState};

/// Re-fold every round in order, starting from genesis.
///
/// Returns the recomputed state after the last round.
pub fn replay_rounds(log: &ActionLog, rounds: &[SettlementRound]) -> Result<SettlementState> {
    let mut state = SettlementState::genesis();

    for recorded in rounds {
        let mismatch = |reason: String| CoreError::ReplayMismatch {
            round: recorded.round,
            reason,
        };

        if recorded.round != state.version + 1 {
            return Err(mismatch(format!("expected round {}", state.version + 1)));
        }
        if recorded.from_checkpoint != state.checkpoint {
            return Err(mismatch(format!(
                "starts at {}, previous round ended at {}",
                recorded.from_checkpoint, state.checkpoint
            )));
        }

        let from = log
            .position_of(&recorded.from_checkpoint)
            .ok_or(CoreError::UnknownCheckpoint(recorded.from_checkpoint))?;
        let to = log
            .position_of(&recorded.to_checkpoint)
            .ok_or(CoreError::UnknownCheckpoint(recorded.to_checkpoint))?;
        if to < from {
            return Err(mismatch("checkpoint moved backwards".into()));
        }

        let outcome = fold_pending(
            &state,
            log.range(from, to),
            &AdmissionRule::new(recorded.cap),
            recorded.payer,
        )?;

        if outcome.round != *recorded {
            return Err(mismatch(format!(
                "recomputed counter {} total {} admitted {}/{}, recorded counter {} total {} admitted {}/{}",
                outcome.round.counter_after,
                outcome.round.total_after,
                outcome.round.admitted,
                outcome.round.folded,
                recorded.counter_after,
                recorded.total_after,
                recorded.admitted,
                recorded.folded,
            )));
        }

        state = outcome.next;
    }

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PartyId;
    use crate::request::PayoutRequest;
    use crate::types::Amount;

    const PAYER: PartyId = PartyId::from_bytes([0xaa; 32]);

    fn settle(log: &ActionLog, state: &SettlementState, cap: Amount) -> SettlementRound {
        let pending = log.entries_since(&state.checkpoint).unwrap();
        fold_pending(state, pending, &AdmissionRule::new(cap), PAYER)
            .unwrap()
            .round
    }

    fn history() -> (ActionLog, Vec<SettlementRound>, SettlementState) {
        let mut log = ActionLog::new();
        let mut rounds = Vec::new();
        let mut state = SettlementState::genesis();

        log.append(PayoutRequest::new(PartyId::from_bytes([1; 32]), Amount::units(1)));
        log.append(PayoutRequest::new(PartyId::from_bytes([2; 32]), Amount::units(4)));
        let r1 = settle(&log, &state, Amount::units(2));
        state = SettlementState {
            counter: r1.counter_after,
            total: r1.total_after,
            checkpoint: r1.to_checkpoint,
            version: r1.round,
        };
        rounds.push(r1);

        log.append(PayoutRequest::new(PartyId::from_bytes([3; 32]), Amount::units(3)));
        let r2 = settle(&log, &state, Amount::units(5));
        state = SettlementState {
            counter: r2.counter_after,
            total: r2.total_after,
            checkpoint: r2.to_checkpoint,
            version: r2.round,
        };
        rounds.push(r2);

        (log, rounds, state)
    }

    #[test]
    fn test_replay_reproduces_state() {
        let (log, rounds, state) = history();
        let replayed = replay_rounds(&log, &rounds).unwrap();
        assert_eq!(replayed, state);
        assert_eq!(replayed.counter, 2);
        assert_eq!(replayed.total, Amount::units(4));
    }

    #[test]
    fn test_replay_empty_history() {
        let (log, _, _) = history();
        assert_eq!(replay_rounds(&log, &[]).unwrap(), SettlementState::genesis());
    }

    #[test]
    fn test_replay_detects_forged_total() {
        let (log, mut rounds, _) = history();
        rounds[1].total_after = Amount::units(99);
        assert!(matches!(
            replay_rounds(&log, &rounds),
            Err(CoreError::ReplayMismatch { round: 2, .. })
        ));
    }

    #[test]
    fn test_replay_detects_changed_cap() {
        let (log, mut rounds, _) = history();
        // A larger cap would have admitted the 4-unit entry
        rounds[0].cap = Amount::units(10);
        assert!(matches!(
            replay_rounds(&log, &rounds),
            Err(CoreError::ReplayMismatch { round: 1, .. })
        ));
    }

    #[test]
    fn test_replay_detects_missing_round() {
        let (log, rounds, _) = history();
        assert!(matches!(
            replay_rounds(&log, &rounds[1..]),
            Err(CoreError::ReplayMismatch { round: 2, .. })
        ));
    }
}
