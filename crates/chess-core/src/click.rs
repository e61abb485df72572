//! Click-to-move input: a square-by-square selection state machine.
//!
//! `Idle → PendingFrom → PendingTo → Idle`, where `PendingTo` means a legal
//! promoting move has been picked and the piece choice is still outstanding.

use shakmaty::{Role, Square};

use crate::rules::RulesAdapter;
use crate::types::CandidateMove;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ClickState {
    #[default]
    Idle,
    PendingFrom {
        from: Square,
        targets: Vec<Square>,
    },
    PendingTo {
        from: Square,
        to: Square,
    },
}

/// What the caller should do after a click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// A piece was picked up; these are its legal destinations.
    Selected { from: Square, targets: Vec<Square> },
    /// Selection dropped (empty square or no legal moves).
    Cleared,
    /// A complete move is ready to be applied.
    Move(CandidateMove),
    /// Waiting for a promotion piece via [`ClickToMove::promote`].
    NeedsPromotion { from: Square, to: Square },
}

#[derive(Debug, Clone, Default)]
pub struct ClickToMove {
    state: ClickState,
}

impl ClickToMove {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ClickState {
        &self.state
    }

    pub fn click(&mut self, square: Square, rules: &RulesAdapter) -> ClickOutcome {
        match std::mem::take(&mut self.state) {
            ClickState::Idle => self.select(square, rules),
            ClickState::PendingFrom { from, targets } => {
                if !targets.contains(&square) {
                    // Clicking another piece re-selects, anything else clears
                    return self.select(square, rules);
                }
                if rules.is_promotion(from, square) {
                    self.state = ClickState::PendingTo { from, to: square };
                    return ClickOutcome::NeedsPromotion { from, to: square };
                }
                ClickOutcome::Move(CandidateMove::new(from, square))
            }
            ClickState::PendingTo { from, to } => {
                // A promotion choice is outstanding; only promote() or cancel() resolve it
                self.state = ClickState::PendingTo { from, to };
                ClickOutcome::NeedsPromotion { from, to }
            }
        }
    }

    /// Resolve a pending promotion. Returns `None` when no promotion is pending.
    pub fn promote(&mut self, role: Role) -> Option<CandidateMove> {
        match std::mem::take(&mut self.state) {
            ClickState::PendingTo { from, to } => {
                Some(CandidateMove::new(from, to).with_promotion(role))
            }
            other => {
                self.state = other;
                None
            }
        }
    }

    pub fn cancel(&mut self) {
        self.state = ClickState::Idle;
    }

    fn select(&mut self, square: Square, rules: &RulesAdapter) -> ClickOutcome {
        let targets = rules.legal_targets(square);
        if targets.is_empty() {
            self.state = ClickState::Idle;
            return ClickOutcome::Cleared;
        }
        self.state = ClickState::PendingFrom {
            from: square,
            targets: targets.clone(),
        };
        ClickOutcome::Selected {
            from: square,
            targets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_then_move() {
        let rules = RulesAdapter::new();
        let mut click = ClickToMove::new();

        match click.click(Square::E2, &rules) {
            ClickOutcome::Selected { from, targets } => {
                assert_eq!(from, Square::E2);
                assert_eq!(targets, vec![Square::E3, Square::E4]);
            }
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(
            click.click(Square::E4, &rules),
            ClickOutcome::Move(CandidateMove::new(Square::E2, Square::E4))
        );
        assert_eq!(click.state(), &ClickState::Idle);
    }

    #[test]
    fn test_empty_square_clears() {
        let rules = RulesAdapter::new();
        let mut click = ClickToMove::new();
        assert_eq!(click.click(Square::E4, &rules), ClickOutcome::Cleared);
        assert_eq!(click.state(), &ClickState::Idle);
    }

    #[test]
    fn test_reselect_other_piece() {
        let rules = RulesAdapter::new();
        let mut click = ClickToMove::new();
        click.click(Square::E2, &rules);

        match click.click(Square::G1, &rules) {
            ClickOutcome::Selected { from, .. } => assert_eq!(from, Square::G1),
            other => panic!("unexpected {other:?}"),
        }
        // Illegal destination for the knight clears the selection
        assert_eq!(click.click(Square::G4, &rules), ClickOutcome::Cleared);
    }

    #[test]
    fn test_promotion_waits_for_choice() {
        let rules = RulesAdapter::from_fen("8/P6k/8/8/8/8/8/K7 w - - 0 1").unwrap();
        let mut click = ClickToMove::new();
        click.click(Square::A7, &rules);

        assert_eq!(
            click.click(Square::A8, &rules),
            ClickOutcome::NeedsPromotion {
                from: Square::A7,
                to: Square::A8
            }
        );
        // Further clicks do not escape the pending choice
        assert!(matches!(
            click.click(Square::H7, &rules),
            ClickOutcome::NeedsPromotion { .. }
        ));

        let mv = click.promote(Role::Rook).unwrap();
        assert_eq!(mv.to_uci(), "a7a8r");
        assert_eq!(click.state(), &ClickState::Idle);
        assert!(click.promote(Role::Queen).is_none());
    }

    #[test]
    fn test_cancel() {
        let rules = RulesAdapter::new();
        let mut click = ClickToMove::new();
        click.click(Square::E2, &rules);
        click.cancel();
        assert_eq!(click.state(), &ClickState::Idle);
    }
}
