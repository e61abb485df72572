//! Legality adapter over shakmaty.
//!
//! Owns the current position, the move log it was reached by, and the
//! repetition counts needed for draw detection. Every other view of the game
//! (history rows, capture lists, PGN) is derived from [`RulesAdapter::history`].

use std::collections::HashMap;

use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Move, Position, Role, Square};
use thiserror::Error;

use crate::types::{CandidateMove, DrawReason, MoveRecord, TerminalOutcome};

pub const STANDARD_START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Half-move clock value at which the fifty-move rule ends the game.
const FIFTY_MOVE_PLIES: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RulesError {
    #[error("Invalid FEN: {0}")]
    InvalidFen(String),

    #[error("Illegal move: {0}")]
    IllegalMove(String),
}

#[derive(Debug, Clone)]
pub struct RulesAdapter {
    start: Chess,
    position: Chess,
    history: Vec<MoveRecord>,
    repetitions: HashMap<String, u32>,
}

impl Default for RulesAdapter {
    fn default() -> Self {
        Self::from_position(Chess::default())
    }
}

impl RulesAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fen(fen: &str) -> Result<Self, RulesError> {
        let parsed: Fen = fen
            .trim()
            .parse()
            .map_err(|e| RulesError::InvalidFen(format!("{fen}: {e}")))?;
        let position: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|e| RulesError::InvalidFen(format!("{fen}: {e}")))?;
        Ok(Self::from_position(position))
    }

    fn from_position(position: Chess) -> Self {
        let mut repetitions = HashMap::new();
        repetitions.insert(repetition_key(&position), 1);
        Self {
            start: position.clone(),
            position,
            history: Vec::new(),
            repetitions,
        }
    }

    /// Rebuild an adapter by replaying a move log from a starting FEN.
    pub fn replay(start_fen: &str, moves: &[CandidateMove]) -> Result<Self, RulesError> {
        let mut rules = Self::from_fen(start_fen)?;
        for mv in moves {
            rules.apply(mv)?;
        }
        Ok(rules)
    }

    pub fn position(&self) -> &Chess {
        &self.position
    }

    pub fn fen(&self) -> String {
        fen_of(&self.position)
    }

    pub fn start_fen(&self) -> String {
        fen_of(&self.start)
    }

    pub fn turn(&self) -> Color {
        self.position.turn()
    }

    pub fn halfmoves(&self) -> u32 {
        self.position.halfmoves()
    }

    pub fn fullmoves(&self) -> u32 {
        self.position.fullmoves().get()
    }

    pub fn history(&self) -> &[MoveRecord] {
        &self.history
    }

    pub fn last_move(&self) -> Option<&MoveRecord> {
        self.history.last()
    }

    /// Destination squares of every legal move starting on `from`.
    pub fn legal_targets(&self, from: Square) -> Vec<Square> {
        let mut targets: Vec<Square> = self
            .position
            .legal_moves()
            .iter()
            .filter(|m| m.from() == Some(from))
            .map(uci_target)
            .collect();
        targets.sort();
        targets.dedup();
        targets
    }

    /// Whether moving `from` → `to` is legal and needs a promotion choice.
    pub fn is_promotion(&self, from: Square, to: Square) -> bool {
        self.position
            .legal_moves()
            .iter()
            .any(|m| m.from() == Some(from) && uci_target(m) == to && m.promotion().is_some())
    }

    /// Validate and play a candidate move.
    ///
    /// A promotion on a move that does not promote is ignored, and a promoting
    /// move without a choice promotes to a queen. On rejection the adapter is
    /// left untouched.
    pub fn apply(&mut self, candidate: &CandidateMove) -> Result<MoveRecord, RulesError> {
        let m = self.resolve(candidate)?;

        let side = self.position.turn();
        let fullmove = self.fullmoves();
        let number = self.history.len() as u32 + 1;
        let uci = UciMove::from_move(m.clone(), CastlingMode::Standard).to_string();
        let from = m.from().unwrap_or(candidate.from);
        let to = uci_target(&m);

        let san = SanPlus::from_move_and_play_unchecked(&mut self.position, m.clone());

        let record = MoveRecord {
            number,
            fullmove,
            side,
            role: m.role(),
            from,
            to,
            promotion: m.promotion(),
            captured: m.capture(),
            is_castle: m.is_castle(),
            gives_check: self.position.is_check(),
            san: san.to_string(),
            uci,
            fen_after: self.fen(),
        };

        *self
            .repetitions
            .entry(repetition_key(&self.position))
            .or_insert(0) += 1;
        self.history.push(record.clone());

        Ok(record)
    }

    fn resolve(&self, candidate: &CandidateMove) -> Result<Move, RulesError> {
        let attempt = |promotion: Option<Role>| {
            UciMove::Normal {
                from: candidate.from,
                to: candidate.to,
                promotion,
            }
            .to_move(&self.position)
            .ok()
        };

        attempt(candidate.promotion)
            .or_else(|| match candidate.promotion {
                Some(_) => attempt(None),
                None => attempt(Some(Role::Queen)),
            })
            .ok_or_else(|| RulesError::IllegalMove(candidate.to_uci()))
    }

    /// Terminal classification of the current position.
    pub fn outcome(&self) -> TerminalOutcome {
        let pos = &self.position;
        if pos.is_checkmate() {
            TerminalOutcome::Checkmate {
                winner: !pos.turn(),
            }
        } else if pos.is_stalemate() {
            TerminalOutcome::Stalemate
        } else if pos.is_insufficient_material() {
            TerminalOutcome::Draw(DrawReason::InsufficientMaterial)
        } else if pos.halfmoves() >= FIFTY_MOVE_PLIES {
            TerminalOutcome::Draw(DrawReason::FiftyMoveRule)
        } else if self.repetition_count() >= 3 {
            TerminalOutcome::Draw(DrawReason::ThreefoldRepetition)
        } else {
            TerminalOutcome::Ongoing
        }
    }

    fn repetition_count(&self) -> u32 {
        self.repetitions
            .get(&repetition_key(&self.position))
            .copied()
            .unwrap_or(0)
    }
}

fn fen_of(pos: &Chess) -> String {
    Fen::from_position(pos, EnPassantMode::Legal).to_string()
}

/// Board, side to move, castling rights and en-passant square: the FEN
/// fields that identify a position for repetition purposes.
fn repetition_key(pos: &Chess) -> String {
    fen_of(pos)
        .split_whitespace()
        .take(4)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Destination square as written in standard UCI (king square for castling).
fn uci_target(m: &Move) -> Square {
    match m {
        Move::Castle { king, rook } => {
            let file = if rook.file() > king.file() {
                shakmaty::File::G
            } else {
                shakmaty::File::C
            };
            Square::from_coords(file, king.rank())
        }
        other => other.to(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(s: &str) -> CandidateMove {
        s.parse().unwrap()
    }

    fn play(rules: &mut RulesAdapter, moves: &[&str]) {
        for m in moves {
            rules.apply(&mv(m)).unwrap();
        }
    }

    #[test]
    fn test_first_move_from_start() {
        let mut rules = RulesAdapter::from_fen(STANDARD_START_FEN).unwrap();
        let record = rules.apply(&mv("e2e4")).unwrap();

        assert_eq!(record.number, 1);
        assert_eq!(record.fullmove, 1);
        assert_eq!(record.side, Color::White);
        assert_eq!(record.san, "e4");
        assert_eq!(rules.turn(), Color::Black);
        assert_eq!(rules.halfmoves(), 0);
        assert!(rules.fen().starts_with("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq"));
    }

    #[test]
    fn test_illegal_move_leaves_state_untouched() {
        let mut rules = RulesAdapter::new();
        let before = rules.fen();

        assert!(matches!(
            rules.apply(&mv("e2e5")),
            Err(RulesError::IllegalMove(_))
        ));
        // Black piece while white is to move
        assert!(rules.apply(&mv("e7e5")).is_err());

        assert_eq!(rules.fen(), before);
        assert!(rules.history().is_empty());
    }

    #[test]
    fn test_invalid_fen() {
        assert!(matches!(
            RulesAdapter::from_fen("not a fen"),
            Err(RulesError::InvalidFen(_))
        ));
    }

    #[test]
    fn test_checkmate_winner_is_side_not_to_move() {
        let mut rules = RulesAdapter::new();
        play(&mut rules, &["f2f3", "e7e5", "g2g4", "d8h4"]);

        assert_eq!(
            rules.outcome(),
            TerminalOutcome::Checkmate {
                winner: Color::Black
            }
        );
        assert_eq!(rules.last_move().unwrap().san, "Qh4#");
        // Repeated queries agree
        assert_eq!(rules.outcome(), rules.outcome());
    }

    #[test]
    fn test_stalemate() {
        let mut rules = RulesAdapter::from_fen("7k/8/6Q1/8/8/8/8/K7 w - - 0 1").unwrap();
        assert_eq!(rules.outcome(), TerminalOutcome::Ongoing);
        play(&mut rules, &["g6f7"]);
        assert_eq!(rules.outcome(), TerminalOutcome::Stalemate);
    }

    #[test]
    fn test_insufficient_material() {
        let mut rules = RulesAdapter::from_fen("8/8/8/4k3/8/8/3r4/3K4 w - - 0 1").unwrap();
        play(&mut rules, &["d1d2"]);
        assert_eq!(
            rules.outcome(),
            TerminalOutcome::Draw(DrawReason::InsufficientMaterial)
        );
    }

    #[test]
    fn test_fifty_move_rule() {
        let mut rules = RulesAdapter::from_fen("8/8/8/4k3/8/8/2R5/3K4 w - - 99 80").unwrap();
        play(&mut rules, &["c2c3"]);
        assert_eq!(rules.outcome(), TerminalOutcome::Draw(DrawReason::FiftyMoveRule));
    }

    #[test]
    fn test_threefold_repetition() {
        let mut rules = RulesAdapter::new();
        play(&mut rules, &["g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1"]);
        assert_eq!(rules.outcome(), TerminalOutcome::Ongoing);
        play(&mut rules, &["f6g8"]);
        assert_eq!(
            rules.outcome(),
            TerminalOutcome::Draw(DrawReason::ThreefoldRepetition)
        );
    }

    #[test]
    fn test_promotion_defaults_to_queen_and_extra_promotion_is_ignored() {
        let mut rules = RulesAdapter::from_fen("8/P6k/8/8/8/8/8/K7 w - - 0 1").unwrap();
        assert!(rules.is_promotion(Square::A7, Square::A8));
        let record = rules.apply(&mv("a7a8")).unwrap();
        assert_eq!(record.promotion, Some(Role::Queen));
        assert_eq!(record.piece_code(), 'q');

        let mut rules = RulesAdapter::new();
        let record = rules
            .apply(&CandidateMove::from_parts("g1", "f3", Some("q")).unwrap())
            .unwrap();
        assert_eq!(record.promotion, None);
        assert_eq!(record.role, Role::Knight);
    }

    #[test]
    fn test_underpromotion_is_kept() {
        let mut rules = RulesAdapter::from_fen("8/P6k/8/8/8/8/8/K7 w - - 0 1").unwrap();
        let record = rules.apply(&mv("a7a8n")).unwrap();
        assert_eq!(record.promotion, Some(Role::Knight));
        assert_eq!(record.san, "a8=N");
    }

    #[test]
    fn test_castling_uses_king_destination() {
        let mut rules =
            RulesAdapter::from_fen("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1").unwrap();
        assert!(rules.legal_targets(Square::E1).contains(&Square::G1));
        let record = rules.apply(&mv("e1g1")).unwrap();
        assert!(record.is_castle);
        assert_eq!(record.uci, "e1g1");
        assert_eq!(record.san, "O-O");
    }

    #[test]
    fn test_capture_and_replay() {
        let moves = ["e2e4", "d7d5", "e4d5", "d8d5", "b1c3"];
        let mut rules = RulesAdapter::new();
        play(&mut rules, &moves);
        assert_eq!(rules.history()[2].captured, Some(Role::Pawn));
        assert_eq!(rules.history()[3].captured, Some(Role::Pawn));

        let log: Vec<CandidateMove> = rules.history().iter().map(|r| r.candidate()).collect();
        let replayed = RulesAdapter::replay(&rules.start_fen(), &log).unwrap();
        assert_eq!(replayed.fen(), rules.fen());
        assert_eq!(replayed.history(), rules.history());
    }
}
