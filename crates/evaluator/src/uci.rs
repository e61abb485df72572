//! Parsing of the engine's side of the UCI conversation.

use chess_core::CandidateMove;

/// Pawn value reported for a forced mate, either sign.
pub const MATE_SCORE: f64 = 100.0;

/// A score as the engine reports it, from the side to move's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Centipawns(i32),
    /// Mate in N moves (positive = side to move mates, 0 = already mated)
    Mate(i32),
}

impl Score {
    /// Pawn units, still from the side to move's point of view.
    pub fn pawns(self) -> f64 {
        match self {
            Score::Centipawns(cp) => f64::from(cp) / 100.0,
            Score::Mate(n) if n > 0 => MATE_SCORE,
            Score::Mate(_) => -MATE_SCORE,
        }
    }

    /// Pawn units from white's point of view.
    pub fn white_pawns(self, black_to_move: bool) -> f64 {
        let pawns = self.pawns();
        if black_to_move {
            -pawns
        } else {
            pawns
        }
    }
}

/// Score from an `info depth ...` line, if it carries one.
pub fn parse_info_score(line: &str) -> Option<Score> {
    if !line.starts_with("info depth") {
        return None;
    }
    if let Some(cp) = parse_after(line, "cp") {
        return Some(Score::Centipawns(cp));
    }
    parse_after(line, "mate").map(Score::Mate)
}

/// Best move from a `bestmove` line.
///
/// The outer `None` means the line is not a `bestmove` line; the inner `None`
/// means the engine had no move to give (`bestmove (none)`, mate or stalemate).
pub fn parse_bestmove(line: &str) -> Option<Option<CandidateMove>> {
    let mut parts = line.split_whitespace();
    if parts.next() != Some("bestmove") {
        return None;
    }
    Some(parts.next().and_then(|mv| mv.parse().ok()))
}

/// Whether the position's side to move is black, from the FEN's second field.
pub fn black_to_move(fen: &str) -> bool {
    fen.split_whitespace().nth(1) == Some("b")
}

/// Integer token following `key` in an info line
fn parse_after(line: &str, key: &str) -> Option<i32> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == key && i + 1 < parts.len() {
            return parts[i + 1].parse().ok();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use shakmaty::{Role, Square};

    #[test]
    fn test_parse_cp() {
        let line = "info depth 8 seldepth 10 multipv 1 score cp 35 nodes 10000 pv e2e4";
        assert_eq!(parse_info_score(line), Some(Score::Centipawns(35)));
        assert_eq!(Score::Centipawns(35).pawns(), 0.35);
    }

    #[test]
    fn test_parse_mate() {
        let line = "info depth 8 score mate -3 nodes 100 pv e2e4";
        assert_eq!(parse_info_score(line), Some(Score::Mate(-3)));
        assert_eq!(Score::Mate(-3).pawns(), -MATE_SCORE);
        assert_eq!(Score::Mate(2).pawns(), MATE_SCORE);
        assert_eq!(Score::Mate(0).pawns(), -MATE_SCORE);
    }

    #[test]
    fn test_non_score_lines() {
        assert_eq!(parse_info_score("info string NNUE enabled"), None);
        assert_eq!(parse_info_score("info depth 1 currmove e2e4"), None);
        assert_eq!(parse_info_score("bestmove e2e4"), None);
    }

    #[test]
    fn test_white_point_of_view() {
        assert_eq!(Score::Centipawns(-50).white_pawns(true), 0.5);
        assert_eq!(Score::Centipawns(-50).white_pawns(false), -0.5);
        assert_eq!(Score::Mate(1).white_pawns(true), -MATE_SCORE);
    }

    #[test]
    fn test_parse_bestmove() {
        let mv = parse_bestmove("bestmove e7e8q ponder a1a2").unwrap().unwrap();
        assert_eq!(mv.from, Square::E7);
        assert_eq!(mv.promotion, Some(Role::Queen));

        assert_eq!(parse_bestmove("bestmove (none)"), Some(None));
        assert_eq!(parse_bestmove("info depth 3"), None);
    }

    #[test]
    fn test_black_to_move() {
        assert!(black_to_move(
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"
        ));
        assert!(!black_to_move(chess_core::STANDARD_START_FEN));
    }
}
