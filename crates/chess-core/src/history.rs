//! Display projections recomputed from the move log: paired history rows and
//! captured material per side.

use serde::Serialize;
use shakmaty::{Color, Role};

use crate::types::MoveRecord;

/// One numbered row of the move list: white's move and black's reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryRow {
    pub move_number: u32,
    /// Empty when the game started with black to move.
    pub white: String,
    /// Empty until black has replied.
    pub black: String,
    /// Position after the last move in this row.
    pub fen: String,
}

pub fn project(records: &[MoveRecord]) -> Vec<HistoryRow> {
    let mut rows: Vec<HistoryRow> = Vec::new();

    for record in records {
        let starts_row = match rows.last() {
            None => true,
            Some(row) => row.move_number != record.fullmove || record.side == Color::White,
        };

        if starts_row {
            rows.push(HistoryRow {
                move_number: record.fullmove,
                white: String::new(),
                black: String::new(),
                fen: String::new(),
            });
        }

        if let Some(row) = rows.last_mut() {
            match record.side {
                Color::White => row.white = record.san.clone(),
                Color::Black => row.black = record.san.clone(),
            }
            row.fen = record.fen_after.clone();
        }
    }

    rows
}

/// Pieces each side has taken, in capture order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureTally {
    pub by_white: Vec<Role>,
    pub by_black: Vec<Role>,
}

impl CaptureTally {
    pub fn from_records(records: &[MoveRecord]) -> Self {
        let mut tally = CaptureTally::default();
        for record in records {
            if let Some(role) = record.captured {
                match record.side {
                    Color::White => tally.by_white.push(role),
                    Color::Black => tally.by_black.push(role),
                }
            }
        }
        tally
    }

    pub fn taken_by(&self, side: Color) -> &[Role] {
        match side {
            Color::White => &self.by_white,
            Color::Black => &self.by_black,
        }
    }

    /// Material balance in pawns from white's side, using 1/3/3/5/9.
    pub fn material_balance(&self) -> i32 {
        let sum = |roles: &[Role]| roles.iter().map(|r| piece_value(*r)).sum::<i32>();
        sum(&self.by_white) - sum(&self.by_black)
    }
}

fn piece_value(role: Role) -> i32 {
    match role {
        Role::Pawn => 1,
        Role::Knight | Role::Bishop => 3,
        Role::Rook => 5,
        Role::Queen => 9,
        Role::King => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RulesAdapter;

    fn play(fen: Option<&str>, moves: &[&str]) -> RulesAdapter {
        let mut rules = match fen {
            Some(f) => RulesAdapter::from_fen(f).unwrap(),
            None => RulesAdapter::new(),
        };
        for m in moves {
            rules.apply(&m.parse().unwrap()).unwrap();
        }
        rules
    }

    #[test]
    fn test_rows_pair_white_and_black() {
        let rules = play(None, &["e2e4", "e7e5", "g1f3"]);
        let rows = project(rules.history());

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].move_number, 1);
        assert_eq!(rows[0].white, "e4");
        assert_eq!(rows[0].black, "e5");
        assert_eq!(rows[1].move_number, 2);
        assert_eq!(rows[1].white, "Nf3");
        assert_eq!(rows[1].black, "");
        assert_eq!(rows[1].fen, rules.fen());
    }

    #[test]
    fn test_black_first_row() {
        let rules = play(
            Some("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"),
            &["e7e5", "g1f3"],
        );
        let rows = project(rules.history());

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].white, "");
        assert_eq!(rows[0].black, "e5");
        assert_eq!(rows[1].move_number, 2);
        assert_eq!(rows[1].white, "Nf3");
    }

    #[test]
    fn test_capture_tally() {
        let rules = play(None, &["e2e4", "d7d5", "e4d5", "d8d5", "b1c3", "d5a2"]);
        let tally = CaptureTally::from_records(rules.history());

        assert_eq!(tally.taken_by(Color::White), &[Role::Pawn]);
        assert_eq!(tally.taken_by(Color::Black), &[Role::Pawn, Role::Pawn]);
        assert_eq!(tally.material_balance(), -1);
    }

    #[test]
    fn test_empty_log() {
        assert!(project(&[]).is_empty());
        assert_eq!(CaptureTally::from_records(&[]), CaptureTally::default());
    }
}
