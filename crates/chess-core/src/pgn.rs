//! PGN export.

use crate::game_data::GameData;
use crate::rules::STANDARD_START_FEN;

fn tag(name: &str, value: &str) -> String {
    format!("[{name} \"{value}\"]\n")
}

/// Render a game as PGN with the seven-tag roster plus optional extras.
pub fn to_pgn(game: &GameData) -> String {
    let meta = &game.metadata;
    let mut out = String::new();

    out.push_str(&tag("Event", meta.event.as_deref().unwrap_or("Casual game")));
    out.push_str(&tag("Site", "?"));
    out.push_str(&tag("Date", meta.date.as_deref().unwrap_or("????.??.??")));
    out.push_str(&tag("Round", "-"));
    out.push_str(&tag("White", &meta.white));
    out.push_str(&tag("Black", &meta.black));
    out.push_str(&tag("Result", &meta.result));
    if let Some(tc) = &meta.time_control {
        out.push_str(&tag("TimeControl", tc));
    }

    // Move numbering follows the starting position when it is not standard
    let (mut number, mut white_to_move) = match &meta.fen {
        Some(fen) if fen != STANDARD_START_FEN => {
            out.push_str(&tag("SetUp", "1"));
            out.push_str(&tag("FEN", fen));
            start_counters(fen)
        }
        _ => (1, true),
    };
    out.push('\n');

    let mut tokens: Vec<String> = Vec::with_capacity(game.moves.len() * 3 / 2 + 1);
    for (i, san) in game.moves.iter().enumerate() {
        if white_to_move {
            tokens.push(format!("{number}."));
        } else if i == 0 {
            tokens.push(format!("{number}..."));
        }
        tokens.push(san.clone());
        if !white_to_move {
            number += 1;
        }
        white_to_move = !white_to_move;
    }
    tokens.push(meta.result.clone());

    out.push_str(&tokens.join(" "));
    out.push('\n');
    out
}

fn start_counters(fen: &str) -> (u32, bool) {
    let fields: Vec<&str> = fen.split_whitespace().collect();
    let white_to_move = fields.get(1).map_or(true, |s| *s == "w");
    let number = fields.get(5).and_then(|s| s.parse().ok()).unwrap_or(1);
    (number, white_to_move)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_data::GameMetadata;

    fn game(moves: &[&str], result: &str, fen: Option<&str>) -> GameData {
        GameData {
            metadata: GameMetadata {
                white: "alice".into(),
                black: "bob".into(),
                result: result.into(),
                date: Some("2025.01.15".into()),
                time_control: Some("blitz".into()),
                event: None,
                fen: fen.map(String::from),
            },
            moves: moves.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_to_pgn_numbering() {
        let pgn = to_pgn(&game(&["f3", "e5", "g4", "Qh4#"], "0-1", None));
        assert!(pgn.contains("[White \"alice\"]"));
        assert!(pgn.contains("[Result \"0-1\"]"));
        assert!(pgn.contains("[TimeControl \"blitz\"]"));
        assert!(!pgn.contains("[FEN"));
        assert!(pgn.trim_end().ends_with("1. f3 e5 2. g4 Qh4# 0-1"));
    }

    #[test]
    fn test_to_pgn_black_to_move_start() {
        let fen = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";
        let pgn = to_pgn(&game(&["e5", "Nf3"], "*", Some(fen)));
        assert!(pgn.contains("[SetUp \"1\"]"));
        assert!(pgn.trim_end().ends_with("1... e5 2. Nf3 *"));
    }

    #[test]
    fn test_to_pgn_defaults_and_draw() {
        let mut data = game(&["e4"], "1/2-1/2", None);
        data.metadata.date = None;
        data.metadata.time_control = None;
        let pgn = to_pgn(&data);
        assert!(pgn.starts_with("[Event \"Casual game\"]\n[Site \"?\"]\n[Date \"????.??.??\"]"));
        assert!(!pgn.contains("[TimeControl"));
        assert!(pgn.ends_with("\n\n1. e4 1/2-1/2\n"));
    }
}
