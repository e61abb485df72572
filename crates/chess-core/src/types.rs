//! Shared value types: candidate moves, recorded moves, session status,
//! game results and evaluation samples.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use shakmaty::{Color, Role, Square};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveParseError {
    #[error("Invalid square: {0}")]
    Square(String),

    #[error("Invalid promotion piece: {0}")]
    Promotion(String),

    #[error("Malformed move: {0}")]
    Malformed(String),
}

/// A move as entered by a player or received from the relay, before it has
/// been checked against the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CandidateMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Role>,
}

impl CandidateMove {
    pub fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }

    pub fn with_promotion(mut self, role: Role) -> Self {
        self.promotion = Some(role);
        self
    }

    /// Build a candidate from the three loose columns of a stored move row.
    ///
    /// `piece` holds either the promotion piece or the moved piece code; any
    /// role other than a valid promotion target is dropped here, and the rules
    /// adapter ignores a promotion on a move that does not promote.
    pub fn from_parts(from: &str, to: &str, piece: Option<&str>) -> Result<Self, MoveParseError> {
        let from: Square = from
            .trim()
            .parse()
            .map_err(|_| MoveParseError::Square(from.to_string()))?;
        let to: Square = to
            .trim()
            .parse()
            .map_err(|_| MoveParseError::Square(to.to_string()))?;

        let promotion = piece
            .and_then(|p| p.trim().chars().last())
            .and_then(|c| Role::from_char(c.to_ascii_lowercase()))
            .filter(|role| is_promotion_role(*role));

        Ok(Self {
            from,
            to,
            promotion,
        })
    }

    /// UCI long algebraic form, e.g. `e2e4` or `e7e8q`.
    pub fn to_uci(&self) -> String {
        match self.promotion {
            Some(role) => format!("{}{}{}", self.from, self.to, role.char()),
            None => format!("{}{}", self.from, self.to),
        }
    }
}

impl FromStr for CandidateMove {
    type Err = MoveParseError;

    /// Parse a UCI move. Only the first four or five characters are
    /// significant, which is how engines report `bestmove`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() < 4 || !s.is_ascii() {
            return Err(MoveParseError::Malformed(s.to_string()));
        }

        let from = s[0..2]
            .parse()
            .map_err(|_| MoveParseError::Square(s[0..2].to_string()))?;
        let to = s[2..4]
            .parse()
            .map_err(|_| MoveParseError::Square(s[2..4].to_string()))?;

        let promotion = match s[4..].chars().next() {
            None => None,
            Some(c) => {
                let role = Role::from_char(c.to_ascii_lowercase())
                    .filter(|role| is_promotion_role(*role))
                    .ok_or_else(|| MoveParseError::Promotion(c.to_string()))?;
                Some(role)
            }
        };

        Ok(Self {
            from,
            to,
            promotion,
        })
    }
}

impl fmt::Display for CandidateMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uci())
    }
}

/// Lowercase name of a side, as shown to players.
pub fn side_name(color: Color) -> &'static str {
    match color {
        Color::White => "white",
        Color::Black => "black",
    }
}

fn is_promotion_role(role: Role) -> bool {
    matches!(role, Role::Queen | Role::Rook | Role::Bishop | Role::Knight)
}

/// A move that has been applied to the board. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    /// 1-based ply number within the game.
    pub number: u32,
    /// Full-move number of the position the move was played from.
    pub fullmove: u32,
    pub side: Color,
    pub role: Role,
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Role>,
    pub captured: Option<Role>,
    pub is_castle: bool,
    pub gives_check: bool,
    pub san: String,
    pub uci: String,
    pub fen_after: String,
}

impl MoveRecord {
    pub fn candidate(&self) -> CandidateMove {
        CandidateMove {
            from: self.from,
            to: self.to,
            promotion: self.promotion,
        }
    }

    /// Piece code stored alongside the move: the promotion piece when there
    /// is one, otherwise the moved piece.
    pub fn piece_code(&self) -> char {
        self.promotion.unwrap_or(self.role).char()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Waiting,
    InProgress,
    Finished,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Waiting => "waiting",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Finished => "finished",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(SessionStatus::Waiting),
            "in_progress" => Ok(SessionStatus::InProgress),
            "finished" => Ok(SessionStatus::Finished),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final result of a game, encoded the way it is stored ("1-0", "0-1",
/// "1/2-1/2").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameResult {
    WhiteWin,
    BlackWin,
    Draw,
    Undetermined,
}

impl GameResult {
    pub fn win_for(color: Color) -> Self {
        match color {
            Color::White => GameResult::WhiteWin,
            Color::Black => GameResult::BlackWin,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GameResult::WhiteWin => "1-0",
            GameResult::BlackWin => "0-1",
            GameResult::Draw => "1/2-1/2",
            GameResult::Undetermined => "*",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "1-0" => GameResult::WhiteWin,
            "0-1" => GameResult::BlackWin,
            "1/2-1/2" => GameResult::Draw,
            _ => GameResult::Undetermined,
        }
    }

    pub fn winner(&self) -> Option<Color> {
        match self {
            GameResult::WhiteWin => Some(Color::White),
            GameResult::BlackWin => Some(Color::Black),
            _ => None,
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawReason {
    InsufficientMaterial,
    FiftyMoveRule,
    ThreefoldRepetition,
}

/// Terminal classification of the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalOutcome {
    Ongoing,
    /// The winner is always the side that is not to move.
    Checkmate { winner: Color },
    Stalemate,
    Draw(DrawReason),
}

impl TerminalOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TerminalOutcome::Ongoing)
    }

    pub fn winner(&self) -> Option<Color> {
        match self {
            TerminalOutcome::Checkmate { winner } => Some(*winner),
            _ => None,
        }
    }

    pub fn result(&self) -> GameResult {
        match self {
            TerminalOutcome::Ongoing => GameResult::Undetermined,
            TerminalOutcome::Checkmate { winner } => GameResult::win_for(*winner),
            TerminalOutcome::Stalemate | TerminalOutcome::Draw(_) => GameResult::Draw,
        }
    }
}

impl fmt::Display for TerminalOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalOutcome::Ongoing => f.write_str("ongoing"),
            TerminalOutcome::Checkmate { winner } => {
                write!(f, "checkmate, {} wins", side_name(*winner))
            }
            TerminalOutcome::Stalemate => f.write_str("stalemate"),
            TerminalOutcome::Draw(DrawReason::InsufficientMaterial) => {
                f.write_str("draw by insufficient material")
            }
            TerminalOutcome::Draw(DrawReason::FiftyMoveRule) => f.write_str("draw by fifty-move rule"),
            TerminalOutcome::Draw(DrawReason::ThreefoldRepetition) => {
                f.write_str("draw by threefold repetition")
            }
        }
    }
}

/// One engine evaluation of a position.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationSample {
    /// FEN of the evaluated position.
    pub fen: String,
    pub depth: u32,
    /// Pawn units from white's point of view.
    pub score: f64,
    /// `None` when the engine reports `bestmove (none)`.
    pub best_move: Option<CandidateMove>,
}
