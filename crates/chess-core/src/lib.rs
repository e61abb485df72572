pub mod classify;
pub mod click;
pub mod game_data;
pub mod history;
pub mod pgn;
pub mod rules;
pub mod types;

pub use classify::{classify, MoveQuality, QualityCounts};
pub use rules::{RulesAdapter, RulesError, STANDARD_START_FEN};
pub use types::{
    CandidateMove, EvaluationSample, GameResult, MoveRecord, SessionStatus, TerminalOutcome,
};
