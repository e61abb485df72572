use chess_core::types::MoveParseError;
use chess_core::RulesError;
use evaluator::EvalError;

use crate::model::{GameId, ParticipantId};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Configuration error: {0}")]
    Config(&'static str),

    #[error("Game not found: {0}")]
    GameNotFound(GameId),

    #[error("{0} is not a participant of game {1}")]
    NotAParticipant(ParticipantId, GameId),

    #[error("Game {0} is not open to join")]
    NotJoinable(GameId),

    #[error("Stored data is inconsistent: {0}")]
    Corrupt(String),

    #[error("Subscription error: {0}")]
    Subscription(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Rules(#[from] RulesError),

    #[error(transparent)]
    Move(#[from] MoveParseError),

    #[error(transparent)]
    Evaluator(#[from] EvalError),
}
