//! The boundary to durable storage. The core only calls it.

use async_trait::async_trait;

use chess_core::GameResult;

use crate::error::SessionError;
use crate::model::{GameId, GameRow, MoveRow, NewMove, ParticipantId};

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Open a new game with `player1` as white, status `waiting`.
    async fn create_game(
        &self,
        player1: ParticipantId,
        time_control: &str,
    ) -> Result<GameRow, SessionError>;

    /// Take the black seat and move the game to `in_progress` in one write.
    async fn join_game(&self, game_id: GameId, player2: ParticipantId)
        -> Result<GameRow, SessionError>;

    async fn fetch_game(&self, game_id: GameId) -> Result<GameRow, SessionError>;

    /// All moves of a game ordered by move number.
    async fn fetch_moves(&self, game_id: GameId) -> Result<Vec<MoveRow>, SessionError>;

    /// Append a move; the store assigns the next move number.
    async fn append_move(&self, mv: &NewMove) -> Result<MoveRow, SessionError>;

    /// Mark the game finished. Returns `false` when it already was.
    async fn finish_game(
        &self,
        game_id: GameId,
        winner: Option<ParticipantId>,
        result: GameResult,
    ) -> Result<bool, SessionError>;
}
