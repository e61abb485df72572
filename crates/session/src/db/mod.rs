pub mod games;
pub mod moves;
pub mod pool;

use async_trait::async_trait;
use sqlx::PgPool;

use chess_core::GameResult;

use crate::error::SessionError;
use crate::gateway::PersistenceGateway;
use crate::model::{GameId, GameRow, MoveRow, NewMove, ParticipantId};

/// Postgres-backed session store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PersistenceGateway for PgStore {
    async fn create_game(
        &self,
        player1: ParticipantId,
        time_control: &str,
    ) -> Result<GameRow, SessionError> {
        games::create_game(&self.pool, player1, time_control).await
    }

    async fn join_game(
        &self,
        game_id: GameId,
        player2: ParticipantId,
    ) -> Result<GameRow, SessionError> {
        games::join_game(&self.pool, game_id, player2).await
    }

    async fn fetch_game(&self, game_id: GameId) -> Result<GameRow, SessionError> {
        games::fetch_game(&self.pool, game_id).await
    }

    async fn fetch_moves(&self, game_id: GameId) -> Result<Vec<MoveRow>, SessionError> {
        moves::fetch_moves(&self.pool, game_id).await
    }

    async fn append_move(&self, mv: &NewMove) -> Result<MoveRow, SessionError> {
        moves::append_move(&self.pool, mv).await
    }

    async fn finish_game(
        &self,
        game_id: GameId,
        winner: Option<ParticipantId>,
        result: GameResult,
    ) -> Result<bool, SessionError> {
        games::finish_game(&self.pool, game_id, winner, result).await
    }
}
