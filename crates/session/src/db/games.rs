use sqlx::PgPool;

use chess_core::{GameResult, SessionStatus};

use crate::error::SessionError;
use crate::model::{GameId, GameRow, ParticipantId};

const GAME_COLUMNS: &str =
    "id, player1_id, player2_id, status, time_control, winner, result, created_at";

pub async fn create_game(
    pool: &PgPool,
    player1: ParticipantId,
    time_control: &str,
) -> Result<GameRow, SessionError> {
    let row = sqlx::query_as::<_, GameRow>(&format!(
        "INSERT INTO games (player1_id, time_control) VALUES ($1, $2) RETURNING {GAME_COLUMNS}"
    ))
    .bind(player1)
    .bind(time_control)
    .fetch_one(pool)
    .await
    .map_err(SessionError::Sqlx)?;

    Ok(row)
}

/// Claim the black seat. Only a waiting game with a free seat can be joined,
/// and not by its own creator.
pub async fn join_game(
    pool: &PgPool,
    game_id: GameId,
    player2: ParticipantId,
) -> Result<GameRow, SessionError> {
    let joined = sqlx::query_as::<_, GameRow>(&format!(
        r#"UPDATE games
           SET player2_id = $2, status = $3
           WHERE id = $1 AND status = $4 AND player2_id IS NULL AND player1_id <> $2
           RETURNING {GAME_COLUMNS}"#
    ))
    .bind(game_id)
    .bind(player2)
    .bind(SessionStatus::InProgress.as_str())
    .bind(SessionStatus::Waiting.as_str())
    .fetch_optional(pool)
    .await
    .map_err(SessionError::Sqlx)?;

    match joined {
        Some(row) => Ok(row),
        None => {
            // Distinguish a missing game from one that cannot be joined
            fetch_game(pool, game_id).await?;
            Err(SessionError::NotJoinable(game_id))
        }
    }
}

pub async fn fetch_game(pool: &PgPool, game_id: GameId) -> Result<GameRow, SessionError> {
    sqlx::query_as::<_, GameRow>(&format!("SELECT {GAME_COLUMNS} FROM games WHERE id = $1"))
        .bind(game_id)
        .fetch_optional(pool)
        .await
        .map_err(SessionError::Sqlx)?
        .ok_or(SessionError::GameNotFound(game_id))
}

/// Returns whether this call was the one that finished the game.
pub async fn finish_game(
    pool: &PgPool,
    game_id: GameId,
    winner: Option<ParticipantId>,
    result: GameResult,
) -> Result<bool, SessionError> {
    let done = sqlx::query(
        "UPDATE games SET status = $2, winner = $3, result = $4 WHERE id = $1 AND status <> $2",
    )
    .bind(game_id)
    .bind(SessionStatus::Finished.as_str())
    .bind(winner)
    .bind(result.as_str())
    .execute(pool)
    .await
    .map_err(SessionError::Sqlx)?;

    Ok(done.rows_affected() > 0)
}
