use sqlx::PgPool;

use crate::error::SessionError;
use crate::model::{GameId, MoveRow, NewMove};

const MOVE_COLUMNS: &str =
    "id, game_id, player_id, move_number, from_square, to_square, piece, created_at";

pub async fn fetch_moves(pool: &PgPool, game_id: GameId) -> Result<Vec<MoveRow>, SessionError> {
    let rows = sqlx::query_as::<_, MoveRow>(&format!(
        "SELECT {MOVE_COLUMNS} FROM moves WHERE game_id = $1 ORDER BY move_number"
    ))
    .bind(game_id)
    .fetch_all(pool)
    .await
    .map_err(SessionError::Sqlx)?;

    Ok(rows)
}

/// Insert a move numbered one past the game's current last move.
pub async fn append_move(pool: &PgPool, mv: &NewMove) -> Result<MoveRow, SessionError> {
    let row = sqlx::query_as::<_, MoveRow>(&format!(
        r#"INSERT INTO moves (game_id, player_id, move_number, from_square, to_square, piece)
           SELECT $1, $2, COALESCE(MAX(move_number), 0) + 1, $3, $4, $5
           FROM moves WHERE game_id = $1
           RETURNING {MOVE_COLUMNS}"#
    ))
    .bind(mv.game_id)
    .bind(mv.player_id)
    .bind(&mv.from_square)
    .bind(&mv.to_square)
    .bind(&mv.piece)
    .fetch_one(pool)
    .await
    .map_err(SessionError::Sqlx)?;

    Ok(row)
}
