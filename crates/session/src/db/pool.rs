use sqlx::postgres::{PgPool, PgPoolOptions};

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
}

/// Run the full Postgres schema migration inline.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- One row per match; player1 plays white
CREATE TABLE IF NOT EXISTS games (
    id           BIGSERIAL PRIMARY KEY,
    player1_id   UUID NOT NULL,
    player2_id   UUID,
    status       TEXT NOT NULL DEFAULT 'waiting'
                 CHECK (status IN ('waiting', 'in_progress', 'finished')),
    time_control TEXT NOT NULL DEFAULT 'blitz',
    winner       UUID,
    result       TEXT,
    created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_games_status ON games (status);

-- Append-only move log
CREATE TABLE IF NOT EXISTS moves (
    id          BIGSERIAL PRIMARY KEY,
    game_id     BIGINT NOT NULL REFERENCES games(id) ON DELETE CASCADE,
    player_id   UUID NOT NULL,
    move_number INTEGER NOT NULL,
    from_square TEXT NOT NULL,
    to_square   TEXT NOT NULL,
    piece       TEXT,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (game_id, move_number)
);

-- Realtime: full rows published on game_<id> and moves_<game_id>
CREATE OR REPLACE FUNCTION notify_game_update() RETURNS trigger AS $$
BEGIN
    PERFORM pg_notify('game_' || NEW.id, row_to_json(NEW)::text);
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE OR REPLACE FUNCTION notify_move_insert() RETURNS trigger AS $$
BEGIN
    PERFORM pg_notify('moves_' || NEW.game_id, row_to_json(NEW)::text);
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

DROP TRIGGER IF EXISTS games_notify_update ON games;
CREATE TRIGGER games_notify_update
    AFTER UPDATE ON games
    FOR EACH ROW EXECUTE FUNCTION notify_game_update();

DROP TRIGGER IF EXISTS moves_notify_insert ON moves;
CREATE TRIGGER moves_notify_insert
    AFTER INSERT ON moves
    FOR EACH ROW EXECUTE FUNCTION notify_move_insert();
"#;
