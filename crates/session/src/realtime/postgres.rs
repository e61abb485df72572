//! LISTEN/NOTIFY feeds fed by the triggers installed in `db::pool`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::model::{GameId, GameRow, MoveRow};
use crate::realtime::{Realtime, Subscription, FEED_CAPACITY};

#[derive(Clone)]
pub struct PgRealtime {
    pool: PgPool,
}

impl PgRealtime {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn listen<T>(&self, channel: String) -> Result<Subscription<T>, SessionError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| SessionError::Subscription(format!("connect for {channel}: {e}")))?;
        listener
            .listen(&channel)
            .await
            .map_err(|e| SessionError::Subscription(format!("listen on {channel}: {e}")))?;
        debug!(channel = %channel, "Subscribed");

        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        let task = tokio::spawn(async move {
            loop {
                let notification = match listener.recv().await {
                    Ok(n) => n,
                    Err(e) => {
                        warn!(channel = %channel, error = %e, "Notification stream ended");
                        break;
                    }
                };
                match serde_json::from_str::<T>(notification.payload()) {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(channel = %channel, error = %e, "Undecodable notification skipped");
                    }
                }
            }
            debug!(channel = %channel, "Unsubscribed");
        });

        Ok(Subscription::new(rx, task))
    }
}

#[async_trait]
impl Realtime for PgRealtime {
    async fn subscribe_game(&self, game_id: GameId) -> Result<Subscription<GameRow>, SessionError> {
        self.listen(format!("game_{game_id}")).await
    }

    async fn subscribe_moves(
        &self,
        game_id: GameId,
    ) -> Result<Subscription<MoveRow>, SessionError> {
        self.listen(format!("moves_{game_id}")).await
    }
}
