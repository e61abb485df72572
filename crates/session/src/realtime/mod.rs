//! Per-game live event feeds: game row updates and move inserts.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::SessionError;
use crate::model::{GameId, GameRow, MoveRow};

pub use memory::MemoryRelay;
pub use postgres::PgRealtime;

/// Events buffered per subscription before the feed applies backpressure.
pub(crate) const FEED_CAPACITY: usize = 64;

/// A live feed. Dropping it releases the underlying channel.
pub struct Subscription<T> {
    rx: mpsc::Receiver<T>,
    task: JoinHandle<()>,
}

impl<T> Subscription<T> {
    pub(crate) fn new(rx: mpsc::Receiver<T>, task: JoinHandle<()>) -> Self {
        Self { rx, task }
    }

    /// Next event in delivery order; `None` once the feed has ended.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[async_trait]
pub trait Realtime: Send + Sync {
    async fn subscribe_game(&self, game_id: GameId) -> Result<Subscription<GameRow>, SessionError>;

    async fn subscribe_moves(&self, game_id: GameId)
        -> Result<Subscription<MoveRow>, SessionError>;
}
