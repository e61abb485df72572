//! In-process store and relay for tests and offline (computer) play.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::warn;

use chess_core::{GameResult, SessionStatus};

use crate::error::SessionError;
use crate::gateway::PersistenceGateway;
use crate::model::{GameId, GameRow, MoveRow, NewMove, ParticipantId};
use crate::realtime::{Realtime, Subscription, FEED_CAPACITY};

#[derive(Default)]
struct State {
    games: BTreeMap<GameId, GameRow>,
    moves: HashMap<GameId, Vec<MoveRow>>,
    next_move_id: i64,
    game_feeds: HashMap<GameId, broadcast::Sender<GameRow>>,
    move_feeds: HashMap<GameId, broadcast::Sender<MoveRow>>,
}

impl State {
    fn game_feed(&mut self, game_id: GameId) -> &broadcast::Sender<GameRow> {
        self.game_feeds
            .entry(game_id)
            .or_insert_with(|| broadcast::channel(FEED_CAPACITY).0)
    }

    fn move_feed(&mut self, game_id: GameId) -> &broadcast::Sender<MoveRow> {
        self.move_feeds
            .entry(game_id)
            .or_insert_with(|| broadcast::channel(FEED_CAPACITY).0)
    }

    fn game_mut(&mut self, game_id: GameId) -> Result<&mut GameRow, SessionError> {
        self.games
            .get_mut(&game_id)
            .ok_or(SessionError::GameNotFound(game_id))
    }
}

/// Same contract as the Postgres store and its triggers, held in memory.
#[derive(Default)]
pub struct MemoryRelay {
    state: Mutex<State>,
    fail_writes: AtomicBool,
    results_written: AtomicUsize,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail, as an unreachable store would.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// How many `finish_game` calls actually finished a game.
    pub fn results_written(&self) -> usize {
        self.results_written.load(Ordering::SeqCst)
    }

    /// Live subscriptions on one game, both feeds together.
    pub async fn subscriber_count(&self, game_id: GameId) -> usize {
        let state = self.state.lock().await;
        state
            .game_feeds
            .get(&game_id)
            .map_or(0, |tx| tx.receiver_count())
            + state
                .move_feeds
                .get(&game_id)
                .map_or(0, |tx| tx.receiver_count())
    }

    fn check_writable(&self) -> Result<(), SessionError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SessionError::Unavailable("writes disabled".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceGateway for MemoryRelay {
    async fn create_game(
        &self,
        player1: ParticipantId,
        time_control: &str,
    ) -> Result<GameRow, SessionError> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        let id = state.games.keys().next_back().map_or(1, |last| last + 1);
        let row = GameRow {
            id,
            player1_id: player1,
            player2_id: None,
            status: SessionStatus::Waiting.as_str().to_string(),
            time_control: time_control.to_string(),
            winner: None,
            result: None,
            created_at: Utc::now(),
        };
        state.games.insert(id, row.clone());
        Ok(row)
    }

    async fn join_game(
        &self,
        game_id: GameId,
        player2: ParticipantId,
    ) -> Result<GameRow, SessionError> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        let game = state.game_mut(game_id)?;
        let open = game.status == SessionStatus::Waiting.as_str()
            && game.player2_id.is_none()
            && game.player1_id != player2;
        if !open {
            return Err(SessionError::NotJoinable(game_id));
        }
        game.player2_id = Some(player2);
        game.status = SessionStatus::InProgress.as_str().to_string();
        let row = game.clone();
        let _ = state.game_feed(game_id).send(row.clone());
        Ok(row)
    }

    async fn fetch_game(&self, game_id: GameId) -> Result<GameRow, SessionError> {
        let state = self.state.lock().await;
        state
            .games
            .get(&game_id)
            .cloned()
            .ok_or(SessionError::GameNotFound(game_id))
    }

    async fn fetch_moves(&self, game_id: GameId) -> Result<Vec<MoveRow>, SessionError> {
        let state = self.state.lock().await;
        Ok(state.moves.get(&game_id).cloned().unwrap_or_default())
    }

    async fn append_move(&self, mv: &NewMove) -> Result<MoveRow, SessionError> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        if !state.games.contains_key(&mv.game_id) {
            return Err(SessionError::GameNotFound(mv.game_id));
        }
        state.next_move_id += 1;
        let id = state.next_move_id;

        let log = state.moves.entry(mv.game_id).or_default();
        let move_number = log.last().map_or(1, |last| last.move_number + 1);
        let row = MoveRow {
            id,
            game_id: mv.game_id,
            player_id: mv.player_id,
            move_number,
            from_square: mv.from_square.clone(),
            to_square: mv.to_square.clone(),
            piece: Some(mv.piece.clone()),
            created_at: Utc::now(),
        };
        log.push(row.clone());

        let _ = state.move_feed(mv.game_id).send(row.clone());
        Ok(row)
    }

    async fn finish_game(
        &self,
        game_id: GameId,
        winner: Option<ParticipantId>,
        result: GameResult,
    ) -> Result<bool, SessionError> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        let game = state.game_mut(game_id)?;
        if game.status == SessionStatus::Finished.as_str() {
            return Ok(false);
        }
        game.status = SessionStatus::Finished.as_str().to_string();
        game.winner = winner;
        game.result = Some(result.as_str().to_string());
        let row = game.clone();
        let _ = state.game_feed(game_id).send(row);
        self.results_written.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}

#[async_trait]
impl Realtime for MemoryRelay {
    async fn subscribe_game(&self, game_id: GameId) -> Result<Subscription<GameRow>, SessionError> {
        let source = self.state.lock().await.game_feed(game_id).subscribe();
        Ok(forward(source))
    }

    async fn subscribe_moves(
        &self,
        game_id: GameId,
    ) -> Result<Subscription<MoveRow>, SessionError> {
        let source = self.state.lock().await.move_feed(game_id).subscribe();
        Ok(forward(source))
    }
}

fn forward<T>(mut source: broadcast::Receiver<T>) -> Subscription<T>
where
    T: Clone + Send + 'static,
{
    let (tx, rx) = mpsc::channel(FEED_CAPACITY);
    let task = tokio::spawn(async move {
        loop {
            match source.recv().await {
                Ok(event) => {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Subscriber fell behind; events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
    Subscription::new(rx, task)
}
