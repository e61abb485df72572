//! One client's event loop over a session.
//!
//! Local input, live relay events and evaluator results are handled one at a
//! time on a single task, each to completion before the next is taken.

use std::sync::Arc;

use shakmaty::{Color, Role, Square};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, info, warn};

use chess_core::classify::{advantage_percent, MoveQuality, QualityCounts};
use chess_core::click::{ClickOutcome, ClickToMove};
use chess_core::types::EvaluationSample;
use chess_core::{CandidateMove, GameResult, MoveRecord, TerminalOutcome};
use evaluator::EvaluationService;

use crate::bridge::{self, BridgeSubscriptions, MoveAction, StatusAction, SyncBridge};
use crate::error::SessionError;
use crate::gateway::PersistenceGateway;
use crate::machine::{AppliedMove, FinishReport, GameSession, MoveOrigin, MoveRejection};
use crate::model::{GameId, GameRow, MoveRow, ParticipantId};
use crate::realtime::{Realtime, Subscription};

pub const DEFAULT_EVAL_DEPTH: u32 = 8;
pub const DEFAULT_HINT_DEPTH: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalInput {
    /// A complete move, e.g. typed as UCI.
    Move(CandidateMove),
    Click(Square),
    Promote(Role),
    CancelSelection,
    Hint,
    Show(View),
    Quit,
}

/// Read-only views of the session a player can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    History,
    Fen,
    Pgn,
    Captures,
}

/// The sound a UI would play for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    GameStart,
    MoveSelf,
    MoveOpponent,
    Capture,
    Castle,
    Check,
    Illegal,
    GameEnd,
}

impl Cue {
    /// Check, then capture, then castle, then plain move.
    pub fn for_move(record: &MoveRecord, origin: MoveOrigin) -> Self {
        if record.gives_check {
            Cue::Check
        } else if record.captured.is_some() {
            Cue::Capture
        } else if record.is_castle {
            Cue::Castle
        } else if origin == MoveOrigin::Local {
            Cue::MoveSelf
        } else {
            Cue::MoveOpponent
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Started,
    MoveApplied {
        record: MoveRecord,
        origin: MoveOrigin,
        cue: Cue,
    },
    Rejected {
        candidate: CandidateMove,
        reason: MoveRejection,
    },
    Selection(ClickOutcome),
    Evaluation {
        ply: usize,
        score: f64,
        /// White's share of the advantage bar, 0-100.
        advantage: f64,
        quality: Option<MoveQuality>,
    },
    Hint(Option<CandidateMove>),
    /// Text answering a [`LocalInput::Show`].
    Report(String),
    Finished {
        outcome: TerminalOutcome,
        result: GameResult,
    },
    /// Something went wrong that the player should know about.
    Notice(String),
}

impl SessionEvent {
    pub fn cue(&self) -> Option<Cue> {
        match self {
            SessionEvent::Started => Some(Cue::GameStart),
            SessionEvent::MoveApplied { cue, .. } => Some(*cue),
            SessionEvent::Rejected { .. } => Some(Cue::Illegal),
            SessionEvent::Finished { .. } => Some(Cue::GameEnd),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub game_id: GameId,
    pub finished: bool,
    pub outcome: TerminalOutcome,
    pub result: GameResult,
    pub local_side: Color,
    pub plies: usize,
    /// Labels of the local player's moves.
    pub counts: QualityCounts,
    pub pgn: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EvalKind {
    Advisory,
    Hint,
}

struct EvalMessage {
    kind: EvalKind,
    sample: EvaluationSample,
}

pub struct SessionRunner {
    game: GameSession,
    gateway: Arc<dyn PersistenceGateway>,
    evaluator: Option<Arc<EvaluationService>>,
    feeds: Option<BridgeSubscriptions>,
    bridge: SyncBridge,
    click: ClickToMove,
    events: UnboundedSender<SessionEvent>,
    eval_tx: Option<UnboundedSender<EvalMessage>>,
    eval_depth: u32,
    hint_depth: u32,
}

impl SessionRunner {
    /// Mount a networked session: subscribe, then replay the stored moves.
    ///
    /// Feeds are opened before the log is read so nothing committed in
    /// between is lost; moves seen twice are dropped by number.
    pub async fn open(
        gateway: Arc<dyn PersistenceGateway>,
        realtime: &dyn Realtime,
        game_id: GameId,
        local: ParticipantId,
        evaluator: Option<Arc<EvaluationService>>,
        events: UnboundedSender<SessionEvent>,
    ) -> Result<Self, SessionError> {
        let feeds = bridge::mount(realtime, game_id).await?;
        let row = gateway.fetch_game(game_id).await?;
        let moves = gateway.fetch_moves(game_id).await?;
        let game = GameSession::restore(&row, &moves, local)?;

        let mut bridge = SyncBridge::new(local);
        if game.status() != chess_core::SessionStatus::Waiting {
            bridge.mark_started();
        }

        Ok(Self::build(game, gateway, evaluator, Some(feeds), bridge, events))
    }

    /// A session against the engine. Nothing is subscribed; the engine's
    /// moves come from the advisory evaluations.
    pub fn against_engine(
        gateway: Arc<dyn PersistenceGateway>,
        row: &GameRow,
        local: ParticipantId,
        local_side: Color,
        evaluator: Arc<EvaluationService>,
        events: UnboundedSender<SessionEvent>,
    ) -> Self {
        let game = GameSession::against_engine(row, local, local_side);
        let mut bridge = SyncBridge::new(local);
        bridge.mark_started();
        Self::build(game, gateway, Some(evaluator), None, bridge, events)
    }

    fn build(
        game: GameSession,
        gateway: Arc<dyn PersistenceGateway>,
        evaluator: Option<Arc<EvaluationService>>,
        feeds: Option<BridgeSubscriptions>,
        bridge: SyncBridge,
        events: UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            game,
            gateway,
            evaluator,
            feeds,
            bridge,
            click: ClickToMove::new(),
            events,
            eval_tx: None,
            eval_depth: DEFAULT_EVAL_DEPTH,
            hint_depth: DEFAULT_HINT_DEPTH,
        }
    }

    pub fn with_depths(mut self, eval_depth: u32, hint_depth: u32) -> Self {
        self.eval_depth = eval_depth;
        self.hint_depth = hint_depth;
        self
    }

    pub fn game(&self) -> &GameSession {
        &self.game
    }

    /// Run until the game ends, the player quits, or input closes.
    pub async fn run(mut self, mut inputs: mpsc::Receiver<LocalInput>) -> SessionSummary {
        let (eval_tx, mut eval_rx) = mpsc::unbounded_channel();
        self.eval_tx = Some(eval_tx);

        let (mut status_feed, mut move_feed) = match self.feeds.take() {
            Some(feeds) => (Some(feeds.status), Some(feeds.moves)),
            None => (None, None),
        };

        if let Some(report) = self.game.take_pending_finish() {
            self.write_result(report).await;
        }
        if self.game.is_active() {
            info!(game_id = self.game.session().id, side = ?self.game.local_side(), "Session started");
            self.emit(SessionEvent::Started);
            self.request_evaluation().await;
        }

        while !self.game.is_finished() {
            tokio::select! {
                input = inputs.recv() => match input {
                    None | Some(LocalInput::Quit) => break,
                    Some(input) => self.on_input(input).await,
                },
                update = next_event(&mut status_feed) => match update {
                    Some(row) => self.on_status(&row).await,
                    None => {
                        status_feed = None;
                        self.notice("Game status feed closed".to_string());
                    }
                },
                row = next_event(&mut move_feed) => match row {
                    Some(row) => self.on_remote_move(&row).await,
                    None => {
                        move_feed = None;
                        self.notice("Move feed closed".to_string());
                    }
                },
                Some(message) = eval_rx.recv() => self.on_evaluation(message).await,
            }
        }

        // Dropping the feeds unsubscribes; late evaluations find no receiver
        drop(status_feed);
        drop(move_feed);
        self.summary()
    }

    fn summary(&self) -> SessionSummary {
        let local_side = self.game.local_side();
        SessionSummary {
            game_id: self.game.session().id,
            finished: self.game.is_finished(),
            outcome: self.game.outcome(),
            result: self.game.result(),
            local_side,
            plies: self.game.plies(),
            counts: self.game.quality_counts(local_side),
            pgn: self.game.pgn(),
        }
    }

    async fn on_input(&mut self, input: LocalInput) {
        match input {
            LocalInput::Move(candidate) => self.play_local(candidate).await,
            LocalInput::Click(square) => match self.click.click(square, self.game.rules()) {
                ClickOutcome::Move(candidate) => self.play_local(candidate).await,
                other => self.emit(SessionEvent::Selection(other)),
            },
            LocalInput::Promote(role) => match self.click.promote(role) {
                Some(candidate) => self.play_local(candidate).await,
                None => self.notice("No promotion is pending".to_string()),
            },
            LocalInput::CancelSelection => self.click.cancel(),
            LocalInput::Hint => self.request_hint().await,
            LocalInput::Show(view) => self.emit(SessionEvent::Report(self.render(view))),
            LocalInput::Quit => {}
        }
    }

    async fn play_local(&mut self, candidate: CandidateMove) {
        match self.game.apply_move(candidate, MoveOrigin::Local) {
            Ok(applied) => self.after_move(applied).await,
            Err(reason) => {
                debug!(%candidate, %reason, "Local move rejected");
                self.emit(SessionEvent::Rejected { candidate, reason });
            }
        }
    }

    async fn on_remote_move(&mut self, row: &MoveRow) {
        if !self.apply_remote_row(row).await {
            self.catch_up().await;
        }
    }

    /// Apply one live move row. Returns `false` when the row is ahead of the
    /// board and the log has to be read back.
    async fn apply_remote_row(&mut self, row: &MoveRow) -> bool {
        match self.bridge.on_move(row, self.game.plies()) {
            MoveAction::Echo | MoveAction::Duplicate => {}
            MoveAction::Gap => return false,
            MoveAction::Malformed(e) => {
                warn!(move_number = row.move_number, error = %e, "Undecodable remote move");
                self.notice(format!("Opponent's move {} could not be read", row.move_number));
            }
            MoveAction::Forward(candidate) => {
                match self.game.apply_move(candidate, MoveOrigin::Remote) {
                    Ok(applied) => self.after_move(applied).await,
                    Err(reason) => {
                        warn!(%candidate, %reason, "Remote move rejected");
                        self.notice(format!("Opponent's move {candidate} rejected: {reason}"));
                    }
                }
            }
        }
        true
    }

    /// Bring the board up to the stored log.
    async fn catch_up(&mut self) {
        let game_id = self.game.session().id;
        let rows = match self.gateway.fetch_moves(game_id).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(game_id, error = %e, "Move log unavailable");
                self.notice(format!("Could not read the move log: {e}"));
                return;
            }
        };

        let before = self.game.plies();
        for row in &rows {
            if self.game.is_finished() {
                break;
            }
            let applied = self.game.plies();
            if usize::try_from(row.move_number).map_or(true, |n| n <= applied) {
                continue;
            }
            if !self.apply_remote_row(row).await || self.game.plies() == applied {
                warn!(game_id, move_number = row.move_number, "Move log out of step with the board");
                break;
            }
        }
        debug!(game_id, caught_up = self.game.plies() - before, "Caught up from move log");
    }

    async fn on_status(&mut self, row: &GameRow) {
        match self.bridge.on_status(row) {
            StatusAction::Start => {
                if self.game.activate() {
                    self.emit(SessionEvent::Started);
                    self.request_evaluation().await;
                }
            }
            StatusAction::Finished(result) => {
                // The final move may still be queued on the move feed
                self.catch_up().await;
                if self.game.finished_elsewhere(result) {
                    self.notice("The game was ended by the other client".to_string());
                    self.emit(SessionEvent::Finished {
                        outcome: self.game.outcome(),
                        result,
                    });
                }
            }
            StatusAction::Ignore => {}
        }
    }

    async fn after_move(&mut self, applied: AppliedMove) {
        self.click.cancel();
        let AppliedMove {
            record,
            origin,
            outcome,
            persist,
            finish,
        } = applied;

        let cue = Cue::for_move(&record, origin);
        self.emit(SessionEvent::MoveApplied {
            record,
            origin,
            cue,
        });

        if let Some(new_move) = persist {
            if let Err(e) = self.gateway.append_move(&new_move).await {
                warn!(error = %e, "Move not saved");
                self.notice(format!("Move not saved: {e}"));
            }
        }
        if let Some(report) = finish {
            self.write_result(report).await;
        }
        if outcome.is_terminal() {
            self.emit(SessionEvent::Finished {
                outcome,
                result: self.game.result(),
            });
        }

        self.request_evaluation().await;
    }

    async fn write_result(&mut self, report: FinishReport) {
        let game_id = self.game.session().id;
        match self
            .gateway
            .finish_game(game_id, report.winner, report.result)
            .await
        {
            Ok(true) => info!(game_id, result = %report.result, "Result recorded"),
            Ok(false) => debug!(game_id, "Result already recorded"),
            Err(e) => {
                warn!(game_id, error = %e, "Result not saved");
                self.notice(format!("Result not saved: {e}"));
            }
        }
    }

    async fn request_evaluation(&mut self) {
        let sent = self.send_evaluation(EvalKind::Advisory, self.eval_depth).await;
        if !sent && self.engine_to_move() {
            self.notice("The engine is not running".to_string());
        }
    }

    async fn request_hint(&mut self) {
        if !self.game.is_active() || !self.game.is_local_turn() {
            self.notice("Hints are only available on your move".to_string());
            return;
        }
        if !self.send_evaluation(EvalKind::Hint, self.hint_depth).await {
            self.notice("The engine is not running".to_string());
        }
    }

    async fn send_evaluation(&self, kind: EvalKind, depth: u32) -> bool {
        let (Some(service), Some(tx)) = (&self.evaluator, &self.eval_tx) else {
            return false;
        };
        let tx = tx.clone();
        service
            .evaluate(&self.game.fen(), depth, move |sample| {
                let _ = tx.send(EvalMessage { kind, sample });
            })
            .await
            .is_some()
    }

    async fn on_evaluation(&mut self, message: EvalMessage) {
        let Some(evaluated) = self.game.on_evaluation(&message.sample) else {
            return;
        };
        self.emit(SessionEvent::Evaluation {
            ply: evaluated.ply,
            score: evaluated.score,
            advantage: advantage_percent(evaluated.score),
            quality: evaluated.quality,
        });

        match message.kind {
            EvalKind::Hint => self.emit(SessionEvent::Hint(evaluated.best_move)),
            EvalKind::Advisory if self.engine_to_move() => match evaluated.best_move {
                Some(candidate) => match self.game.apply_move(candidate, MoveOrigin::Remote) {
                    Ok(applied) => self.after_move(applied).await,
                    Err(reason) => {
                        warn!(%candidate, %reason, "Engine move rejected");
                        self.notice(format!("Engine move {candidate} rejected: {reason}"));
                    }
                },
                None => self.notice("The engine has no move".to_string()),
            },
            EvalKind::Advisory => {}
        }
    }

    fn render(&self, view: View) -> String {
        match view {
            View::Fen => self.game.fen(),
            View::Pgn => self.game.pgn(),
            View::History => self
                .game
                .history()
                .iter()
                .map(|row| {
                    let white = if row.white.is_empty() { "..." } else { row.white.as_str() };
                    format!("{}. {} {}", row.move_number, white, row.black)
                        .trim_end()
                        .to_string()
                })
                .collect::<Vec<_>>()
                .join("\n"),
            View::Captures => {
                let captures = self.game.captures();
                let list = |roles: &[Role]| {
                    roles.iter().map(|r| r.char().to_string()).collect::<Vec<_>>().join(" ")
                };
                format!(
                    "white took: {}\nblack took: {}\nmaterial: {:+}",
                    list(&captures.by_white),
                    list(&captures.by_black),
                    captures.material_balance()
                )
            }
        }
    }

    fn engine_to_move(&self) -> bool {
        self.game.is_active() && self.game.engine_side() == Some(self.game.rules().turn())
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn notice(&self, message: String) {
        self.emit(SessionEvent::Notice(message));
    }
}

/// Next event from a feed, or never when there is no feed.
async fn next_event<T>(feed: &mut Option<Subscription<T>>) -> Option<T> {
    match feed {
        Some(feed) => feed.recv().await,
        None => std::future::pending().await,
    }
}
