//! The authoritative state of one session on this client.
//!
//! Every move, local or remote, goes through [`GameSession::apply_move`]. The
//! board, move log, history rows, capture tally and evaluation scores are all
//! owned here and change together or not at all.

use shakmaty::Color;
use thiserror::Error;
use tracing::{debug, info};

use chess_core::classify::{classify, MoveQuality, QualityCounts};
use chess_core::game_data::{GameData, GameMetadata};
use chess_core::history::{self, CaptureTally, HistoryRow};
use chess_core::pgn;
use chess_core::types::EvaluationSample;
use chess_core::{
    CandidateMove, GameResult, MoveRecord, RulesAdapter, RulesError, SessionStatus,
    TerminalOutcome, STANDARD_START_FEN,
};

use crate::error::SessionError;
use crate::model::{GameRow, MoveRow, NewMove, ParticipantId, Session};

/// Where a move came from. Only local moves are written to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOrigin {
    Local,
    /// The opponent, over the relay or as the engine.
    Remote,
}

/// Why a move was refused. The session is unchanged in every case.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveRejection {
    #[error("the game has not started")]
    NotActive,

    #[error("the game is over")]
    Finished,

    #[error("not your turn")]
    OutOfTurn,

    #[error("illegal move: {0}")]
    Illegal(String),
}

/// The result this client must write to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinishReport {
    pub winner: Option<ParticipantId>,
    pub result: GameResult,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppliedMove {
    pub record: MoveRecord,
    pub origin: MoveOrigin,
    pub outcome: TerminalOutcome,
    /// Present for local moves only.
    pub persist: Option<NewMove>,
    /// Present when this move ended the game and this client records results.
    pub finish: Option<FinishReport>,
}

/// A score accepted for the current position.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluated {
    /// Plies played before the evaluated position.
    pub ply: usize,
    pub score: f64,
    /// Label of the move that led here, when the previous score is known.
    pub quality: Option<MoveQuality>,
    pub best_move: Option<CandidateMove>,
}

pub struct GameSession {
    session: Session,
    local: ParticipantId,
    local_side: Color,
    /// Player 1 writes the final result.
    initiator: bool,
    engine_side: Option<Color>,
    rules: RulesAdapter,
    outcome: TerminalOutcome,
    rows: Vec<HistoryRow>,
    captures: CaptureTally,
    /// Score per position, index = plies played.
    scores: Vec<Option<f64>>,
    /// Label per move, index = ply - 1.
    qualities: Vec<Option<MoveQuality>>,
    pending_finish: Option<FinishReport>,
}

impl GameSession {
    pub fn new(session: Session, local: ParticipantId, local_side: Color, initiator: bool) -> Self {
        Self {
            session,
            local,
            local_side,
            initiator,
            engine_side: None,
            rules: RulesAdapter::new(),
            outcome: TerminalOutcome::Ongoing,
            rows: Vec::new(),
            captures: CaptureTally::default(),
            scores: vec![None],
            qualities: Vec::new(),
            pending_finish: None,
        }
    }

    /// A live session against the engine. The local player records results.
    pub fn against_engine(row: &GameRow, local: ParticipantId, local_side: Color) -> Self {
        let (white, black) = match local_side {
            Color::White => (Some(local), None),
            Color::Black => (None, Some(local)),
        };
        let session = Session {
            id: row.id,
            white,
            black,
            status: SessionStatus::InProgress,
            time_control: row.time_control.clone(),
            result: GameResult::Undetermined,
            winner: None,
            created_at: row.created_at,
        };
        let mut game = Self::new(session, local, local_side, true);
        game.engine_side = Some(!local_side);
        game
    }

    /// Rebuild a session from the stored game and its move log.
    pub fn restore(
        row: &GameRow,
        moves: &[MoveRow],
        local: ParticipantId,
    ) -> Result<Self, SessionError> {
        let local_side = row
            .side_of(local)
            .ok_or(SessionError::NotAParticipant(local, row.id))?;
        let session = Session::try_from(row)?;
        let stored_status = session.status;
        let mut game = Self::new(session, local, local_side, row.player1_id == local);

        for (i, mv) in moves.iter().enumerate() {
            if usize::try_from(mv.move_number).ok() != Some(i + 1) {
                return Err(SessionError::Corrupt(format!(
                    "game {} move {} stored as number {}",
                    row.id,
                    i + 1,
                    mv.move_number
                )));
            }
            game.play(&mv.candidate()?)?;
        }
        game.scores = vec![None; game.rules.history().len() + 1];
        game.qualities = vec![None; game.rules.history().len()];

        // A terminal board whose result never reached the store
        if game.outcome.is_terminal() && stored_status != SessionStatus::Finished {
            game.pending_finish = game.finish(game.outcome);
        }

        info!(
            game_id = row.id,
            plies = moves.len(),
            status = %game.session.status,
            "Session restored"
        );
        Ok(game)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status
    }

    pub fn is_active(&self) -> bool {
        self.session.status == SessionStatus::InProgress
    }

    pub fn is_finished(&self) -> bool {
        self.session.status == SessionStatus::Finished
    }

    pub fn local(&self) -> ParticipantId {
        self.local
    }

    pub fn local_side(&self) -> Color {
        self.local_side
    }

    pub fn engine_side(&self) -> Option<Color> {
        self.engine_side
    }

    pub fn is_local_turn(&self) -> bool {
        self.rules.turn() == self.local_side
    }

    pub fn rules(&self) -> &RulesAdapter {
        &self.rules
    }

    pub fn fen(&self) -> String {
        self.rules.fen()
    }

    pub fn records(&self) -> &[MoveRecord] {
        self.rules.history()
    }

    pub fn plies(&self) -> usize {
        self.rules.history().len()
    }

    pub fn history(&self) -> &[HistoryRow] {
        &self.rows
    }

    pub fn captures(&self) -> &CaptureTally {
        &self.captures
    }

    pub fn outcome(&self) -> TerminalOutcome {
        self.outcome
    }

    pub fn result(&self) -> GameResult {
        self.session.result
    }

    /// Score of the position after `ply` plies, if it was evaluated.
    pub fn score_at(&self, ply: usize) -> Option<f64> {
        self.scores.get(ply).copied().flatten()
    }

    pub fn quality_of(&self, ply: usize) -> Option<MoveQuality> {
        ply.checked_sub(1)
            .and_then(|i| self.qualities.get(i).copied().flatten())
    }

    /// A result this client owes the store from before it mounted.
    pub fn take_pending_finish(&mut self) -> Option<FinishReport> {
        self.pending_finish.take()
    }

    /// `Waiting → Active`. Returns whether the status changed.
    pub fn activate(&mut self) -> bool {
        if self.session.status != SessionStatus::Waiting {
            return false;
        }
        self.session.status = SessionStatus::InProgress;
        info!(game_id = self.session.id, "Session active");
        true
    }

    /// The store says the game is over though this board never got there.
    /// Returns whether the status changed.
    pub fn finished_elsewhere(&mut self, result: GameResult) -> bool {
        if self.is_finished() {
            return false;
        }
        self.session.status = SessionStatus::Finished;
        self.session.result = result;
        self.session.winner = result.winner().and_then(|c| self.session.participant(c));
        true
    }

    pub fn check_terminal_outcome(&self) -> TerminalOutcome {
        self.rules.outcome()
    }

    pub fn apply_move(
        &mut self,
        candidate: CandidateMove,
        origin: MoveOrigin,
    ) -> Result<AppliedMove, MoveRejection> {
        match self.session.status {
            SessionStatus::Finished => return Err(MoveRejection::Finished),
            SessionStatus::Waiting => return Err(MoveRejection::NotActive),
            SessionStatus::InProgress => {}
        }
        if self.is_local_turn() != (origin == MoveOrigin::Local) {
            return Err(MoveRejection::OutOfTurn);
        }

        let record = self
            .play(&candidate)
            .map_err(|e| MoveRejection::Illegal(e.to_string()))?;
        self.scores.push(None);
        self.qualities.push(None);

        let persist = (origin == MoveOrigin::Local)
            .then(|| NewMove::from_record(self.session.id, self.local, &record));

        let outcome = self.outcome;
        let finish = if outcome.is_terminal() {
            info!(game_id = self.session.id, %outcome, "Game over");
            self.finish(outcome)
        } else {
            None
        };

        debug!(san = %record.san, number = record.number, ?origin, "Move applied");
        Ok(AppliedMove {
            record,
            origin,
            outcome,
            persist,
            finish,
        })
    }

    /// Accept an evaluation if it is for the current position.
    pub fn on_evaluation(&mut self, sample: &EvaluationSample) -> Option<Evaluated> {
        if sample.fen != self.rules.fen() {
            debug!(fen = %sample.fen, "Evaluation for an old position ignored");
            return None;
        }
        let ply = self.plies();
        if let Some(slot) = self.scores.get_mut(ply) {
            *slot = Some(sample.score);
        }

        let previous = ply.checked_sub(1).and_then(|p| self.score_at(p));
        let quality = match (previous, self.rules.last_move()) {
            (Some(prev), Some(mv)) => Some(classify(prev, sample.score, mv.side)),
            _ => None,
        };
        if let (Some(q), Some(slot)) = (quality, ply.checked_sub(1)) {
            if let Some(entry) = self.qualities.get_mut(slot) {
                *entry = Some(q);
            }
        }

        Some(Evaluated {
            ply,
            score: sample.score,
            quality,
            best_move: sample.best_move,
        })
    }

    /// Labels earned by one side so far.
    pub fn quality_counts(&self, side: Color) -> QualityCounts {
        self.rules
            .history()
            .iter()
            .zip(&self.qualities)
            .filter(|(record, _)| record.side == side)
            .filter_map(|(_, quality)| *quality)
            .collect()
    }

    pub fn game_data(&self) -> GameData {
        let name = |side: Color| match self.session.participant(side) {
            Some(p) => p.to_string(),
            None if self.engine_side == Some(side) => "Stockfish".to_string(),
            None => "?".to_string(),
        };
        let start = self.rules.start_fen();

        GameData {
            metadata: GameMetadata {
                white: name(Color::White),
                black: name(Color::Black),
                result: self.session.result.as_str().to_string(),
                date: Some(self.session.created_at.format("%Y.%m.%d").to_string()),
                time_control: Some(self.session.time_control.clone()),
                event: Some(format!("relay-chess game {}", self.session.id)),
                fen: (start != STANDARD_START_FEN).then_some(start),
            },
            moves: self.rules.history().iter().map(|r| r.san.clone()).collect(),
        }
    }

    pub fn pgn(&self) -> String {
        pgn::to_pgn(&self.game_data())
    }

    fn play(&mut self, candidate: &CandidateMove) -> Result<MoveRecord, RulesError> {
        let record = self.rules.apply(candidate)?;
        self.rows = history::project(self.rules.history());
        self.captures = CaptureTally::from_records(self.rules.history());
        self.outcome = self.rules.outcome();
        Ok(record)
    }

    fn finish(&mut self, outcome: TerminalOutcome) -> Option<FinishReport> {
        let result = outcome.result();
        self.session.status = SessionStatus::Finished;
        self.session.result = result;
        self.session.winner = outcome.winner().and_then(|c| self.session.participant(c));
        self.initiator.then_some(FinishReport {
            winner: self.session.winner,
            result,
        })
    }
}
