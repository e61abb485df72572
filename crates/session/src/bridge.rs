//! Filters live events from the relay before they reach the session.

use tracing::{debug, warn};

use chess_core::types::MoveParseError;
use chess_core::{CandidateMove, GameResult, SessionStatus};

use crate::error::SessionError;
use crate::model::{GameId, GameRow, MoveRow, ParticipantId};
use crate::realtime::{Realtime, Subscription};

/// What to do with a game row update.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusAction {
    /// The game went live; reported once per bridge.
    Start,
    /// The stored game is finished.
    Finished(GameResult),
    Ignore,
}

/// What to do with a move insert.
#[derive(Debug, Clone, PartialEq)]
pub enum MoveAction {
    Forward(CandidateMove),
    /// Our own move coming back from the relay.
    Echo,
    /// Already applied, by replay or an earlier delivery.
    Duplicate,
    /// Later than the next ply; something in between was never delivered.
    Gap,
    Malformed(MoveParseError),
}

pub struct SyncBridge {
    local: ParticipantId,
    started: bool,
}

impl SyncBridge {
    pub fn new(local: ParticipantId) -> Self {
        Self {
            local,
            started: false,
        }
    }

    /// Record that the session is already live, so a later in-progress update
    /// is not reported again.
    pub fn mark_started(&mut self) {
        self.started = true;
    }

    pub fn on_status(&mut self, row: &GameRow) -> StatusAction {
        match row.status.parse::<SessionStatus>() {
            Ok(SessionStatus::InProgress) if !self.started => {
                self.started = true;
                StatusAction::Start
            }
            Ok(SessionStatus::Finished) => StatusAction::Finished(
                row.result
                    .as_deref()
                    .map(GameResult::parse)
                    .unwrap_or(GameResult::Undetermined),
            ),
            _ => StatusAction::Ignore,
        }
    }

    /// `applied` is the number of plies the local board already holds.
    pub fn on_move(&self, row: &MoveRow, applied: usize) -> MoveAction {
        if row.player_id == self.local {
            debug!(move_number = row.move_number, "Echo of local move discarded");
            return MoveAction::Echo;
        }
        let Ok(number) = usize::try_from(row.move_number) else {
            return MoveAction::Duplicate;
        };
        if number <= applied {
            debug!(move_number = row.move_number, applied, "Duplicate move discarded");
            return MoveAction::Duplicate;
        }
        if number > applied + 1 {
            warn!(move_number = row.move_number, applied, "Move arrived ahead of sequence");
            return MoveAction::Gap;
        }
        match row.candidate() {
            Ok(candidate) => MoveAction::Forward(candidate),
            Err(e) => MoveAction::Malformed(e),
        }
    }
}

/// Both live feeds of one game. Dropping this unsubscribes.
pub struct BridgeSubscriptions {
    pub status: Subscription<GameRow>,
    pub moves: Subscription<MoveRow>,
}

pub async fn mount(
    realtime: &dyn Realtime,
    game_id: GameId,
) -> Result<BridgeSubscriptions, SessionError> {
    let status = realtime.subscribe_game(game_id).await?;
    let moves = realtime.subscribe_moves(game_id).await?;
    Ok(BridgeSubscriptions { status, moves })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn player(n: u128) -> ParticipantId {
        ParticipantId(Uuid::from_u128(n))
    }

    fn move_row(who: ParticipantId, number: i32, from: &str, to: &str) -> MoveRow {
        MoveRow {
            id: i64::from(number),
            game_id: 1,
            player_id: who,
            move_number: number,
            from_square: from.into(),
            to_square: to.into(),
            piece: Some("p".into()),
            created_at: Utc::now(),
        }
    }

    fn game_row(status: &str, result: Option<&str>) -> GameRow {
        GameRow {
            id: 1,
            player1_id: player(1),
            player2_id: Some(player(2)),
            status: status.into(),
            time_control: "blitz".into(),
            winner: None,
            result: result.map(String::from),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_own_move_is_echo() {
        let bridge = SyncBridge::new(player(1));
        let row = move_row(player(1), 1, "e2", "e4");
        assert_eq!(bridge.on_move(&row, 0), MoveAction::Echo);
    }

    #[test]
    fn test_opponent_move_forwarded() {
        let bridge = SyncBridge::new(player(1));
        let row = move_row(player(2), 2, "e7", "e5");
        assert_eq!(
            bridge.on_move(&row, 1),
            MoveAction::Forward("e7e5".parse().unwrap())
        );
    }

    #[test]
    fn test_already_applied_is_duplicate() {
        let bridge = SyncBridge::new(player(1));
        let row = move_row(player(2), 2, "e7", "e5");
        assert_eq!(bridge.on_move(&row, 2), MoveAction::Duplicate);
        assert_eq!(bridge.on_move(&row, 5), MoveAction::Duplicate);
    }

    #[test]
    fn test_skipped_number_is_gap() {
        let bridge = SyncBridge::new(player(1));
        let row = move_row(player(2), 4, "e7", "e5");
        assert_eq!(bridge.on_move(&row, 2), MoveAction::Gap);
        assert_eq!(bridge.on_move(&row, 3), MoveAction::Forward("e7e5".parse().unwrap()));
    }

    #[test]
    fn test_bad_square_is_malformed() {
        let bridge = SyncBridge::new(player(1));
        let row = move_row(player(2), 1, "z9", "e5");
        assert!(matches!(bridge.on_move(&row, 0), MoveAction::Malformed(_)));
    }

    #[test]
    fn test_start_reported_once() {
        let mut bridge = SyncBridge::new(player(1));
        assert_eq!(bridge.on_status(&game_row("waiting", None)), StatusAction::Ignore);
        assert_eq!(bridge.on_status(&game_row("in_progress", None)), StatusAction::Start);
        assert_eq!(bridge.on_status(&game_row("in_progress", None)), StatusAction::Ignore);
    }

    #[test]
    fn test_mark_started_suppresses_start() {
        let mut bridge = SyncBridge::new(player(2));
        bridge.mark_started();
        assert_eq!(bridge.on_status(&game_row("in_progress", None)), StatusAction::Ignore);
    }

    #[test]
    fn test_finished_status() {
        let mut bridge = SyncBridge::new(player(1));
        assert_eq!(
            bridge.on_status(&game_row("finished", Some("1/2-1/2"))),
            StatusAction::Finished(GameResult::Draw)
        );
    }
}
