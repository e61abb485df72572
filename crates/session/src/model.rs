//! Rows of the session store and the domain view built from them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shakmaty::Color;
use uuid::Uuid;

use chess_core::types::MoveParseError;
use chess_core::{CandidateMove, GameResult, MoveRecord, SessionStatus};

use crate::error::SessionError;

pub type GameId = i64;

/// Identity of a player, as stored in `games.player1_id` / `player2_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct ParticipantId(pub Uuid);

impl ParticipantId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ParticipantId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// A `games` row, also the payload of a game update notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct GameRow {
    pub id: GameId,
    pub player1_id: ParticipantId,
    pub player2_id: Option<ParticipantId>,
    pub status: String,
    pub time_control: String,
    pub winner: Option<ParticipantId>,
    pub result: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl GameRow {
    pub fn status(&self) -> Result<SessionStatus, SessionError> {
        self.status
            .parse()
            .map_err(|_| SessionError::Corrupt(format!("unknown game status '{}'", self.status)))
    }

    /// Side played by `who`, if they are in this game. Player 1 is white.
    pub fn side_of(&self, who: ParticipantId) -> Option<Color> {
        if self.player1_id == who {
            Some(Color::White)
        } else if self.player2_id == Some(who) {
            Some(Color::Black)
        } else {
            None
        }
    }
}

/// A `moves` row, also the payload of a move insert notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MoveRow {
    pub id: i64,
    pub game_id: GameId,
    pub player_id: ParticipantId,
    pub move_number: i32,
    pub from_square: String,
    pub to_square: String,
    pub piece: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MoveRow {
    pub fn candidate(&self) -> Result<CandidateMove, MoveParseError> {
        CandidateMove::from_parts(&self.from_square, &self.to_square, self.piece.as_deref())
    }
}

/// A move about to be appended. The store assigns the move number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMove {
    pub game_id: GameId,
    pub player_id: ParticipantId,
    pub from_square: String,
    pub to_square: String,
    pub piece: String,
}

impl NewMove {
    pub fn from_record(game_id: GameId, player_id: ParticipantId, record: &MoveRecord) -> Self {
        Self {
            game_id,
            player_id,
            from_square: record.from.to_string(),
            to_square: record.to.to_string(),
            piece: record.piece_code().to_string(),
        }
    }
}

/// Domain view of a game row.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: GameId,
    pub white: Option<ParticipantId>,
    /// `None` until someone joins, or for good in computer play.
    pub black: Option<ParticipantId>,
    pub status: SessionStatus,
    pub time_control: String,
    pub result: GameResult,
    pub winner: Option<ParticipantId>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn participant(&self, side: Color) -> Option<ParticipantId> {
        match side {
            Color::White => self.white,
            Color::Black => self.black,
        }
    }
}

impl TryFrom<&GameRow> for Session {
    type Error = SessionError;

    fn try_from(row: &GameRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            white: Some(row.player1_id),
            black: row.player2_id,
            status: row.status()?,
            time_control: row.time_control.clone(),
            result: row
                .result
                .as_deref()
                .map(GameResult::parse)
                .unwrap_or(GameResult::Undetermined),
            winner: row.winner,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shakmaty::{Role, Square};

    fn game_row() -> GameRow {
        GameRow {
            id: 7,
            player1_id: ParticipantId(Uuid::from_u128(1)),
            player2_id: Some(ParticipantId(Uuid::from_u128(2))),
            status: "in_progress".into(),
            time_control: "blitz".into(),
            winner: None,
            result: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_notification_payload_decodes() {
        // Shape produced by row_to_json on the moves table
        let payload = r#"{"id":12,"game_id":7,"player_id":"00000000-0000-0000-0000-000000000002",
            "move_number":2,"from_square":"e7","to_square":"e5","piece":"p",
            "created_at":"2025-01-15T10:00:00.123456+00:00"}"#;
        let row: MoveRow = serde_json::from_str(payload).unwrap();
        assert_eq!(row.move_number, 2);
        assert_eq!(row.player_id, ParticipantId(Uuid::from_u128(2)));

        let mv = row.candidate().unwrap();
        assert_eq!(mv.from, Square::E7);
        assert_eq!(mv.promotion, None);
    }

    #[test]
    fn test_promotion_piece_survives() {
        let row = MoveRow {
            id: 1,
            game_id: 7,
            player_id: ParticipantId(Uuid::from_u128(1)),
            move_number: 31,
            from_square: "a7".into(),
            to_square: "a8".into(),
            piece: Some("n".into()),
            created_at: Utc::now(),
        };
        assert_eq!(row.candidate().unwrap().promotion, Some(Role::Knight));
    }

    #[test]
    fn test_sides_and_session_view() {
        let row = game_row();
        assert_eq!(row.side_of(row.player1_id), Some(Color::White));
        assert_eq!(row.side_of(ParticipantId(Uuid::from_u128(2))), Some(Color::Black));
        assert_eq!(row.side_of(ParticipantId(Uuid::from_u128(3))), None);

        let session = Session::try_from(&row).unwrap();
        assert_eq!(session.status, SessionStatus::InProgress);
        assert_eq!(session.result, GameResult::Undetermined);
        assert_eq!(session.participant(Color::Black), row.player2_id);
    }

    #[test]
    fn test_unknown_status_is_corrupt() {
        let mut row = game_row();
        row.status = "paused".into();
        assert!(matches!(row.status(), Err(SessionError::Corrupt(_))));
    }
}
