pub mod bridge;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod machine;
pub mod model;
pub mod realtime;
pub mod runner;

pub use error::SessionError;
pub use gateway::PersistenceGateway;
pub use machine::{GameSession, MoveOrigin, MoveRejection};
pub use model::{GameId, GameRow, MoveRow, ParticipantId};
pub use runner::{LocalInput, SessionEvent, SessionRunner, SessionSummary};
