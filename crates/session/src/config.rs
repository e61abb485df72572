use std::env;

use evaluator::EngineConfig;

use crate::error::SessionError;
use crate::model::ParticipantId;

#[derive(Clone, Debug)]
pub struct Config {
    /// Required for networked play only
    pub database_url: Option<String>,
    pub player_id: Option<ParticipantId>,
    pub time_control: String,
    pub engine: EngineConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, SessionError> {
        let player_id = match env::var("PLAYER_ID") {
            Ok(raw) => Some(
                raw.parse()
                    .map_err(|_| SessionError::Config("PLAYER_ID must be a UUID"))?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty()),
            player_id,
            time_control: env::var("TIME_CONTROL").unwrap_or_else(|_| "blitz".to_string()),
            engine: EngineConfig::from_env()?,
        })
    }

    pub fn database_url(&self) -> Result<&str, SessionError> {
        self.database_url
            .as_deref()
            .ok_or(SessionError::Config("DATABASE_URL must be set for networked play"))
    }

    pub fn player_id(&self) -> Result<ParticipantId, SessionError> {
        self.player_id
            .ok_or(SessionError::Config("PLAYER_ID must be set for networked play"))
    }
}
