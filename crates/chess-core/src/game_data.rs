use serde::{Deserialize, Serialize};

/// PGN tag values for an exported session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameMetadata {
    pub white: String,
    pub black: String,
    pub result: String, // "1-0", "0-1", "1/2-1/2", "*"
    pub date: Option<String>,
    pub time_control: Option<String>,
    pub event: Option<String>,
    pub fen: Option<String>, // Only for games not starting from the standard position
}

/// A session as plain data, ready for PGN export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameData {
    pub metadata: GameMetadata,
    pub moves: Vec<String>, // SAN notation
}
