//! Engine configuration from environment variables

use std::env;

use crate::error::EvalError;

pub const DEFAULT_STOCKFISH_PATH: &str = "/usr/local/bin/stockfish";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Path to Stockfish binary
    pub stockfish_path: String,

    /// Depth of the advisory evaluation after every move
    pub eval_depth: u32,

    /// Depth of a requested hint
    pub hint_depth: u32,

    /// Transposition table size
    pub hash_mb: u32,

    pub threads: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stockfish_path: DEFAULT_STOCKFISH_PATH.to_string(),
            eval_depth: 8,
            hint_depth: 10,
            hash_mb: 64,
            threads: 1,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to defaults
    /// for anything unset or unparseable.
    pub fn from_env() -> Result<Self, EvalError> {
        let defaults = Self::default();

        let stockfish_path = env::var("STOCKFISH_PATH").unwrap_or(defaults.stockfish_path);
        let eval_depth = parse_var("EVAL_DEPTH").unwrap_or(defaults.eval_depth);
        let hint_depth = parse_var("HINT_DEPTH").unwrap_or(defaults.hint_depth);
        let hash_mb = parse_var("ENGINE_HASH_MB").unwrap_or(defaults.hash_mb);
        let threads = parse_var("ENGINE_THREADS").unwrap_or(defaults.threads);

        let config = Self {
            stockfish_path,
            eval_depth,
            hint_depth,
            hash_mb,
            threads,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EvalError> {
        if self.eval_depth == 0 || self.hint_depth == 0 {
            return Err(EvalError::Config("search depth must be at least 1"));
        }
        if self.threads == 0 {
            return Err(EvalError::Config("ENGINE_THREADS must be at least 1"));
        }
        if self.stockfish_path.trim().is_empty() {
            return Err(EvalError::Config("STOCKFISH_PATH is empty"));
        }
        Ok(())
    }
}

fn parse_var(key: &str) -> Option<u32> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.eval_depth, 8);
        assert_eq!(config.hint_depth, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_depth_rejected() {
        let config = EngineConfig {
            eval_depth: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(EvalError::Config(_))));
    }
}
