//! Evaluator error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Configuration error: {0}")]
    Config(&'static str),

    #[error("Stockfish error: {0}")]
    Stockfish(String),

    #[error("Stockfish closed its output")]
    Closed,

    #[error("Unexpected engine output: {0}")]
    Protocol(String),
}
