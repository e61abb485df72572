//! Background position evaluation over UCI.

pub mod config;
pub mod engine;
pub mod error;
pub mod service;
pub mod uci;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::EngineConfig;
pub use engine::UciEngine;
pub use error::EvalError;
pub use service::{EvaluationService, RequestToken};
