//! A scripted in-process UCI engine for tests.
//!
//! The script answers `uci` and `isready` itself and hands every
//! `go depth N` to a responder closure along with the last `position fen`.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Semaphore;

use crate::config::EngineConfig;
use crate::engine::UciEngine;
use crate::error::EvalError;

/// Lines printed in answer to one `go`.
#[derive(Debug, Clone, Default)]
pub struct Reply {
    pub lines: Vec<String>,
}

impl Reply {
    pub fn best(uci: &str, cp: i32) -> Self {
        Self {
            lines: vec![
                format!("info depth 1 score cp {cp} pv {uci}"),
                format!("bestmove {uci}"),
            ],
        }
    }

    pub fn mate(uci: &str, moves: i32) -> Self {
        Self {
            lines: vec![
                format!("info depth 1 score mate {moves} pv {uci}"),
                format!("bestmove {uci}"),
            ],
        }
    }

    /// The engine exits instead of answering.
    pub fn crash() -> Self {
        Self::default()
    }
}

/// Start a scripted engine. The receiver yields every command the engine got.
pub async fn scripted_engine<F>(
    respond: F,
) -> Result<(UciEngine, UnboundedReceiver<String>), EvalError>
where
    F: FnMut(&str, u32) -> Reply + Send + 'static,
{
    scripted_engine_gated(respond, None).await
}

/// Like [`scripted_engine`], but every `go` first takes a permit from `gate`.
pub async fn scripted_engine_gated<F>(
    respond: F,
    gate: Option<Arc<Semaphore>>,
) -> Result<(UciEngine, UnboundedReceiver<String>), EvalError>
where
    F: FnMut(&str, u32) -> Reply + Send + 'static,
{
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();
    tokio::spawn(run_script(server, respond, gate, seen_tx));

    let (reader, writer) = tokio::io::split(client);
    let engine = UciEngine::from_io(reader, writer, &EngineConfig::default()).await?;
    Ok((engine, seen_rx))
}

async fn run_script<F>(
    stream: DuplexStream,
    mut respond: F,
    gate: Option<Arc<Semaphore>>,
    seen: UnboundedSender<String>,
) where
    F: FnMut(&str, u32) -> Reply + Send + 'static,
{
    let (read, mut write) = tokio::io::split(stream);
    let mut lines = BufReader::new(read).lines();
    let mut fen = String::new();

    while let Ok(Some(cmd)) = lines.next_line().await {
        let _ = seen.send(cmd.clone());

        let reply = if cmd == "uci" {
            vec!["id name Scripted".to_string(), "uciok".to_string()]
        } else if cmd == "isready" {
            vec!["readyok".to_string()]
        } else if let Some(f) = cmd.strip_prefix("position fen ") {
            fen = f.to_string();
            continue;
        } else if let Some(depth) = cmd.strip_prefix("go depth ") {
            if let Some(gate) = &gate {
                match gate.acquire().await {
                    Ok(permit) => permit.forget(),
                    Err(_) => return,
                }
            }
            let reply = respond(&fen, depth.trim().parse().unwrap_or(0));
            if reply.lines.is_empty() {
                return;
            }
            reply.lines
        } else if cmd == "quit" {
            return;
        } else {
            continue;
        };

        for line in reply {
            if write.write_all(format!("{line}\n").as_bytes()).await.is_err() {
                return;
            }
        }
    }
}
