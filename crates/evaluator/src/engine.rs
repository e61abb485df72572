//! Stockfish engine wrapper using UCI protocol (async I/O)

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info};

use chess_core::EvaluationSample;

use crate::config::EngineConfig;
use crate::error::EvalError;
use crate::uci::{black_to_move, parse_bestmove, parse_info_score};

type EngineReader = BufReader<Box<dyn AsyncRead + Send + Unpin>>;
type EngineWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A UCI engine conversation, normally over a child process's pipes.
pub struct UciEngine {
    process: Option<Child>,
    stdin: EngineWriter,
    stdout: EngineReader,
}

impl UciEngine {
    /// Spawn a new Stockfish process and initialize UCI
    pub async fn spawn(config: &EngineConfig) -> Result<Self, EvalError> {
        let mut process = Command::new(&config.stockfish_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| EvalError::Stockfish(format!("Failed to spawn Stockfish: {e}")))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| EvalError::Stockfish("Stockfish stdin not captured".into()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| EvalError::Stockfish("Stockfish stdout not captured".into()))?;

        let mut engine = Self {
            process: Some(process),
            stdin: Box::new(stdin),
            stdout: BufReader::new(Box::new(stdout)),
        };
        engine.init(config).await?;
        info!(path = %config.stockfish_path, "Stockfish ready");
        Ok(engine)
    }

    /// Talk UCI over arbitrary streams instead of a child process.
    pub async fn from_io<R, W>(reader: R, writer: W, config: &EngineConfig) -> Result<Self, EvalError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let mut engine = Self {
            process: None,
            stdin: Box::new(writer),
            stdout: BufReader::new(Box::new(reader)),
        };
        engine.init(config).await?;
        Ok(engine)
    }

    async fn init(&mut self, config: &EngineConfig) -> Result<(), EvalError> {
        self.send("uci").await?;
        self.wait_for("uciok").await?;

        self.send(&format!("setoption name Threads value {}", config.threads))
            .await?;
        self.send(&format!("setoption name Hash value {}", config.hash_mb))
            .await?;
        self.send("isready").await?;
        self.wait_for("readyok").await
    }

    /// Clear engine state between games
    pub async fn new_game(&mut self) -> Result<(), EvalError> {
        self.send("ucinewgame").await?;
        self.send("isready").await?;
        self.wait_for("readyok").await
    }

    /// Send a command to Stockfish
    async fn send(&mut self, cmd: &str) -> Result<(), EvalError> {
        debug!(cmd, "SF <");
        self.stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|e| EvalError::Stockfish(format!("Failed to write to Stockfish: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| EvalError::Stockfish(format!("Failed to flush stdin: {e}")))?;
        Ok(())
    }

    async fn read_line(&mut self, line: &mut String) -> Result<(), EvalError> {
        line.clear();
        let n = self
            .stdout
            .read_line(line)
            .await
            .map_err(|e| EvalError::Stockfish(format!("Failed to read from Stockfish: {e}")))?;
        if n == 0 {
            return Err(EvalError::Closed);
        }
        Ok(())
    }

    /// Wait for a specific response line
    async fn wait_for(&mut self, expected: &str) -> Result<(), EvalError> {
        let mut line = String::new();
        loop {
            self.read_line(&mut line).await?;
            let trimmed = line.trim();
            debug!(line = trimmed, "SF >");
            if trimmed == expected {
                return Ok(());
            }
        }
    }

    /// Search a position to `depth` and report the last score before
    /// `bestmove`, normalized to white's point of view.
    ///
    /// A search that ends without any score line reports 0.0.
    pub async fn search(&mut self, fen: &str, depth: u32) -> Result<EvaluationSample, EvalError> {
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go depth {depth}")).await?;

        let flip = black_to_move(fen);
        let mut score = 0.0;
        let mut line = String::new();

        loop {
            self.read_line(&mut line).await?;
            let trimmed = line.trim();

            if let Some(s) = parse_info_score(trimmed) {
                score = s.white_pawns(flip);
            } else if let Some(best_move) = parse_bestmove(trimmed) {
                debug!(line = trimmed, "SF >");
                return Ok(EvaluationSample {
                    fen: fen.to_string(),
                    depth,
                    score,
                    best_move,
                });
            } else if trimmed.starts_with("Unknown command") {
                return Err(EvalError::Protocol(trimmed.to_string()));
            }
        }
    }

    /// Send quit command and wait for process to exit
    pub async fn quit(&mut self) {
        let _ = self.send("quit").await;
        if let Some(process) = self.process.as_mut() {
            let _ = process.wait().await;
        }
    }
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        if let Some(process) = self.process.as_mut() {
            let _ = process.start_kill();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{scripted_engine, Reply};
    use chess_core::{CandidateMove, STANDARD_START_FEN};

    const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";

    #[tokio::test]
    async fn test_handshake_sends_options() {
        let (_engine, mut seen) = scripted_engine(|_, _| Reply::best("e2e4", 20))
            .await
            .unwrap();

        let mut commands = Vec::new();
        while let Ok(cmd) = seen.try_recv() {
            commands.push(cmd);
        }
        assert_eq!(
            commands,
            vec![
                "uci",
                "setoption name Threads value 1",
                "setoption name Hash value 64",
                "isready",
            ]
        );
    }

    #[tokio::test]
    async fn test_search_keeps_last_score() {
        let (mut engine, _seen) = scripted_engine(|_, _| Reply {
            lines: vec![
                "info depth 1 score cp 10 pv e2e4".into(),
                "info depth 8 score cp 42 pv e2e4 e7e5".into(),
                "bestmove e2e4 ponder e7e5".into(),
            ],
        })
        .await
        .unwrap();

        let sample = engine.search(STANDARD_START_FEN, 8).await.unwrap();
        assert_eq!(sample.depth, 8);
        assert_eq!(sample.score, 0.42);
        assert_eq!(sample.best_move, Some("e2e4".parse::<CandidateMove>().unwrap()));
    }

    #[tokio::test]
    async fn test_black_to_move_score_is_flipped() {
        let (mut engine, _seen) = scripted_engine(|_, _| Reply::best("e7e5", 30))
            .await
            .unwrap();

        let sample = engine.search(AFTER_E4, 8).await.unwrap();
        assert_eq!(sample.score, -0.3);
        assert_eq!(sample.fen, AFTER_E4);
    }

    #[tokio::test]
    async fn test_mate_score_saturates() {
        let (mut engine, _seen) = scripted_engine(|_, _| Reply::mate("d8h4", 1))
            .await
            .unwrap();

        // Black mates in one from white's point of view
        let sample = engine.search(AFTER_E4, 8).await.unwrap();
        assert_eq!(sample.score, -crate::uci::MATE_SCORE);
        assert_eq!(sample.best_move, Some("d8h4".parse::<CandidateMove>().unwrap()));
    }

    #[tokio::test]
    async fn test_no_move_available() {
        let (mut engine, _seen) = scripted_engine(|_, _| Reply {
            lines: vec!["info depth 0 score mate 0".into(), "bestmove (none)".into()],
        })
        .await
        .unwrap();

        let sample = engine.search(AFTER_E4, 8).await.unwrap();
        assert_eq!(sample.best_move, None);
        // Black to move and mated
        assert_eq!(sample.score, crate::uci::MATE_SCORE);
    }

    #[tokio::test]
    async fn test_engine_exit_is_an_error() {
        let (mut engine, _seen) = scripted_engine(|_, _| Reply::crash()).await.unwrap();
        assert!(matches!(
            engine.search(STANDARD_START_FEN, 8).await,
            Err(EvalError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_spawn_missing_binary() {
        let config = EngineConfig {
            stockfish_path: "/nonexistent/stockfish".into(),
            ..EngineConfig::default()
        };
        assert!(matches!(
            UciEngine::spawn(&config).await,
            Err(EvalError::Stockfish(_))
        ));
    }
}
