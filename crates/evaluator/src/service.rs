//! Process-wide evaluation service.
//!
//! One engine serves every caller. Each request takes a token from a shared
//! counter; a request that is no longer the newest by the time the engine gets
//! to it is skipped, and its callback is dropped without being called.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use chess_core::EvaluationSample;

use crate::config::EngineConfig;
use crate::engine::UciEngine;
use crate::error::EvalError;

type Callback = Box<dyn FnOnce(EvaluationSample) + Send + 'static>;

/// Identifies one evaluation request. Later requests have larger tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

struct Request {
    token: u64,
    fen: String,
    depth: u32,
    callback: Callback,
}

struct Worker {
    tx: UnboundedSender<Request>,
    task: JoinHandle<()>,
}

impl Worker {
    fn is_alive(&self) -> bool {
        !self.task.is_finished() && !self.tx.is_closed()
    }
}

pub struct EvaluationService {
    config: EngineConfig,
    worker: Mutex<Option<Worker>>,
    latest: Arc<AtomicU64>,
}

impl EvaluationService {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            worker: Mutex::new(None),
            latest: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Spawn the engine if it is not already running and start a new game.
    pub async fn start(&self) -> Result<(), EvalError> {
        let mut worker = self.worker.lock().await;
        if worker.as_ref().is_some_and(Worker::is_alive) {
            return Ok(());
        }
        let engine = UciEngine::spawn(&self.config).await?;
        *worker = Some(self.launch(engine).await?);
        Ok(())
    }

    /// Like [`start`](Self::start) but with an engine the caller connected.
    pub async fn start_with(&self, engine: UciEngine) -> Result<(), EvalError> {
        let mut worker = self.worker.lock().await;
        if worker.as_ref().is_some_and(Worker::is_alive) {
            return Ok(());
        }
        *worker = Some(self.launch(engine).await?);
        Ok(())
    }

    async fn launch(&self, mut engine: UciEngine) -> Result<Worker, EvalError> {
        engine.new_game().await?;
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(engine, rx, Arc::clone(&self.latest)));
        info!("Evaluation service started");
        Ok(Worker { tx, task })
    }

    pub async fn is_running(&self) -> bool {
        self.worker.lock().await.as_ref().is_some_and(Worker::is_alive)
    }

    /// Queue an evaluation of `fen`. The callback runs at most once, and only
    /// if no newer request was made before the result arrived.
    ///
    /// Returns `None` without doing anything when the service is not running.
    pub async fn evaluate<F>(&self, fen: &str, depth: u32, callback: F) -> Option<RequestToken>
    where
        F: FnOnce(EvaluationSample) + Send + 'static,
    {
        let worker = self.worker.lock().await;
        let worker = worker.as_ref().filter(|w| w.is_alive())?;

        let token = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let request = Request {
            token,
            fen: fen.to_string(),
            depth,
            callback: Box::new(callback),
        };
        if worker.tx.send(request).is_err() {
            debug!(token, "Evaluation worker gone; request dropped");
            return None;
        }
        debug!(token, depth, "Evaluation queued");
        Some(RequestToken(token))
    }

    /// The newest token handed out, if any.
    pub fn latest(&self) -> Option<RequestToken> {
        match self.latest.load(Ordering::SeqCst) {
            0 => None,
            n => Some(RequestToken(n)),
        }
    }

    /// Terminate the engine. Pending callbacks are dropped uncalled.
    pub async fn stop(&self) {
        let Some(worker) = self.worker.lock().await.take() else {
            return;
        };
        drop(worker.tx);
        worker.task.abort();
        let _ = worker.task.await;
        info!("Evaluation service stopped");
    }
}

async fn run(mut engine: UciEngine, mut rx: UnboundedReceiver<Request>, latest: Arc<AtomicU64>) {
    while let Some(mut request) = rx.recv().await {
        // Only the newest queued request is worth searching
        while let Ok(newer) = rx.try_recv() {
            debug!(token = request.token, "Evaluation superseded");
            request = newer;
        }
        if request.token != latest.load(Ordering::SeqCst) {
            continue;
        }

        match engine.search(&request.fen, request.depth).await {
            Ok(sample) => {
                if request.token == latest.load(Ordering::SeqCst) {
                    (request.callback)(sample);
                } else {
                    debug!(token = request.token, "Stale evaluation discarded");
                }
            }
            Err(e) => {
                warn!(error = %e, "Engine failed; evaluations disabled until restart");
                return;
            }
        }
    }
    engine.quit().await;
}
