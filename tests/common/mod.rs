//! Shared harness: clients driving `SessionRunner`s over one in-memory relay.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use session::model::{GameId, ParticipantId};
use session::realtime::MemoryRelay;
use session::runner::{LocalInput, SessionEvent, SessionRunner, SessionSummary};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub fn player(n: u128) -> ParticipantId {
    ParticipantId(Uuid::from_u128(n))
}

/// One player's running session.
pub struct Client {
    pub inputs: mpsc::Sender<LocalInput>,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
    pub task: JoinHandle<SessionSummary>,
}

impl Client {
    /// Mount `who` on an existing game and start its loop.
    pub async fn open(relay: &Arc<MemoryRelay>, game_id: GameId, who: ParticipantId) -> Self {
        let (events_tx, events) = mpsc::unbounded_channel();
        let runner = SessionRunner::open(relay.clone(), relay.as_ref(), game_id, who, None, events_tx)
            .await
            .expect("Failed to open session");
        Self::start(runner, events)
    }

    pub fn start(runner: SessionRunner, events: mpsc::UnboundedReceiver<SessionEvent>) -> Self {
        let (inputs, input_rx) = mpsc::channel(16);
        let task = tokio::spawn(runner.run(input_rx));
        Self {
            inputs,
            events,
            task,
        }
    }

    pub async fn send(&self, input: LocalInput) {
        self.inputs.send(input).await.expect("Session loop stopped");
    }

    pub async fn play(&self, uci: &str) {
        self.send(LocalInput::Move(uci.parse().expect("bad test move"))).await;
    }

    /// Wait for the first event matching `pred`, returning it and everything
    /// seen before it.
    pub async fn wait_for<F>(&mut self, mut pred: F) -> (SessionEvent, Vec<SessionEvent>)
    where
        F: FnMut(&SessionEvent) -> bool,
    {
        let mut skipped = Vec::new();
        loop {
            let event = tokio::time::timeout(TIMEOUT, self.events.recv())
                .await
                .expect("Timed out waiting for session event")
                .expect("Event channel closed");
            if pred(&event) {
                return (event, skipped);
            }
            skipped.push(event);
        }
    }

    /// Wait until the move with this SAN has been applied.
    pub async fn wait_for_move(&mut self, san: &str) -> SessionEvent {
        self.wait_for(|e| matches!(e, SessionEvent::MoveApplied { record, .. } if record.san == san))
            .await
            .0
    }

    pub async fn quit(self) -> SessionSummary {
        let _ = self.inputs.send(LocalInput::Quit).await;
        self.finish().await
    }

    /// Await the loop's own end.
    pub async fn finish(self) -> SessionSummary {
        tokio::time::timeout(TIMEOUT, self.task)
            .await
            .expect("Session did not end")
            .expect("Session task panicked")
    }
}
