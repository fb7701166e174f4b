// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dx-bridge: request/response bridge to a worker process over stdio.
//!
//! A [`Bridge`] supervises exactly one worker, routes replies back to their
//! callers by correlation id, fans unsolicited events out to subscribers, and
//! keeps at most one request in flight at a time, in submission order.
//!
//! ```ignore
//! let bridge = Bridge::new(CommandSpawner::from_command_line("python3 -u worker.py")?, BridgeConfig::default());
//! bridge.start().await?;
//! let value = bridge.enqueue(WorkerRequest::typed("start_monitoring")).await?;
//! ```

mod actor;
mod error;
mod events;
mod io;
mod spawner;

#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use error::{BridgeError, SpawnError};
pub use events::EventSubscription;
pub use spawner::{
    CommandSpawner, WorkerControl, WorkerOutput, WorkerProcess, WorkerSpawner, WorkerStdin,
};

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeSpawner, FakeWorker, FakeWorkers};

use actor::{Actor, Command};
use dx_core::CorrelationId;
use dx_wire::{WorkerEvent, WorkerRequest};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};

const EXIT_CAPACITY: usize = 16;

/// Bridge tuning.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Spawn a worker on enqueue when none is running.
    pub auto_start: bool,
    /// Unexpected exits tolerated before lazy restarts stop.
    pub max_restarts: u32,
    /// Events buffered per subscriber before the oldest are skipped.
    pub event_capacity: usize,
    /// How long to wait for stdout to drain after exit, and for the worker to
    /// be reaped on shutdown.
    pub drain_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            auto_start: true,
            max_restarts: 5,
            event_capacity: 256,
            drain_timeout: Duration::from_secs(2),
        }
    }
}

impl BridgeConfig {
    dx_core::setters! {
        auto_start: bool,
        max_restarts: u32,
        event_capacity: usize,
        drain_timeout: Duration,
    }
}

/// Identity of a running worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerInfo {
    pub pid: Option<u32>,
    /// Increments on every spawn.
    pub generation: u64,
}

/// A worker that went away without being asked to, either by exiting or
/// by no longer accepting requests on stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    pub generation: u64,
    pub code: Option<i32>,
    /// False once the restart budget is exhausted.
    pub restartable: bool,
}

/// Point-in-time view of the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeStatus {
    pub worker: Option<WorkerInfo>,
    pub pending: Option<CorrelationId>,
    pub queued: usize,
    pub unexpected_exits: u32,
    /// False once the restart budget is exhausted.
    pub available: bool,
}

/// Handle to a bridge actor. Cheap to clone.
///
/// Dropping the last handle shuts the bridge down and kills the worker.
#[derive(Clone)]
pub struct Bridge {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<WorkerEvent>,
    exits: broadcast::Sender<WorkerExit>,
}

impl Bridge {
    /// Create the bridge and its actor task. No worker is spawned until
    /// [`Bridge::start`] or the first enqueue. Must be called inside a Tokio
    /// runtime.
    pub fn new(spawner: impl WorkerSpawner, config: BridgeConfig) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(64);
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (exits, _) = broadcast::channel(EXIT_CAPACITY);
        let actor =
            Actor::new(Arc::new(spawner), config, events.clone(), exits.clone(), commands_rx);
        tokio::spawn(actor.run());
        Self { commands: commands_tx, events, exits }
    }

    /// Spawn the worker if none is running. Idempotent.
    pub async fn start(&self) -> Result<WorkerInfo, BridgeError> {
        self.call(|reply| Command::Start { reply }).await?
    }

    /// Terminate the worker. Pending and queued requests fail with
    /// [`BridgeError::Stopped`]. Idempotent.
    pub async fn stop(&self) {
        let _ = self.call(|reply| Command::Stop { reply }).await;
    }

    /// Queue a request and wait for the worker's reply value.
    ///
    /// Fails with the uniform [`BridgeError::WorkerTerminated`] if the worker
    /// dies first, with [`BridgeError::Transport`] if its stdin breaks, or
    /// immediately on structural unavailability.
    pub async fn enqueue(&self, request: WorkerRequest) -> Result<Value, BridgeError> {
        let (reply, rx) = oneshot::channel();
        let correlation_id = CorrelationId::new();
        self.send(Command::Enqueue { correlation_id, request, reply }).await?;
        rx.await.map_err(|_| BridgeError::ShutDown)?
    }

    /// Like [`Bridge::enqueue`] but gives up after `timeout`.
    ///
    /// Giving up never aborts a request already written to the worker; its
    /// reply is discarded when it arrives. A request still queued is skipped.
    pub async fn enqueue_with_timeout(
        &self,
        request: WorkerRequest,
        timeout: Duration,
    ) -> Result<Value, BridgeError> {
        match tokio::time::timeout(timeout, self.enqueue(request)).await {
            Ok(result) => result,
            Err(_) => Err(BridgeError::Timeout(timeout)),
        }
    }

    /// Subscribe to every unsolicited worker event.
    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription::new(self.events.subscribe(), None)
    }

    /// Subscribe to worker events with the given type tag.
    pub fn subscribe_kind(&self, kind: impl Into<String>) -> EventSubscription {
        EventSubscription::new(self.events.subscribe(), Some(kind.into()))
    }

    /// Subscribe to unexpected worker exits. Explicit stop and shutdown are
    /// not reported.
    pub fn subscribe_exits(&self) -> broadcast::Receiver<WorkerExit> {
        self.exits.subscribe()
    }

    pub async fn status(&self) -> Result<BridgeStatus, BridgeError> {
        self.call(|reply| Command::Status { reply }).await
    }

    /// Kill the worker, reject everything outstanding with
    /// [`BridgeError::ShutDown`] and stop the actor. Later calls fail with
    /// `ShutDown`.
    pub async fn shutdown(&self) {
        let _ = self.call(|reply| Command::Shutdown { reply }).await;
    }

    async fn send(&self, command: Command) -> Result<(), BridgeError> {
        self.commands.send(command).await.map_err(|_| BridgeError::ShutDown)
    }

    async fn call<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, BridgeError> {
        let (reply, rx) = oneshot::channel();
        self.send(command(reply)).await?;
        rx.await.map_err(|_| BridgeError::ShutDown)
    }
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
