// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The bridge actor.
//!
//! One task owns the worker handle, the pending request and the FIFO of
//! waiting requests. Callers reach it through [`Command`]s; worker tasks
//! reach it through [`Signal`]s. Nothing else touches this state.

use crate::error::BridgeError;
use crate::io::{self, Outbound, Signal};
use crate::spawner::WorkerSpawner;
use crate::{BridgeConfig, BridgeStatus, WorkerExit, WorkerInfo};
use dx_core::CorrelationId;
use dx_wire::{encode_request, Inbound, WorkerEvent, WorkerRequest};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};

pub(crate) type Reply = oneshot::Sender<Result<Value, BridgeError>>;

pub(crate) enum Command {
    Start { reply: oneshot::Sender<Result<WorkerInfo, BridgeError>> },
    Stop { reply: oneshot::Sender<()> },
    Enqueue { correlation_id: CorrelationId, request: WorkerRequest, reply: Reply },
    Status { reply: oneshot::Sender<BridgeStatus> },
    Shutdown { reply: oneshot::Sender<()> },
}

struct Worker {
    generation: u64,
    pid: Option<u32>,
    stdin: mpsc::UnboundedSender<Outbound>,
    kill: Option<oneshot::Sender<()>>,
}

impl Worker {
    fn info(&self) -> WorkerInfo {
        WorkerInfo { pid: self.pid, generation: self.generation }
    }

    fn kill(&mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }
}

struct Pending {
    correlation_id: CorrelationId,
    reply: Reply,
}

struct Queued {
    correlation_id: CorrelationId,
    request: WorkerRequest,
    reply: Reply,
}

pub(crate) struct Actor {
    spawner: Arc<dyn WorkerSpawner>,
    config: BridgeConfig,
    worker: Option<Worker>,
    pending: Option<Pending>,
    waiting: VecDeque<Queued>,
    generation: u64,
    unexpected_exits: u32,
    exhausted: bool,
    events: broadcast::Sender<WorkerEvent>,
    exits: broadcast::Sender<WorkerExit>,
    signal_tx: mpsc::UnboundedSender<Signal>,
    signal_rx: mpsc::UnboundedReceiver<Signal>,
    commands: mpsc::Receiver<Command>,
}

impl Actor {
    pub(crate) fn new(
        spawner: Arc<dyn WorkerSpawner>,
        config: BridgeConfig,
        events: broadcast::Sender<WorkerEvent>,
        exits: broadcast::Sender<WorkerExit>,
        commands: mpsc::Receiver<Command>,
    ) -> Self {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        Self {
            spawner,
            config,
            worker: None,
            pending: None,
            waiting: VecDeque::new(),
            generation: 0,
            unexpected_exits: 0,
            exhausted: false,
            events,
            exits,
            signal_tx,
            signal_rx,
            commands,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.shutdown().await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle(command),
                    None => {
                        // Every handle dropped
                        self.shutdown().await;
                        break;
                    }
                },
                Some(signal) = self.signal_rx.recv() => self.on_signal(signal),
            }
        }
        tracing::debug!("bridge actor stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Start { reply } => {
                let _ = reply.send(self.start());
            }
            Command::Stop { reply } => {
                self.stop();
                let _ = reply.send(());
            }
            Command::Enqueue { correlation_id, request, reply } => {
                self.enqueue(Queued { correlation_id, request, reply });
            }
            Command::Status { reply } => {
                let _ = reply.send(self.status());
            }
            // Handled in `run`
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn start(&mut self) -> Result<WorkerInfo, BridgeError> {
        if let Some(worker) = &self.worker {
            return Ok(worker.info());
        }
        // Explicit start resets the restart budget
        self.unexpected_exits = 0;
        self.exhausted = false;
        let info = self.spawn_worker()?;
        self.dispatch();
        Ok(info)
    }

    fn stop(&mut self) {
        let Some(mut worker) = self.worker.take() else {
            return;
        };
        tracing::info!(generation = worker.generation, "stopping worker");
        worker.kill();
        self.reject_all(|| BridgeError::Stopped);
    }

    fn enqueue(&mut self, queued: Queued) {
        if self.worker.is_none() {
            if self.exhausted {
                let _ = queued
                    .reply
                    .send(Err(BridgeError::RestartBudgetExhausted { exits: self.unexpected_exits }));
                return;
            }
            if self.config.auto_start {
                if let Err(e) = self.spawn_worker() {
                    let _ = queued.reply.send(Err(e));
                    return;
                }
            }
        }
        tracing::debug!(
            correlation_id = %queued.correlation_id,
            kind = queued.request.kind().unwrap_or(""),
            queued = self.waiting.len(),
            "request queued"
        );
        self.waiting.push_back(queued);
        self.dispatch();
    }

    fn status(&self) -> BridgeStatus {
        BridgeStatus {
            worker: self.worker.as_ref().map(Worker::info),
            pending: self.pending.as_ref().map(|p| p.correlation_id.clone()),
            queued: self.waiting.len(),
            unexpected_exits: self.unexpected_exits,
            available: !self.exhausted,
        }
    }

    async fn shutdown(&mut self) {
        let generation = self.worker.as_ref().map(|w| w.generation);
        if let Some(mut worker) = self.worker.take() {
            worker.kill();
        }
        self.reject_all(|| BridgeError::ShutDown);

        // Give the worker a moment to be reaped so shutdown leaves no process behind
        if let Some(generation) = generation {
            let signals = &mut self.signal_rx;
            let reaped = async move {
                while let Some(signal) = signals.recv().await {
                    if matches!(signal, Signal::Exited { generation: g, .. } if g == generation) {
                        return;
                    }
                }
            };
            if tokio::time::timeout(self.config.drain_timeout, reaped).await.is_err() {
                tracing::warn!(generation, "worker not reaped before shutdown completed");
            }
        }
        tracing::info!("bridge shut down");
    }

    fn spawn_worker(&mut self) -> Result<WorkerInfo, BridgeError> {
        let process = self.spawner.spawn().map_err(|e| {
            tracing::error!(error = %e, "worker spawn failed");
            BridgeError::Spawn(e.to_string())
        })?;
        self.generation += 1;
        let generation = self.generation;

        let (stdin_tx, stdin_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = oneshot::channel();
        io::spawn_writer(generation, process.stdin, stdin_rx, self.signal_tx.clone());
        let reader = io::spawn_reader(generation, process.stdout, self.signal_tx.clone());
        if let Some(stderr) = process.stderr {
            io::spawn_stderr(generation, stderr);
        }
        io::spawn_supervisor(
            generation,
            process.control,
            kill_rx,
            reader,
            self.config.drain_timeout,
            self.signal_tx.clone(),
        );

        let worker =
            Worker { generation, pid: process.pid, stdin: stdin_tx, kill: Some(kill_tx) };
        let info = worker.info();
        tracing::info!(generation, pid = ?info.pid, "worker started");
        self.worker = Some(worker);
        Ok(info)
    }

    /// Send the head of the queue if the worker is up and nothing is in flight.
    fn dispatch(&mut self) {
        if self.pending.is_some() {
            return;
        }
        let Some(worker) = &self.worker else {
            return;
        };
        let generation = worker.generation;

        while let Some(next) = self.waiting.pop_front() {
            if next.reply.is_closed() {
                tracing::debug!(correlation_id = %next.correlation_id, "caller gone, skipping request");
                continue;
            }
            let line = match encode_request(&next.correlation_id, &next.request) {
                Ok(line) => line,
                Err(e) => {
                    let _ = next.reply.send(Err(e.into()));
                    continue;
                }
            };
            let outbound = Outbound { correlation_id: next.correlation_id.clone(), line };
            if worker.stdin.send(outbound).is_err() {
                // Writer already gave up on this worker
                self.waiting.push_front(next);
                self.on_write_failed(generation, "worker stdin closed".to_string());
                return;
            }
            tracing::debug!(correlation_id = %next.correlation_id, "request dispatched");
            self.pending = Some(Pending { correlation_id: next.correlation_id, reply: next.reply });
            return;
        }
    }

    fn on_signal(&mut self, signal: Signal) {
        let current = self.worker.as_ref().map(|w| w.generation);
        match signal {
            Signal::Frame { generation, inbound } if Some(generation) == current => {
                self.route(inbound);
            }
            Signal::WriteFailed { generation, correlation_id, error }
                if Some(generation) == current =>
            {
                tracing::debug!(%correlation_id, "request not delivered");
                self.on_write_failed(generation, error);
            }
            Signal::Exited { generation, code } if Some(generation) == current => {
                self.on_exit(generation, code);
            }
            Signal::Frame { generation, .. }
            | Signal::WriteFailed { generation, .. }
            | Signal::Exited { generation, .. } => {
                tracing::trace!(generation, "ignoring signal from previous worker");
            }
        }
    }

    fn route(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Reply { correlation_id, value, event } => {
                let matches =
                    self.pending.as_ref().is_some_and(|p| p.correlation_id == correlation_id);
                if matches {
                    if let Some(pending) = self.pending.take() {
                        if pending.reply.send(Ok(value)).is_err() {
                            tracing::debug!(%correlation_id, "late reply, caller gave up");
                        }
                    }
                    self.dispatch();
                } else if let Some(event) = event {
                    self.emit(event);
                } else {
                    tracing::debug!(%correlation_id, "dropping unmatched reply");
                }
            }
            Inbound::Event(event) => self.emit(event),
            Inbound::Untagged(value) => {
                tracing::info!(target: "worker.stdout", %value, "untagged worker message");
            }
            Inbound::Unparsable { error } => {
                tracing::warn!(%error, "dropping unparsable worker frame");
            }
        }
    }

    fn emit(&self, event: WorkerEvent) {
        tracing::trace!(kind = event.kind(), "worker event");
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn on_exit(&mut self, generation: u64, code: Option<i32>) {
        self.worker = None;
        tracing::warn!(generation, ?code, "worker exited");
        self.retire(generation, code, || BridgeError::WorkerTerminated { code });
    }

    /// A worker that cannot take requests is as good as dead: kill it so
    /// nothing waits on replies it will never get, and restart lazily.
    fn on_write_failed(&mut self, generation: u64, error: String) {
        if let Some(mut worker) = self.worker.take() {
            worker.kill();
        }
        tracing::warn!(generation, %error, "worker stdin failed, killing worker");
        self.retire(generation, None, || BridgeError::Transport(error.clone()));
    }

    fn retire(&mut self, generation: u64, code: Option<i32>, error: impl Fn() -> BridgeError) {
        self.unexpected_exits += 1;
        self.reject_all(error);

        if self.unexpected_exits > self.config.max_restarts {
            tracing::error!(
                exits = self.unexpected_exits,
                max_restarts = self.config.max_restarts,
                "worker restart budget exhausted"
            );
            self.exhausted = true;
        }
        // No subscribers is fine
        let _ = self.exits.send(WorkerExit { generation, code, restartable: !self.exhausted });
    }

    fn reject_all(&mut self, error: impl Fn() -> BridgeError) {
        if let Some(pending) = self.pending.take() {
            let _ = pending.reply.send(Err(error()));
        }
        for queued in self.waiting.drain(..) {
            let _ = queued.reply.send(Err(error()));
        }
    }
}
