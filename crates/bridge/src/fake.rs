// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory worker for tests.
//!
//! [`FakeSpawner`] hands the bridge duplex pipes instead of a child process
//! and sends the other ends to the test as a [`FakeWorker`], which can read
//! the requests the bridge wrote, reply, emit events and exit.

use crate::error::SpawnError;
use crate::spawner::{WorkerControl, WorkerProcess, WorkerSpawner};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::sync::{mpsc, oneshot};

const PIPE_CAPACITY: usize = 64 * 1024;

struct FakeSpawnerState {
    spawned: u32,
    failures: VecDeque<String>,
}

/// Spawner producing [`FakeWorker`]s.
#[derive(Clone)]
pub struct FakeSpawner {
    inner: Arc<Mutex<FakeSpawnerState>>,
    workers: mpsc::UnboundedSender<FakeWorker>,
}

/// Receives each worker the bridge spawns, in spawn order.
pub struct FakeWorkers {
    rx: mpsc::UnboundedReceiver<FakeWorker>,
}

impl FakeWorkers {
    pub async fn next(&mut self) -> Option<FakeWorker> {
        self.rx.recv().await
    }

    /// A worker spawned so far but not yet taken, if any.
    pub fn try_next(&mut self) -> Option<FakeWorker> {
        self.rx.try_recv().ok()
    }
}

impl FakeSpawner {
    pub fn new() -> (Self, FakeWorkers) {
        let (workers, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Mutex::new(FakeSpawnerState { spawned: 0, failures: VecDeque::new() }));
        (Self { inner, workers }, FakeWorkers { rx })
    }

    /// Make the next spawn attempt fail.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.inner.lock().failures.push_back(message.into());
    }

    /// Number of successful spawns.
    pub fn spawned(&self) -> u32 {
        self.inner.lock().spawned
    }
}

impl WorkerSpawner for FakeSpawner {
    fn spawn(&self) -> Result<WorkerProcess, SpawnError> {
        let pid = {
            let mut state = self.inner.lock();
            if let Some(message) = state.failures.pop_front() {
                return Err(SpawnError::Other(message));
            }
            state.spawned += 1;
            1000 + state.spawned
        };

        let (stdin, stdin_peer) = tokio::io::duplex(PIPE_CAPACITY);
        let (stdout, stdout_peer) = tokio::io::duplex(PIPE_CAPACITY);
        let (stderr, stderr_peer) = tokio::io::duplex(PIPE_CAPACITY);
        let (exit_tx, exit_rx) = oneshot::channel();
        let killed = Arc::new(AtomicBool::new(false));

        let worker = FakeWorker {
            pid,
            requests: Some(BufReader::new(stdin_peer).lines()),
            stdout: stdout_peer,
            stderr: stderr_peer,
            exit: Some(exit_tx),
            killed: Arc::clone(&killed),
        };
        self.workers.send(worker).map_err(|_| SpawnError::Other("test dropped FakeWorkers".into()))?;

        Ok(WorkerProcess {
            pid: Some(pid),
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            stderr: Some(Box::new(stderr)),
            control: Box::new(FakeControl { exit: Some(exit_rx), killed, code: None }),
        })
    }
}

struct FakeControl {
    exit: Option<oneshot::Receiver<Option<i32>>>,
    killed: Arc<AtomicBool>,
    code: Option<Option<i32>>,
}

#[async_trait]
impl WorkerControl for FakeControl {
    async fn wait(&mut self) -> Option<i32> {
        if let Some(code) = self.code {
            return code;
        }
        // Dropping the FakeWorker counts as exiting without a code
        let code = match self.exit.as_mut() {
            Some(rx) => rx.await.unwrap_or(None),
            None => None,
        };
        self.exit = None;
        self.code = Some(code);
        code
    }

    async fn kill(&mut self) {
        self.killed.store(true, Ordering::SeqCst);
        self.code.get_or_insert(None);
    }
}

/// Test side of a spawned fake worker.
pub struct FakeWorker {
    pid: u32,
    requests: Option<Lines<BufReader<DuplexStream>>>,
    stdout: DuplexStream,
    stderr: DuplexStream,
    exit: Option<oneshot::Sender<Option<i32>>>,
    killed: Arc<AtomicBool>,
}

impl FakeWorker {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Next request line written by the bridge, parsed. `None` once the
    /// bridge closed stdin.
    pub async fn next_request(&mut self) -> Option<Value> {
        let line = self.requests.as_mut()?.next_line().await.ok()??;
        serde_json::from_str(&line).ok()
    }

    /// Like [`FakeWorker::next_request`] but returns `None` if nothing arrives
    /// within `within`.
    pub async fn request_within(&mut self, within: Duration) -> Option<Value> {
        tokio::time::timeout(within, self.next_request()).await.ok().flatten()
    }

    /// Reply to a request with `{"correlationId": id, "value": value}`.
    pub async fn reply(&mut self, correlation_id: &str, value: Value) {
        let frame = serde_json::json!({ "correlationId": correlation_id, "value": value });
        self.send_line(&frame.to_string()).await;
    }

    /// Reply to the request just read, echoing its correlation id.
    pub async fn reply_to(&mut self, request: &Value, value: Value) {
        let id = request.get("correlationId").and_then(Value::as_str).unwrap_or_default();
        self.reply(id, value).await;
    }

    /// Write an unsolicited event; `event` must carry a `type` field.
    pub async fn emit(&mut self, event: Value) {
        self.send_line(&event.to_string()).await;
    }

    /// Write a raw line to stdout.
    pub async fn send_line(&mut self, line: &str) {
        let _ = self.stdout.write_all(line.as_bytes()).await;
        let _ = self.stdout.write_all(b"\n").await;
        let _ = self.stdout.flush().await;
    }

    pub async fn write_stderr(&mut self, line: &str) {
        let _ = self.stderr.write_all(line.as_bytes()).await;
        let _ = self.stderr.write_all(b"\n").await;
    }

    /// Stop reading stdin without exiting, so the bridge's next write fails.
    pub fn close_stdin(&mut self) {
        self.requests = None;
    }

    /// Close stdout and exit with `code`.
    pub fn exit(mut self, code: Option<i32>) {
        if let Some(exit) = self.exit.take() {
            let _ = exit.send(code);
        }
    }

    /// True once the bridge killed this worker.
    pub fn was_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }
}
