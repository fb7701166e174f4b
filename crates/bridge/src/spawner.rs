// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker process creation.
//!
//! The bridge never touches `tokio::process` directly: it asks a
//! [`WorkerSpawner`] for a [`WorkerProcess`], which is just a set of byte
//! streams plus a [`WorkerControl`] for waiting on and killing the process.
//! This keeps the actor testable against in-memory workers.

use crate::error::SpawnError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};

pub type WorkerStdin = Box<dyn AsyncWrite + Send + Unpin>;
pub type WorkerOutput = Box<dyn AsyncRead + Send + Unpin>;

/// Streams and control handle of one running worker.
pub struct WorkerProcess {
    pub pid: Option<u32>,
    pub stdin: WorkerStdin,
    pub stdout: WorkerOutput,
    /// Diagnostic stream; never parsed as protocol.
    pub stderr: Option<WorkerOutput>,
    pub control: Box<dyn WorkerControl>,
}

/// Lifecycle control for a spawned worker.
#[async_trait]
pub trait WorkerControl: Send {
    /// Wait for the worker to exit. Returns the exit code when one exists
    /// (a process killed by a signal has none). Must be cancel-safe.
    async fn wait(&mut self) -> Option<i32>;

    /// Terminate the worker. Idempotent.
    async fn kill(&mut self);
}

/// Extension point for different worker launch strategies.
pub trait WorkerSpawner: Send + Sync + 'static {
    fn spawn(&self) -> Result<WorkerProcess, SpawnError>;
}

/// Spawns the worker as a child process with piped stdio.
#[derive(Debug, Clone)]
pub struct CommandSpawner {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    current_dir: Option<PathBuf>,
}

impl CommandSpawner {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), args: Vec::new(), envs: Vec::new(), current_dir: None }
    }

    /// Build from a whitespace-separated command line such as
    /// `python3 -u py/pose_server.py`.
    pub fn from_command_line(line: &str) -> Result<Self, SpawnError> {
        let mut parts = line.split_whitespace();
        let program = parts.next().ok_or(SpawnError::EmptyCommand)?;
        Ok(Self::new(program).args(parts))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }
}

impl WorkerSpawner for CommandSpawner {
    fn spawn(&self) -> Result<WorkerProcess, SpawnError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn()?;
        let stdin = child.stdin.take().ok_or(SpawnError::MissingPipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(SpawnError::MissingPipe("stdout"))?;
        let stderr = child.stderr.take();

        Ok(WorkerProcess {
            pid: child.id(),
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            stderr: stderr.map(|s| Box::new(s) as WorkerOutput),
            control: Box::new(ChildControl { child }),
        })
    }
}

struct ChildControl {
    child: Child,
}

#[async_trait]
impl WorkerControl for ChildControl {
    async fn wait(&mut self) -> Option<i32> {
        match self.child.wait().await {
            Ok(status) => status.code(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to wait for worker");
                None
            }
        }
    }

    async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::debug!(error = %e, "worker kill failed (already exited?)");
        }
    }
}

#[cfg(test)]
#[path = "spawner_tests.rs"]
mod tests;
