// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use dx_wire::ProtocolError;
use std::time::Duration;
use thiserror::Error;

/// Errors returned to callers of the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to spawn worker: {0}")]
    Spawn(String),
    #[error("worker restart budget exhausted after {exits} unexpected exits")]
    RestartBudgetExhausted { exits: u32 },
    #[error("worker terminated (exit code: {code:?})")]
    WorkerTerminated { code: Option<i32> },
    #[error("worker was stopped")]
    Stopped,
    #[error("bridge is shut down")]
    ShutDown,
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to write to worker: {0}")]
    Transport(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl BridgeError {
    /// True when the bridge cannot serve requests until an explicit
    /// `start()`, as opposed to a failure of one request.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Spawn(_) | Self::RestartBudgetExhausted { .. } | Self::ShutDown)
    }
}

/// Failure to launch a worker process.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to spawn process: {0}")]
    Io(#[from] std::io::Error),
    #[error("worker command is empty")]
    EmptyCommand,
    #[error("worker process has no {0} pipe")]
    MissingPipe(&'static str),
    #[error("spawn failed: {0}")]
    Other(String),
}
