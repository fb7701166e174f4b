// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Resolve state directory: DX_STATE_DIR > XDG_STATE_HOME/dx > ~/.local/state/dx
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("DX_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("dx"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/dx"))
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

fn millis(key: &str) -> Option<Duration> {
    std::env::var(key).ok().and_then(|s| s.parse::<u64>().ok()).map(Duration::from_millis)
}

/// Server WebSocket URL
pub fn server_url() -> Option<String> {
    non_empty("DX_SERVER_URL")
}

/// API key presented on the link handshake
pub fn api_key() -> Option<String> {
    non_empty("DX_API_KEY")
}

/// Worker command line, split on whitespace
pub fn worker_cmd() -> Option<String> {
    non_empty("DX_WORKER_CMD")
}

pub fn room_code() -> Option<String> {
    non_empty("DX_ROOM_CODE")
}

/// Periodic flush interval
pub fn flush_interval() -> Option<Duration> {
    millis("DX_FLUSH_INTERVAL_MS")
}

pub fn flush_chunk_size() -> Option<usize> {
    std::env::var("DX_FLUSH_CHUNK_SIZE").ok().and_then(|s| s.parse::<usize>().ok())
}

/// Ack deadline for single-record posts
pub fn ack_timeout() -> Option<Duration> {
    millis("DX_ACK_TIMEOUT_MS")
}

/// Ack deadline for one bulk flush chunk
pub fn bulk_timeout() -> Option<Duration> {
    millis("DX_BULK_TIMEOUT_MS")
}

/// Log filter directive; falls back to `RUST_LOG`, then `info`.
pub fn log_filter() -> String {
    non_empty("DX_LOG").or_else(|| non_empty("RUST_LOG")).unwrap_or_else(|| "info".to_string())
}
