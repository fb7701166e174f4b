// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client lifecycle management: configuration, startup, shutdown.

mod startup;
pub use startup::{startup, StartupResult};

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

/// Client configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/dx)
    pub state_dir: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to client log file
    pub log_path: PathBuf,
    /// Path to the persisted client identity
    pub identity_path: PathBuf,
    /// Optional settings file
    pub config_path: PathBuf,
    /// Root of the local store (`monitor-logs/` and `videos/` live here)
    pub store_root: PathBuf,
    pub server_url: String,
    pub api_key: Option<String>,
    /// Worker command line, split on whitespace
    pub worker_cmd: String,
    pub room_code: String,
    pub flush_interval: Duration,
    pub flush_chunk_size: usize,
    pub ack_timeout: Duration,
    pub bulk_timeout: Duration,
    /// Monitoring aggregation window
    pub window: Duration,
    pub max_restarts: u32,
}

/// `<state_dir>/config.toml`. Every key is optional; environment variables
/// win over the file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub server_url: Option<String>,
    pub api_key: Option<String>,
    pub worker_cmd: Option<String>,
    pub room_code: Option<String>,
    pub flush_interval_ms: Option<u64>,
    pub flush_chunk_size: Option<usize>,
    pub ack_timeout_ms: Option<u64>,
    pub bulk_timeout_ms: Option<u64>,
    pub window_ms: Option<u64>,
    pub max_restarts: Option<u32>,
}

impl ConfigFile {
    /// Read the file at `path`; a missing file is an empty config.
    pub fn read(path: &Path) -> Result<Self, LifecycleError> {
        match std::fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text).map_err(|e| LifecycleError::Config {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Overlay `DX_*` environment variables.
    fn with_env(mut self) -> Self {
        let ms = |d: Duration| u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
        self.server_url = crate::env::server_url().or(self.server_url);
        self.api_key = crate::env::api_key().or(self.api_key);
        self.worker_cmd = crate::env::worker_cmd().or(self.worker_cmd);
        self.room_code = crate::env::room_code().or(self.room_code);
        self.flush_interval_ms = crate::env::flush_interval().map(ms).or(self.flush_interval_ms);
        self.flush_chunk_size = crate::env::flush_chunk_size().or(self.flush_chunk_size);
        self.ack_timeout_ms = crate::env::ack_timeout().map(ms).or(self.ack_timeout_ms);
        self.bulk_timeout_ms = crate::env::bulk_timeout().map(ms).or(self.bulk_timeout_ms);
        self
    }
}

pub const DEFAULT_WORKER_CMD: &str = "python3 -u py/monitor_server.py";
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

impl Config {
    /// Load configuration from the state directory, the optional config
    /// file, and the environment.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = crate::env::state_dir()?;
        let file = ConfigFile::read(&state_dir.join("config.toml"))?.with_env();
        Self::resolve(state_dir, file)
    }

    /// Derive paths from `state_dir` and fill defaults for unset keys.
    pub fn resolve(state_dir: PathBuf, file: ConfigFile) -> Result<Self, LifecycleError> {
        let server_url = file.server_url.ok_or(LifecycleError::MissingSetting("server_url"))?;
        let ms = Duration::from_millis;
        Ok(Self {
            lock_path: state_dir.join("client.pid"),
            log_path: state_dir.join("client.log"),
            identity_path: state_dir.join("client_uuid.json"),
            config_path: state_dir.join("config.toml"),
            store_root: state_dir.clone(),
            state_dir,
            server_url,
            api_key: file.api_key,
            worker_cmd: file.worker_cmd.unwrap_or_else(|| DEFAULT_WORKER_CMD.to_string()),
            room_code: file.room_code.unwrap_or_default(),
            flush_interval: file.flush_interval_ms.map(ms).unwrap_or(DEFAULT_FLUSH_INTERVAL),
            flush_chunk_size: file.flush_chunk_size.unwrap_or(dx_engine::DEFAULT_CHUNK_SIZE),
            ack_timeout: file.ack_timeout_ms.map(ms).unwrap_or(Duration::from_secs(10)),
            bulk_timeout: file.bulk_timeout_ms.map(ms).unwrap_or(dx_engine::DEFAULT_BULK_TIMEOUT),
            window: file.window_ms.map(ms).unwrap_or(dx_engine::monitor::DEFAULT_WINDOW),
            max_restarts: file.max_restarts.unwrap_or(5),
        })
    }
}

/// Client state held for the lifetime of the process.
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// Persistent client identity
    pub client_uuid: String,
}

impl DaemonState {
    /// Release process-level resources. The runtime has already stopped
    /// the worker by the time this runs.
    pub fn shutdown(&mut self) -> Result<(), LifecycleError> {
        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }
        // Lock file is released when self.lock_file is dropped
        info!("client shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: client already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),

    #[error("Invalid config file {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("Identity error: {0}")]
    Identity(#[from] crate::identity::IdentityError),

    #[error("Store error: {0}")]
    Store(#[from] dx_storage::StoreError),

    #[error("Worker command error: {0}")]
    Worker(#[from] dx_bridge::SpawnError),

    #[error("Upload client error: {0}")]
    Upload(#[from] dx_adapters::UploadError),

    #[error("Logging error: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
