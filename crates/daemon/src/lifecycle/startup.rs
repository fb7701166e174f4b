// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client startup and initialization logic.

use std::io::Write;

use dx_adapters::{HttpUploader, LinkConfig, ServerEvent, WsLink};
use dx_bridge::{Bridge, BridgeConfig, CommandSpawner};
use dx_engine::{Evidence, EvidenceUploader, MonitorConfig, MonitorWindow, OfflineQueue};
use dx_storage::FsLocalStore;
use fs2::FileExt;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{Config, DaemonState, LifecycleError};
use crate::identity;
use crate::runtime::{Runtime, RuntimeSettings};

/// Production runtime with concrete adapter types
pub type ClientRuntime = Runtime<WsLink, FsLocalStore, HttpUploader>;

/// Result of startup: process state plus the runtime to drive.
pub struct StartupResult {
    pub daemon: DaemonState,
    pub runtime: ClientRuntime,
    /// Server pushes (upload requests) for the runtime loop
    pub server_events: mpsc::Receiver<ServerEvent>,
}

/// Start the client
pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    match startup_inner(config).await {
        Ok(result) => Ok(result),
        Err(e) => {
            // The PID file belongs to the running client when locking failed
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

async fn startup_inner(config: &Config) -> Result<StartupResult, LifecycleError> {
    // 1. Create state directory
    std::fs::create_dir_all(&config.state_dir)?;

    // 2. Acquire lock file FIRST
    let lock_file = acquire_lock(config)?;

    // 3. Identity and local store
    let client_uuid = identity::get_or_create_uuid(&config.identity_path)?;
    let store = FsLocalStore::open(&config.store_root).await?;
    let evidence = Evidence::new(store);
    match evidence.hydrate_from_disk().await {
        Ok(bound) => info!(bound, "rehydrated evidence bindings"),
        Err(e) => warn!(error = %e, "failed to rehydrate evidence bindings"),
    }

    // 4. Worker bridge, started eagerly
    let spawner = CommandSpawner::from_command_line(&config.worker_cmd)?;
    let bridge = Bridge::new(spawner, BridgeConfig::default().max_restarts(config.max_restarts));
    match bridge.start().await {
        Ok(worker) => info!(pid = ?worker.pid, cmd = %config.worker_cmd, "worker started"),
        // Lazy restart on the first request covers a worker that fails now
        Err(e) => warn!(error = %e, cmd = %config.worker_cmd, "worker failed to start"),
    }

    // 5. Server link
    let mut link_config = LinkConfig::new(&config.server_url, &client_uuid)
        .ack_timeout(config.ack_timeout);
    if let Some(key) = &config.api_key {
        link_config = link_config.api_key(key);
    }
    let (link, server_events) = WsLink::connect(link_config);

    let queue = OfflineQueue::new(link, evidence.clone());
    let uploader = EvidenceUploader::new(evidence, HttpUploader::new()?);
    let window = MonitorWindow::new(MonitorConfig::new(&config.room_code).window(config.window));
    let settings = RuntimeSettings {
        flush_interval: config.flush_interval,
        chunk_size: config.flush_chunk_size,
        bulk_timeout: config.bulk_timeout,
        ..RuntimeSettings::default()
    };
    let runtime = Runtime::new(bridge, queue, uploader, window, settings);

    info!(client_uuid = %client_uuid, state_dir = %config.state_dir.display(), "client started");
    Ok(StartupResult {
        daemon: DaemonState { config: config.clone(), lock_file, client_uuid },
        runtime,
        server_events,
    })
}

/// Take the exclusive lock and record our PID in it.
pub(crate) fn acquire_lock(config: &Config) -> Result<std::fs::File, LifecycleError> {
    // Open without truncating so a running client's PID survives a failed attempt
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;

    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    Ok(lock_file)
}

fn cleanup_on_failure(config: &Config) {
    if config.lock_path.exists() {
        if let Err(e) = std::fs::remove_file(&config.lock_path) {
            warn!("Failed to remove PID file: {}", e);
        }
    }
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
