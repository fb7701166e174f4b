// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Main client loop.
//!
//! Worker monitoring samples are aggregated into windows and submitted to
//! the offline queue; server upload requests go to the evidence uploader;
//! queued records are flushed on reconnect and on a timer.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dx_adapters::{RemoteLink, ServerEvent, UploadClient};
use dx_bridge::Bridge;
use dx_core::{Clock, SystemClock};
use dx_engine::{EvidenceUploader, MonitorWindow, OfflineQueue};
use dx_storage::LocalStore;
use dx_wire::WorkerRequest;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Request asking the worker to begin emitting samples.
pub const START_MONITORING: &str = "start_monitoring";
/// Request asking the worker to stop emitting samples.
pub const STOP_MONITORING: &str = "stop_monitoring";

/// Timers reject a zero period.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Loop timing.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    /// Periodic flush of queued records
    pub flush_interval: Duration,
    pub chunk_size: usize,
    pub bulk_timeout: Duration,
    /// How often the open monitoring window is checked
    pub window_tick: Duration,
    /// Minimum spacing between latency probes
    pub probe_interval: Duration,
    /// Latency recorded for a failed probe
    pub probe_max: Duration,
    /// Deadline for start/stop requests to the worker
    pub control_timeout: Duration,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(30),
            chunk_size: dx_engine::DEFAULT_CHUNK_SIZE,
            bulk_timeout: dx_engine::DEFAULT_BULK_TIMEOUT,
            window_tick: Duration::from_millis(250),
            probe_interval: Duration::from_secs(3),
            probe_max: Duration::from_millis(9999),
            control_timeout: Duration::from_secs(10),
        }
    }
}

pub struct Runtime<L, S, U, C = SystemClock>
where
    L: RemoteLink,
    S: LocalStore,
    U: UploadClient,
    C: Clock,
{
    bridge: Bridge,
    queue: OfflineQueue<L, S>,
    uploader: Arc<EvidenceUploader<S, U>>,
    window: MonitorWindow<C>,
    settings: RuntimeSettings,
    latency: Arc<watch::Sender<Duration>>,
}

impl<L, S, U, C> Runtime<L, S, U, C>
where
    L: RemoteLink,
    S: LocalStore,
    U: UploadClient,
    C: Clock,
{
    pub fn new(
        bridge: Bridge,
        queue: OfflineQueue<L, S>,
        uploader: EvidenceUploader<S, U>,
        window: MonitorWindow<C>,
        settings: RuntimeSettings,
    ) -> Self {
        let latency = Arc::new(watch::channel(Duration::ZERO).0);
        Self { bridge, queue, uploader: Arc::new(uploader), window, settings, latency }
    }

    /// Most recent link latency measurement.
    pub fn latency(&self) -> watch::Receiver<Duration> {
        self.latency.subscribe()
    }

    /// Run until `shutdown` resolves, then stop monitoring, submit the last
    /// partial window, and shut the bridge down.
    pub async fn run(
        mut self,
        mut server_events: mpsc::Receiver<ServerEvent>,
        shutdown: impl Future<Output = ()>,
    ) {
        let mut worker_events = self.bridge.subscribe();
        let mut worker_exits = self.bridge.subscribe_exits();
        let mut exits_open = true;
        self.begin_monitoring();

        let mut connected = self.queue.link().watch_connected();
        let mut link_watch_open = true;
        let mut flush_timer = tokio::time::interval(self.settings.flush_interval.max(MIN_PERIOD));
        flush_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut window_tick = tokio::time::interval(self.settings.window_tick.max(MIN_PERIOD));
        window_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let probe = tokio::spawn(probe_latency(
            self.queue.link().clone(),
            self.settings.probe_interval,
            self.settings.probe_max,
            Arc::clone(&self.latency),
        ));

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                Some(event) = worker_events.recv() => {
                    self.window.observe(&event);
                }
                exit = worker_exits.recv(), if exits_open => match exit {
                    Ok(exit) if exit.restartable => {
                        warn!(
                            generation = exit.generation,
                            code = ?exit.code,
                            "worker lost, restarting monitoring"
                        );
                        self.begin_monitoring();
                    }
                    Ok(exit) => {
                        let generation = exit.generation;
                        warn!(generation, "worker lost and will not be restarted");
                    }
                    Err(RecvError::Lagged(_)) => self.begin_monitoring(),
                    Err(RecvError::Closed) => exits_open = false,
                },
                _ = window_tick.tick() => {
                    if self.window.is_due() {
                        self.spawn_submit();
                    }
                }
                Some(event) = server_events.recv() => self.on_server_event(event),
                changed = connected.changed(), if link_watch_open => match changed {
                    Ok(()) => {
                        if *connected.borrow_and_update() {
                            info!("server link up, flushing queued logs");
                            self.spawn_flush();
                        }
                    }
                    Err(_) => link_watch_open = false,
                },
                _ = flush_timer.tick() => self.spawn_flush(),
            }
        }

        probe.abort();
        self.finish().await;
    }

    fn begin_monitoring(&self) {
        let bridge = self.bridge.clone();
        let timeout = self.settings.control_timeout;
        tokio::spawn(async move {
            match bridge.enqueue_with_timeout(WorkerRequest::typed(START_MONITORING), timeout).await {
                Ok(reply) => info!(?reply, "monitoring started"),
                Err(e) => warn!(error = %e, "worker did not start monitoring"),
            }
        });
    }

    /// Close the due window and submit it off the loop; an offline submit
    /// waits on the disk and must not hold up events.
    fn spawn_submit(&mut self) {
        if let Some(record) = self.window.close() {
            let queue = self.queue.clone();
            tokio::spawn(async move {
                let tx = record.transaction_id.clone();
                let outcome = queue.submit(record).await;
                debug!(transaction_id = %tx, ?outcome, "monitoring window submitted");
            });
        }
    }

    fn on_server_event(&self, event: ServerEvent) {
        match event {
            ServerEvent::UploadRequested(request) => {
                let uploader = Arc::clone(&self.uploader);
                tokio::spawn(async move {
                    uploader.handle_upload_request(&request).await;
                });
            }
            ServerEvent::Other { event, .. } => debug!(%event, "ignoring server event"),
        }
    }

    fn spawn_flush(&self) {
        if !self.queue.link().is_connected() {
            return;
        }
        let queue = self.queue.clone();
        let (chunk_size, timeout) = (self.settings.chunk_size, self.settings.bulk_timeout);
        tokio::spawn(async move {
            queue.flush(chunk_size, timeout).await;
        });
    }

    async fn finish(mut self) {
        if let Some(record) = self.window.close() {
            let tx = record.transaction_id.clone();
            let outcome = self.queue.submit(record).await;
            debug!(transaction_id = %tx, ?outcome, "last monitoring window submitted");
        }
        match self
            .bridge
            .enqueue_with_timeout(WorkerRequest::typed(STOP_MONITORING), self.settings.control_timeout)
            .await
        {
            Ok(_) => info!("monitoring stopped"),
            Err(e) => debug!(error = %e, "worker did not acknowledge stop"),
        }
        self.bridge.shutdown().await;
        self.queue.evidence().clear_memory_only();
    }
}

/// Measure link latency forever; a failed probe records `max`.
async fn probe_latency<L: RemoteLink>(
    link: L,
    interval: Duration,
    max: Duration,
    latency: Arc<watch::Sender<Duration>>,
) {
    loop {
        let started = Instant::now();
        let measured = match link.ping(max).await {
            Ok(rtt) => rtt.min(max),
            Err(e) => {
                debug!(error = %e, "latency probe failed");
                max
            }
        };
        debug!(latency = ?measured, "link latency");
        latency.send_replace(measured);
        tokio::time::sleep(interval.saturating_sub(started.elapsed())).await;
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
