// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Offline log queue: at-least-once delivery of monitoring records.
//!
//! Records go straight to the server while the link is up and fall back to
//! the local store otherwise. [`OfflineQueue::flush`] replays the store in
//! ordered chunks and deletes only what the server accepted, so a crash or
//! a failed chunk at worst re-sends records the server deduplicates by
//! transaction id.

use crate::evidence::Evidence;
use dx_adapters::RemoteLink;
use dx_core::{OfflineLogRecord, TransactionId};
use dx_storage::LocalStore;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Records per bulk call.
pub const DEFAULT_CHUNK_SIZE: usize = 25;
/// Ack deadline for one bulk call.
pub const DEFAULT_BULK_TIMEOUT: Duration = Duration::from_secs(15);

/// What happened to a submitted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Acknowledged by the server; evidence may be requested later.
    Delivered,
    /// Acknowledged and the server wants no evidence; local clip removed.
    DeliveredWithoutEvidence,
    /// Written to the local store for a later flush.
    Persisted,
    /// Neither delivered nor persisted.
    Dropped,
}

/// Why a flush did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushSkip {
    Offline,
    InProgress,
    StoreUnavailable,
}

/// Summary of one flush cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub skipped: Option<FlushSkip>,
    /// Records found in the local store.
    pub pending: usize,
    pub chunks_sent: usize,
    pub accepted: usize,
    pub deleted: usize,
    /// Records the server reported as failed; they stay for the next cycle.
    pub rejected: usize,
    /// A chunk failed and the rest of the cycle was abandoned.
    pub aborted: bool,
}

impl FlushReport {
    fn skipped(reason: FlushSkip) -> Self {
        Self { skipped: Some(reason), ..Self::default() }
    }
}

/// Sends records to the server, buffering them locally while offline.
#[derive(Clone)]
pub struct OfflineQueue<L: RemoteLink, S: LocalStore> {
    link: L,
    evidence: Evidence<S>,
    flushing: Arc<tokio::sync::Mutex<()>>,
}

impl<L: RemoteLink, S: LocalStore> OfflineQueue<L, S> {
    pub fn new(link: L, evidence: Evidence<S>) -> Self {
        Self { link, evidence, flushing: Default::default() }
    }

    pub fn evidence(&self) -> &Evidence<S> {
        &self.evidence
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Deliver `record` now, or persist it for later.
    ///
    /// Never fails: every failure has a fallback, and the outcome is
    /// informational only.
    pub async fn submit(&self, record: OfflineLogRecord) -> SubmitOutcome {
        let tx = record.transaction_id.clone();
        if self.link.is_connected() {
            match self.link.post_log(&record).await {
                Ok(ack) if ack.evidence_declined() => {
                    tracing::debug!(transaction_id = %tx, "log delivered, evidence not needed");
                    self.evidence.cleanup_transaction(&tx).await;
                    return SubmitOutcome::DeliveredWithoutEvidence;
                }
                Ok(_) => {
                    tracing::debug!(transaction_id = %tx, "log delivered");
                    return SubmitOutcome::Delivered;
                }
                Err(e) => {
                    tracing::info!(transaction_id = %tx, error = %e, "log send failed, queueing");
                }
            }
        }
        self.persist(&record).await
    }

    async fn persist(&self, record: &OfflineLogRecord) -> SubmitOutcome {
        match self.evidence.store().write_record(record).await {
            Ok(handle) => {
                tracing::debug!(transaction_id = %record.transaction_id, %handle, "log queued");
                SubmitOutcome::Persisted
            }
            Err(e) => {
                tracing::error!(
                    transaction_id = %record.transaction_id,
                    error = %e,
                    "failed to queue log"
                );
                SubmitOutcome::Dropped
            }
        }
    }

    /// Flush with the default chunk size and timeout.
    pub async fn flush_default(&self) -> FlushReport {
        self.flush(DEFAULT_CHUNK_SIZE, DEFAULT_BULK_TIMEOUT).await
    }

    /// Send every persisted record in ordered chunks of `chunk_size`,
    /// deleting the ones the server accepts.
    ///
    /// Safe to call repeatedly; overlapping calls are skipped. A failed
    /// chunk ends the cycle and leaves the remaining records for the next
    /// one.
    pub async fn flush(&self, chunk_size: usize, timeout: Duration) -> FlushReport {
        if !self.link.is_connected() {
            return FlushReport::skipped(FlushSkip::Offline);
        }
        let Ok(_guard) = self.flushing.try_lock() else {
            return FlushReport::skipped(FlushSkip::InProgress);
        };

        let store = self.evidence.store();
        let stored = match store.list_records().await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(error = %e, "cannot read queued logs");
                return FlushReport::skipped(FlushSkip::StoreUnavailable);
            }
        };
        let mut report = FlushReport { pending: stored.len(), ..FlushReport::default() };
        if stored.is_empty() {
            return report;
        }
        self.evidence.rehydrate(&stored);

        let chunk_size = chunk_size.max(1);
        for chunk in stored.chunks(chunk_size) {
            let records: Vec<OfflineLogRecord> = chunk.iter().map(|s| s.record.clone()).collect();
            let ack = match self.link.post_logs_bulk(&records, timeout).await {
                Ok(ack) => ack,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        unsent = stored.len() - report.chunks_sent * chunk_size,
                        "bulk flush failed, retrying next cycle"
                    );
                    report.aborted = true;
                    break;
                }
            };
            report.chunks_sent += 1;
            report.rejected += ack.failed.len();
            for failure in &ack.failed {
                tracing::debug!(
                    transaction_id = %failure.transaction_id,
                    error = %failure.error,
                    "server rejected queued log"
                );
            }

            let accepted: HashSet<&TransactionId> = ack.accepted.iter().collect();
            for entry in chunk.iter().filter(|s| accepted.contains(&s.record.transaction_id)) {
                report.accepted += 1;
                match store.delete_record(&entry.handle).await {
                    Ok(()) => report.deleted += 1,
                    Err(e) => tracing::warn!(
                        handle = %entry.handle,
                        error = %e,
                        "failed to delete delivered log"
                    ),
                }
            }
        }

        tracing::info!(
            pending = report.pending,
            accepted = report.accepted,
            rejected = report.rejected,
            aborted = report.aborted,
            "flushed queued logs"
        );
        report
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
