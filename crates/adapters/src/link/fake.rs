// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable in-memory server link for tests.

use super::{LinkError, RemoteLink};
use async_trait::async_trait;
use dx_core::{OfflineLogRecord, TransactionId};
use dx_wire::{BulkAck, PostLogAck};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Default)]
struct FakeLinkState {
    post_results: VecDeque<Result<PostLogAck, LinkError>>,
    bulk_results: VecDeque<Result<BulkAck, LinkError>>,
    /// Ids the server accepts by default; `None` accepts everything.
    accept_only: Option<Vec<TransactionId>>,
    posted: Vec<OfflineLogRecord>,
    bulk_calls: Vec<Vec<TransactionId>>,
    pings: usize,
}

/// Fake [`RemoteLink`] that records calls and replays scripted results.
///
/// Unscripted single posts are acknowledged with evidence wanted; unscripted
/// bulk posts accept every record (or the ids set by [`accept_only`]).
/// Every call fails with [`LinkError::Disconnected`] while disconnected.
///
/// [`accept_only`]: FakeRemoteLink::accept_only
#[derive(Clone)]
pub struct FakeRemoteLink {
    state: Arc<Mutex<FakeLinkState>>,
    connected: Arc<watch::Sender<bool>>,
}

impl FakeRemoteLink {
    pub fn new(connected: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeLinkState::default())),
            connected: Arc::new(watch::channel(connected).0),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.send_replace(connected);
    }

    pub fn push_post_result(&self, result: Result<PostLogAck, LinkError>) {
        self.state.lock().post_results.push_back(result);
    }

    pub fn push_bulk_result(&self, result: Result<BulkAck, LinkError>) {
        self.state.lock().bulk_results.push_back(result);
    }

    pub fn accept_only<I, T>(&self, ids: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<TransactionId>,
    {
        self.state.lock().accept_only = Some(ids.into_iter().map(Into::into).collect());
    }

    /// Records delivered through single posts, in call order.
    pub fn posted_logs(&self) -> Vec<OfflineLogRecord> {
        self.state.lock().posted.clone()
    }

    /// Transaction ids of each bulk call, one entry per chunk.
    pub fn bulk_calls(&self) -> Vec<Vec<TransactionId>> {
        self.state.lock().bulk_calls.clone()
    }

    pub fn ping_count(&self) -> usize {
        self.state.lock().pings
    }

    fn check_connected(&self) -> Result<(), LinkError> {
        if *self.connected.borrow() {
            Ok(())
        } else {
            Err(LinkError::Disconnected)
        }
    }
}

#[async_trait]
impl RemoteLink for FakeRemoteLink {
    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    fn watch_connected(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    async fn post_log(&self, record: &OfflineLogRecord) -> Result<PostLogAck, LinkError> {
        self.check_connected()?;
        let mut state = self.state.lock();
        let result = state
            .post_results
            .pop_front()
            .unwrap_or(Ok(PostLogAck { ok: true, should_upload_video: Some(true) }));
        if result.is_ok() {
            state.posted.push(record.clone());
        }
        result
    }

    async fn post_logs_bulk(
        &self,
        records: &[OfflineLogRecord],
        _timeout: Duration,
    ) -> Result<BulkAck, LinkError> {
        self.check_connected()?;
        let mut state = self.state.lock();
        let ids: Vec<TransactionId> = records.iter().map(|r| r.transaction_id.clone()).collect();
        state.bulk_calls.push(ids.clone());
        if let Some(result) = state.bulk_results.pop_front() {
            return result;
        }
        let accepted = match &state.accept_only {
            Some(allowed) => ids.into_iter().filter(|id| allowed.contains(id)).collect(),
            None => ids,
        };
        Ok(BulkAck { accepted, failed: Vec::new() })
    }

    async fn ping(&self, _timeout: Duration) -> Result<Duration, LinkError> {
        self.check_connected()?;
        self.state.lock().pings += 1;
        Ok(Duration::from_millis(1))
    }
}
