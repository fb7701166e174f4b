// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server link with acknowledged emits.

mod ws;

#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use ws::{LinkConfig, WsLink};

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeRemoteLink;

use async_trait::async_trait;
use dx_core::OfflineLogRecord;
use dx_wire::{events, BulkAck, PostLogAck, UploadRequest};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("not connected to server")]
    Disconnected,
    #[error("no acknowledgement within {0:?}")]
    Timeout(Duration),
    #[error("failed to encode payload: {0}")]
    Encode(String),
    #[error("unexpected acknowledgement: {0}")]
    Decode(String),
}

/// Unsolicited message pushed by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Server asks for the evidence of one record.
    UploadRequested(UploadRequest),
    Other { event: String, data: Value },
}

impl ServerEvent {
    pub(crate) fn from_push(event: String, data: Value) -> Self {
        if event == events::UPLOAD_RECORDING_URL {
            match serde_json::from_value::<UploadRequest>(data.clone()) {
                Ok(request) => return Self::UploadRequested(request),
                Err(e) => tracing::warn!(error = %e, "malformed upload request from server"),
            }
        }
        Self::Other { event, data }
    }
}

/// Acknowledged request/response channel to the server.
///
/// Connectivity is an observed boolean. Calls made while disconnected fail
/// fast with [`LinkError::Disconnected`].
#[async_trait]
pub trait RemoteLink: Clone + Send + Sync + 'static {
    fn is_connected(&self) -> bool;

    /// Connectivity changes, for flushing on reconnect.
    fn watch_connected(&self) -> watch::Receiver<bool>;

    /// Send one record and wait for the server's acknowledgement.
    async fn post_log(&self, record: &OfflineLogRecord) -> Result<PostLogAck, LinkError>;

    /// Send a batch of records; the acknowledgement lists accepted ids.
    async fn post_logs_bulk(
        &self,
        records: &[OfflineLogRecord],
        timeout: Duration,
    ) -> Result<BulkAck, LinkError>;

    /// Round-trip latency of an acknowledged no-op.
    async fn ping(&self, timeout: Duration) -> Result<Duration, LinkError>;
}
