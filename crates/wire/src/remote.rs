// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server protocol: named events with optional acknowledgements.
//!
//! Client → server: `{"event": name, "ackId": n, "data": {...}}`
//! Server → client ack: `{"ackId": n, "data": ...}`
//! Server → client push: `{"event": name, "data": ...}`

use dx_core::{OfflineLogRecord, TransactionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event names used on the server link.
pub mod events {
    pub const POST_LOG: &str = "student:post_monitor_logs";
    pub const POST_LOGS_BULK: &str = "student:post_monitor_logs_bulk";
    pub const PING: &str = "ping";
    /// Server asks the client to upload evidence for one record.
    pub const UPLOAD_RECORDING_URL: &str = "upload_recording_url";
}

/// Acknowledgement for a single-record post.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostLogAck {
    #[serde(default)]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should_upload_video: Option<bool>,
}

impl PostLogAck {
    /// True when the server accepted the record and explicitly declined the
    /// evidence, so local state for the transaction can be released.
    pub fn evidence_declined(&self) -> bool {
        self.ok && self.should_upload_video == Some(false)
    }
}

/// Body of a bulk post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkPayload {
    pub logs: Vec<OfflineLogRecord>,
}

/// Per-record outcome of a bulk post.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkAck {
    #[serde(default)]
    pub accepted: Vec<TransactionId>,
    #[serde(default)]
    pub failed: Vec<BulkFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkFailure {
    #[serde(alias = "id")]
    pub transaction_id: TransactionId,
    #[serde(default)]
    pub error: String,
}

/// Server request to upload the evidence for a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub transaction_id: TransactionId,
    pub url: String,
}

/// Frame sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientFrame {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_id: Option<u64>,
    pub data: Value,
}

/// Frame received from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    Ack { ack_id: u64, data: Value },
    Push { event: String, data: Value },
}

impl ServerFrame {
    /// Classify a text frame. Returns `None` for frames that are neither an
    /// ack nor a named push.
    pub fn parse(text: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(text).ok()?;
        let obj = value.as_object()?;
        let data = obj.get("data").cloned().unwrap_or(Value::Null);
        if let Some(ack_id) = obj.get("ackId").and_then(Value::as_u64) {
            return Some(Self::Ack { ack_id, data });
        }
        let event = obj.get("event").and_then(Value::as_str)?;
        Some(Self::Push { event: event.to_string(), data })
    }
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
