// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monitoring log records exchanged with the server and buffered offline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

crate::define_id! {
    /// Unique identifier assigned by the producer of a monitoring record.
    ///
    /// The server deduplicates at-least-once deliveries on this id.
    pub struct TransactionId("txn-");
}

/// Fallback content type for evidence whose type cannot be determined.
pub const DEFAULT_MIMETYPE: &str = "application/octet-stream";

fn default_mimetype() -> String {
    DEFAULT_MIMETYPE.to_string()
}

/// One monitoring log entry.
///
/// Serialized in the server's camelCase shape; the same JSON is written to
/// disk when the record has to wait for connectivity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineLogRecord {
    pub transaction_id: TransactionId,
    pub room_code: String,
    /// Scoring payload produced by the analysis pipeline; opaque to the queue.
    #[serde(default)]
    pub scores: serde_json::Value,
    #[serde(default)]
    pub is_phone_present: bool,
    /// Content type of the attached recording
    #[serde(default = "default_mimetype")]
    pub mimetype: String,
    pub start_time: DateTime<Utc>,
    /// Local evidence file, present when a clip was written to disk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
}

impl OfflineLogRecord {
    /// Transaction id and evidence path, when the record carries one.
    pub fn evidence_binding(&self) -> Option<(&TransactionId, &PathBuf)> {
        self.video_path.as_ref().map(|path| (&self.transaction_id, path))
    }
}

/// Record with test defaults; override fields as needed.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone)]
pub struct OfflineLogRecordBuilder {
    record: OfflineLogRecord,
}

#[cfg(any(test, feature = "test-support"))]
impl OfflineLogRecord {
    pub fn builder() -> OfflineLogRecordBuilder {
        let now = Utc::now();
        OfflineLogRecordBuilder {
            record: OfflineLogRecord {
                transaction_id: TransactionId::from("txn-test"),
                room_code: "ROOM-1".to_string(),
                scores: serde_json::Value::Null,
                is_phone_present: false,
                mimetype: "video/webm".to_string(),
                start_time: now,
                video_path: None,
                created_at: now,
            },
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl OfflineLogRecordBuilder {
    pub fn transaction_id(mut self, id: impl Into<TransactionId>) -> Self {
        self.record.transaction_id = id.into();
        self
    }

    pub fn room_code(mut self, room_code: impl Into<String>) -> Self {
        self.record.room_code = room_code.into();
        self
    }

    pub fn scores(mut self, scores: serde_json::Value) -> Self {
        self.record.scores = scores;
        self
    }

    pub fn is_phone_present(mut self, present: bool) -> Self {
        self.record.is_phone_present = present;
        self
    }

    pub fn mimetype(mut self, mimetype: impl Into<String>) -> Self {
        self.record.mimetype = mimetype.into();
        self
    }

    pub fn video_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.record.video_path = Some(path.into());
        self
    }

    pub fn build(self) -> OfflineLogRecord {
        self.record
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
