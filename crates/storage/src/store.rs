// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use async_trait::async_trait;
use dx_core::OfflineLogRecord;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("path {0} is outside the managed directory")]
    OutsideRoot(PathBuf),
    #[error("not found: {0}")]
    NotFound(PathBuf),
}

/// Opaque reference to one persisted record. Only the store that issued it
/// can interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordHandle(PathBuf);

impl RecordHandle {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub(crate) fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for RecordHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// A persisted record with the handle needed to delete it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub handle: RecordHandle,
    pub record: OfflineLogRecord,
}

/// Evidence bytes read back from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoPayload {
    pub bytes: Vec<u8>,
    pub mimetype: String,
}

/// Durable storage used by the offline queue.
///
/// Records are append/delete only; there is no update. Video paths handed
/// back in are validated against the managed directory.
#[async_trait]
pub trait LocalStore: Clone + Send + Sync + 'static {
    async fn write_record(&self, record: &OfflineLogRecord) -> Result<RecordHandle, StoreError>;

    /// Every readable record, oldest first. Corrupt entries are skipped.
    async fn list_records(&self) -> Result<Vec<StoredRecord>, StoreError>;

    /// Delete a record. Deleting a record that is already gone succeeds.
    async fn delete_record(&self, handle: &RecordHandle) -> Result<(), StoreError>;

    /// Persist an evidence clip and return its path.
    async fn write_video(&self, bytes: &[u8], mimetype: &str) -> Result<PathBuf, StoreError>;

    async fn read_video(&self, path: &Path) -> Result<VideoPayload, StoreError>;

    /// Delete a clip. Deleting a clip that is already gone succeeds.
    async fn delete_video(&self, path: &Path) -> Result<(), StoreError>;
}
