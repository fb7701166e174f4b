// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory [`LocalStore`] for tests.

use crate::mime;
use crate::store::{LocalStore, RecordHandle, StoreError, StoredRecord, VideoPayload};
use async_trait::async_trait;
use dx_core::OfflineLogRecord;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

const VIDEO_ROOT: &str = "/memory/videos";

#[derive(Default)]
struct MemoryState {
    next: u64,
    records: BTreeMap<RecordHandle, OfflineLogRecord>,
    videos: HashMap<PathBuf, Vec<u8>>,
    fail_writes: bool,
    held_writes: usize,
    deleted_records: Vec<RecordHandle>,
}

/// Store keeping everything in memory. Clones share state.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryState>>,
    hold: Arc<watch::Sender<bool>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self { inner: Arc::default(), hold: Arc::new(watch::channel(false).0) }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, record writes wait instead of completing.
    pub fn hold_writes(&self, hold: bool) {
        self.hold.send_replace(hold);
    }

    /// Record writes currently waiting on [`MemoryStore::hold_writes`].
    pub fn held_writes(&self) -> usize {
        self.inner.lock().held_writes
    }

    /// Make subsequent record and video writes fail.
    pub fn fail_writes(&self, fail: bool) {
        self.inner.lock().fail_writes = fail;
    }

    pub fn records(&self) -> Vec<OfflineLogRecord> {
        self.inner.lock().records.values().cloned().collect()
    }

    pub fn record_count(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn deleted_records(&self) -> Vec<RecordHandle> {
        self.inner.lock().deleted_records.clone()
    }

    pub fn has_video(&self, path: &Path) -> bool {
        self.inner.lock().videos.contains_key(path)
    }

    pub fn video_count(&self) -> usize {
        self.inner.lock().videos.len()
    }

    /// Path of a clip named `file_name` inside the managed video directory.
    pub fn video_path(file_name: &str) -> PathBuf {
        Path::new(VIDEO_ROOT).join(file_name)
    }

    /// Place a clip at `path`, as if left over from a previous run.
    pub fn insert_video(&self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) {
        self.inner.lock().videos.insert(path.into(), bytes.into());
    }

    fn write_failure() -> StoreError {
        StoreError::Io(std::io::Error::other("injected write failure"))
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn write_record(&self, record: &OfflineLogRecord) -> Result<RecordHandle, StoreError> {
        let held = *self.hold.borrow();
        if held {
            let mut hold = self.hold.subscribe();
            self.inner.lock().held_writes += 1;
            let _ = hold.wait_for(|held| !*held).await;
            self.inner.lock().held_writes -= 1;
        }
        let mut state = self.inner.lock();
        if state.fail_writes {
            return Err(Self::write_failure());
        }
        state.next += 1;
        let handle = RecordHandle::new(format!("memory/monitor_log_{:08}.json", state.next));
        state.records.insert(handle.clone(), record.clone());
        Ok(handle)
    }

    async fn list_records(&self) -> Result<Vec<StoredRecord>, StoreError> {
        let state = self.inner.lock();
        Ok(state
            .records
            .iter()
            .map(|(handle, record)| StoredRecord { handle: handle.clone(), record: record.clone() })
            .collect())
    }

    async fn delete_record(&self, handle: &RecordHandle) -> Result<(), StoreError> {
        let mut state = self.inner.lock();
        state.records.remove(handle);
        state.deleted_records.push(handle.clone());
        Ok(())
    }

    async fn write_video(&self, bytes: &[u8], mimetype: &str) -> Result<PathBuf, StoreError> {
        let mut state = self.inner.lock();
        if state.fail_writes {
            return Err(Self::write_failure());
        }
        state.next += 1;
        let path = Path::new(VIDEO_ROOT)
            .join(format!("video_{:08}.{}", state.next, mime::extension_for(mimetype)));
        state.videos.insert(path.clone(), bytes.to_vec());
        Ok(path)
    }

    async fn read_video(&self, path: &Path) -> Result<VideoPayload, StoreError> {
        if !path.starts_with(VIDEO_ROOT) {
            return Err(StoreError::OutsideRoot(path.to_path_buf()));
        }
        let state = self.inner.lock();
        let bytes = state.videos.get(path).ok_or_else(|| StoreError::NotFound(path.to_path_buf()))?;
        Ok(VideoPayload { bytes: bytes.clone(), mimetype: mime::mimetype_for(path) })
    }

    async fn delete_video(&self, path: &Path) -> Result<(), StoreError> {
        if !path.starts_with(VIDEO_ROOT) {
            return Err(StoreError::OutsideRoot(path.to_path_buf()));
        }
        self.inner.lock().videos.remove(path);
        Ok(())
    }
}
