// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem-backed [`LocalStore`].
//!
//! Layout under the root directory:
//!
//! ```text
//! monitor-logs/monitor_log_<epoch-ms>_<rand>.json   one record per file
//! videos/video_<epoch-ms>_<rand>.<ext>              one clip per file
//! ```
//!
//! Records are written to a `.tmp` sibling and renamed into place, so a
//! listing never observes a half-written record.

use crate::mime;
use crate::store::{LocalStore, RecordHandle, StoreError, StoredRecord, VideoPayload};
use async_trait::async_trait;
use dx_core::{Clock, OfflineLogRecord, SystemClock};
use std::path::{Path, PathBuf};

pub const MONITOR_LOGS_DIR: &str = "monitor-logs";
pub const VIDEOS_DIR: &str = "videos";

const RECORD_PREFIX: &str = "monitor_log_";
const VIDEO_PREFIX: &str = "video_";

#[derive(Clone)]
pub struct FsLocalStore<C: Clock = SystemClock> {
    logs_dir: PathBuf,
    videos_dir: PathBuf,
    clock: C,
}

impl FsLocalStore<SystemClock> {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_clock(root, SystemClock).await
    }
}

impl<C: Clock> FsLocalStore<C> {
    pub async fn open_with_clock(root: impl AsRef<Path>, clock: C) -> Result<Self, StoreError> {
        let root = root.as_ref();
        let logs_dir = root.join(MONITOR_LOGS_DIR);
        let videos_dir = root.join(VIDEOS_DIR);
        tokio::fs::create_dir_all(&logs_dir).await?;
        tokio::fs::create_dir_all(&videos_dir).await?;

        // Canonical forms so containment checks compare like with like
        let logs_dir = tokio::fs::canonicalize(&logs_dir).await?;
        let videos_dir = tokio::fs::canonicalize(&videos_dir).await?;
        tracing::debug!(logs = %logs_dir.display(), videos = %videos_dir.display(), "local store opened");
        Ok(Self { logs_dir, videos_dir, clock })
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub fn videos_dir(&self) -> &Path {
        &self.videos_dir
    }

    /// `<prefix><epoch-ms>_<rand>.<ext>`; the timestamp keeps listings in
    /// creation order, the random suffix keeps same-millisecond writes apart.
    fn unique_name(&self, prefix: &str, ext: &str) -> String {
        let suffix = nanoid::nanoid!(10, &nanoid::alphabet::SAFE[2..]);
        format!("{prefix}{}_{suffix}.{ext}", self.clock.epoch_ms())
    }
}

/// Resolve `path` to a file directly inside `dir` (which must be canonical).
///
/// The parent is canonicalized, so `..` segments and symlinked directories
/// cannot escape. When the file exists it is canonicalized too, so a symlink
/// inside `dir` cannot point out of it.
async fn contain(dir: &Path, path: &Path) -> Result<PathBuf, StoreError> {
    let outside = || StoreError::OutsideRoot(path.to_path_buf());
    let candidate = if path.is_absolute() { path.to_path_buf() } else { dir.join(path) };
    let file_name = candidate.file_name().ok_or_else(outside)?;
    let parent = candidate.parent().ok_or_else(outside)?;

    let parent = match tokio::fs::canonicalize(parent).await {
        Ok(parent) => parent,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(outside()),
        Err(e) => return Err(e.into()),
    };
    if parent != dir {
        return Err(outside());
    }

    let resolved = parent.join(file_name);
    match tokio::fs::canonicalize(&resolved).await {
        Ok(target) if target.parent() == Some(dir) => Ok(target),
        Ok(_) => Err(outside()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(resolved),
        Err(e) => Err(e.into()),
    }
}

async fn remove_if_present(path: &Path) -> Result<(), StoreError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl<C: Clock> LocalStore for FsLocalStore<C> {
    async fn write_record(&self, record: &OfflineLogRecord) -> Result<RecordHandle, StoreError> {
        let json = serde_json::to_vec(record)?;
        let path = self.logs_dir.join(self.unique_name(RECORD_PREFIX, "json"));
        let tmp_path = path.with_extension("tmp");

        tokio::fs::write(&tmp_path, &json).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        tracing::debug!(
            transaction_id = %record.transaction_id,
            path = %path.display(),
            "record persisted"
        );
        Ok(RecordHandle::new(path))
    }

    async fn list_records(&self) -> Result<Vec<StoredRecord>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.logs_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to read record file");
                    continue;
                }
            };
            match serde_json::from_slice::<OfflineLogRecord>(&bytes) {
                Ok(record) => records.push(StoredRecord { handle: RecordHandle::new(path), record }),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping corrupt record file");
                }
            }
        }
        Ok(records)
    }

    async fn delete_record(&self, handle: &RecordHandle) -> Result<(), StoreError> {
        let path = contain(&self.logs_dir, handle.path()).await?;
        remove_if_present(&path).await
    }

    async fn write_video(&self, bytes: &[u8], mimetype: &str) -> Result<PathBuf, StoreError> {
        let ext = mime::extension_for(mimetype);
        let path = self.videos_dir.join(self.unique_name(VIDEO_PREFIX, ext));
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(path = %path.display(), len = bytes.len(), "video persisted");
        Ok(path)
    }

    async fn read_video(&self, path: &Path) -> Result<VideoPayload, StoreError> {
        let path = contain(&self.videos_dir, path).await?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(path));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(VideoPayload { bytes, mimetype: mime::mimetype_for(&path) })
    }

    async fn delete_video(&self, path: &Path) -> Result<(), StoreError> {
        let path = contain(&self.videos_dir, path).await?;
        remove_if_present(&path).await
    }
}

#[cfg(test)]
#[path = "fs_tests.rs"]
mod tests;
