// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Evidence bindings: where the recording for a transaction lives.
//!
//! A recording is held in memory for fast upload and, when written to disk,
//! also bound to its local path. Resolution prefers memory and falls back to
//! the file; the two sources are never combined. The path half is rebuilt
//! from persisted records at startup so uploads requested after a restart
//! still find their clip.

use dx_core::{TransactionId, DEFAULT_MIMETYPE};
use dx_storage::{LocalStore, StoreError, StoredRecord, VideoPayload};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Content type without parameters (`video/webm;codecs=vp9` → `video/webm`).
pub fn mimetype_essence(mimetype: &str) -> &str {
    let essence = mimetype.split(';').next().unwrap_or_default().trim();
    if essence.is_empty() {
        DEFAULT_MIMETYPE
    } else {
        essence
    }
}

/// Transaction → evidence maps.
#[derive(Debug, Default)]
pub struct EvidenceBindings {
    memory: HashMap<TransactionId, VideoPayload>,
    durable: HashMap<TransactionId, PathBuf>,
}

impl EvidenceBindings {
    pub fn remember_recording(&mut self, tx: TransactionId, payload: VideoPayload) {
        self.memory.insert(tx, payload);
    }

    pub fn remember_video_path(&mut self, tx: TransactionId, path: PathBuf) {
        self.durable.insert(tx, path);
    }

    pub fn recording(&self, tx: &TransactionId) -> Option<&VideoPayload> {
        self.memory.get(tx)
    }

    pub fn video_path(&self, tx: &TransactionId) -> Option<&PathBuf> {
        self.durable.get(tx)
    }

    pub fn is_bound(&self, tx: &TransactionId) -> bool {
        self.memory.contains_key(tx) || self.durable.contains_key(tx)
    }

    /// Drop both bindings, returning the path that was bound.
    pub fn forget(&mut self, tx: &TransactionId) -> Option<PathBuf> {
        self.memory.remove(tx);
        self.durable.remove(tx)
    }

    pub fn clear_memory(&mut self) {
        self.memory.clear();
    }

    /// Bind the evidence paths carried by persisted records.
    pub fn rehydrate<'a>(&mut self, records: impl IntoIterator<Item = &'a StoredRecord>) -> usize {
        let mut bound = 0;
        for stored in records {
            if let Some((tx, path)) = stored.record.evidence_binding() {
                self.durable.insert(tx.clone(), path.clone());
                bound += 1;
            }
        }
        bound
    }

    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    pub fn durable_len(&self) -> usize {
        self.durable.len()
    }
}

/// Where a resolved recording came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvidenceSource {
    Memory,
    Disk,
}

/// A recording ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEvidence {
    pub source: EvidenceSource,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Shared evidence state plus the store holding the clips. Clones share
/// bindings, so the offline queue and the uploader see the same view.
#[derive(Clone)]
pub struct Evidence<S: LocalStore> {
    store: S,
    bindings: Arc<Mutex<EvidenceBindings>>,
}

impl<S: LocalStore> Evidence<S> {
    pub fn new(store: S) -> Self {
        Self { store, bindings: Arc::new(Mutex::new(EvidenceBindings::default())) }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Hold a recording in memory for fast upload.
    pub fn remember_recording(&self, tx: TransactionId, bytes: Vec<u8>, mimetype: &str) {
        let payload = VideoPayload { bytes, mimetype: mimetype.to_string() };
        self.bindings.lock().remember_recording(tx, payload);
    }

    pub fn remember_video_path(&self, tx: TransactionId, path: PathBuf) {
        self.bindings.lock().remember_video_path(tx, path);
    }

    /// Write a clip to the video store and bind it both ways.
    ///
    /// Returns the path to carry in the record's `videoPath`.
    pub async fn attach_evidence(
        &self,
        tx: TransactionId,
        bytes: Vec<u8>,
        mimetype: &str,
    ) -> Result<PathBuf, StoreError> {
        let path = self.store.write_video(&bytes, mimetype).await?;
        let mut bindings = self.bindings.lock();
        bindings.remember_video_path(tx.clone(), path.clone());
        bindings.remember_recording(tx, VideoPayload { bytes, mimetype: mimetype.to_string() });
        Ok(path)
    }

    /// Rebuild path bindings from every persisted record.
    pub async fn hydrate_from_disk(&self) -> Result<usize, StoreError> {
        let records = self.store.list_records().await?;
        Ok(self.rehydrate(&records))
    }

    pub(crate) fn rehydrate(&self, records: &[StoredRecord]) -> usize {
        self.bindings.lock().rehydrate(records)
    }

    /// Resolve the recording for `tx`: memory first, then the bound file.
    ///
    /// `Ok(None)` means nothing is bound to the transaction.
    pub async fn resolve(&self, tx: &TransactionId) -> Result<Option<ResolvedEvidence>, StoreError> {
        let path = {
            let bindings = self.bindings.lock();
            if let Some(payload) = bindings.recording(tx) {
                return Ok(Some(ResolvedEvidence {
                    source: EvidenceSource::Memory,
                    bytes: payload.bytes.clone(),
                    content_type: mimetype_essence(&payload.mimetype).to_string(),
                }));
            }
            match bindings.video_path(tx) {
                Some(path) => path.clone(),
                None => return Ok(None),
            }
        };

        let payload = self.store.read_video(&path).await?;
        Ok(Some(ResolvedEvidence {
            source: EvidenceSource::Disk,
            bytes: payload.bytes,
            content_type: mimetype_essence(&payload.mimetype).to_string(),
        }))
    }

    /// Delete the local clip and both bindings. Safe to repeat.
    ///
    /// If the clip cannot be deleted the bindings stay, so a later request
    /// can still find it.
    pub async fn cleanup_transaction(&self, tx: &TransactionId) {
        let path = self.bindings.lock().video_path(tx).cloned();
        if let Some(path) = path {
            if let Err(e) = self.store.delete_video(&path).await {
                tracing::warn!(
                    transaction_id = %tx,
                    path = %path.display(),
                    error = %e,
                    "failed to delete evidence clip"
                );
                return;
            }
        }
        if self.bindings.lock().forget(tx).is_some() {
            tracing::debug!(transaction_id = %tx, "evidence cleaned up");
        }
    }

    /// Drop in-memory recordings. Paths stay bound for later uploads.
    pub fn clear_memory_only(&self) {
        self.bindings.lock().clear_memory();
    }

    pub fn is_bound(&self, tx: &TransactionId) -> bool {
        self.bindings.lock().is_bound(tx)
    }

    pub fn video_path(&self, tx: &TransactionId) -> Option<PathBuf> {
        self.bindings.lock().video_path(tx).cloned()
    }

    /// `(in-memory, on-disk)` binding counts.
    pub fn counts(&self) -> (usize, usize) {
        let bindings = self.bindings.lock();
        (bindings.memory_len(), bindings.durable_len())
    }
}

#[cfg(test)]
#[path = "evidence_tests.rs"]
mod tests;
