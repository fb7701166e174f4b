// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Serves server-initiated evidence upload requests.

use crate::evidence::{Evidence, EvidenceSource};
use dx_adapters::UploadClient;
use dx_storage::LocalStore;
use dx_wire::UploadRequest;

/// Result of one upload request. Only `Uploaded` clears local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded(EvidenceSource),
    /// Nothing bound to the transaction.
    NoEvidence,
    /// Bound file could not be read.
    Unreadable,
    /// Transfer failed; everything kept for a re-request.
    Failed,
}

pub struct EvidenceUploader<S: LocalStore, U: UploadClient> {
    evidence: Evidence<S>,
    client: U,
}

impl<S: LocalStore, U: UploadClient> EvidenceUploader<S, U> {
    pub fn new(evidence: Evidence<S>, client: U) -> Self {
        Self { evidence, client }
    }

    /// Resolve the recording for the request's transaction and PUT it to
    /// the issued URL. No retry here: the server re-requests on failure.
    pub async fn handle_upload_request(&self, request: &UploadRequest) -> UploadOutcome {
        let tx = &request.transaction_id;
        let resolved = match self.evidence.resolve(tx).await {
            Ok(Some(resolved)) => resolved,
            Ok(None) => {
                tracing::warn!(transaction_id = %tx, "upload requested but no evidence is bound");
                return UploadOutcome::NoEvidence;
            }
            Err(e) => {
                tracing::error!(transaction_id = %tx, error = %e, "failed to read evidence for upload");
                return UploadOutcome::Unreadable;
            }
        };

        let source = resolved.source;
        let size = resolved.bytes.len();
        match self.client.put(&request.url, &resolved.content_type, resolved.bytes).await {
            Ok(()) => {
                tracing::info!(transaction_id = %tx, ?source, size, "evidence uploaded");
                self.evidence.cleanup_transaction(tx).await;
                UploadOutcome::Uploaded(source)
            }
            Err(e) => {
                tracing::error!(transaction_id = %tx, error = %e, "evidence upload failed");
                UploadOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
#[path = "uploader_tests.rs"]
mod tests;
