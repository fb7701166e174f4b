// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent client identity.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct IdentityFile {
    uuid: String,
}

/// Read the client UUID at `path`, creating it on first run.
///
/// An unreadable or empty file is replaced with a fresh identity.
pub fn get_or_create_uuid(path: &Path) -> Result<String, IdentityError> {
    match std::fs::read_to_string(path) {
        Ok(text) => match serde_json::from_str::<IdentityFile>(&text) {
            Ok(file) if !file.uuid.is_empty() => return Ok(file.uuid),
            Ok(_) => tracing::warn!(path = %path.display(), "empty client identity, regenerating"),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "corrupt client identity, regenerating")
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let uuid = uuid::Uuid::new_v4().to_string();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_vec(&IdentityFile { uuid: uuid.clone() })?)?;
    std::fs::rename(&tmp, path)?;
    tracing::info!(%uuid, "created client identity");
    Ok(uuid)
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
