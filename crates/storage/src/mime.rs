// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mapping between evidence content types and file extensions.

use std::path::Path;

/// Extension used when the content type is unknown.
pub const DEFAULT_EXTENSION: &str = "webm";

/// File extension for a content type. Parameters such as `;codecs=vp9` are
/// ignored; unknown types map to [`DEFAULT_EXTENSION`].
///
/// The extension is always one that [`mimetype_for`] maps back to the same
/// type.
pub fn extension_for(mimetype: &str) -> &'static str {
    let essence = mimetype.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    if essence.is_empty() || essence.contains('*') {
        return DEFAULT_EXTENSION;
    }
    mime_guess::get_mime_extensions_str(&essence)
        .unwrap_or_default()
        .iter()
        .copied()
        .find(|ext| {
            mime_guess::from_ext(ext).first().is_some_and(|m| m.essence_str() == essence)
        })
        .unwrap_or(DEFAULT_EXTENSION)
}

/// Content type inferred from a path's extension, falling back to
/// `application/octet-stream`.
pub fn mimetype_for(path: &Path) -> String {
    mime_guess::from_path(path).first_or_octet_stream().essence_str().to_string()
}

#[cfg(test)]
#[path = "mime_tests.rs"]
mod tests;
