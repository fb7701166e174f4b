// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Evidence upload to server-issued URLs.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on one upload, from connect to the response status.
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("upload request failed: {0}")]
    Http(String),
    #[error("upload rejected with status {0}")]
    Status(u16),
}

/// Uploads a recording body to a pre-signed URL.
#[async_trait]
pub trait UploadClient: Clone + Send + Sync + 'static {
    async fn put(&self, url: &str, content_type: &str, body: Vec<u8>) -> Result<(), UploadError>;
}

/// HTTP `PUT` uploader.
#[derive(Clone)]
pub struct HttpUploader {
    client: reqwest::Client,
}

impl HttpUploader {
    pub fn new() -> Result<Self, UploadError> {
        Self::with_timeout(DEFAULT_UPLOAD_TIMEOUT)
    }

    /// Uploader whose requests fail once `timeout` elapses, so a stalled
    /// server cannot hold evidence in memory forever.
    pub fn with_timeout(timeout: Duration) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build()
            .map_err(|e| UploadError::Http(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UploadClient for HttpUploader {
    async fn put(&self, url: &str, content_type: &str, body: Vec<u8>) -> Result<(), UploadError> {
        let size = body.len();
        let response = self
            .client
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| UploadError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Status(status.as_u16()));
        }
        tracing::debug!(size, content_type, "evidence uploaded");
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{UploadClient, UploadError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Recorded upload call
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct UploadCall {
        pub url: String,
        pub content_type: String,
        pub body: Vec<u8>,
    }

    #[derive(Default)]
    struct FakeUploaderState {
        calls: Vec<UploadCall>,
        failures: VecDeque<UploadError>,
    }

    /// Fake uploader that records calls and fails on demand.
    #[derive(Clone, Default)]
    pub struct FakeUploader {
        inner: Arc<Mutex<FakeUploaderState>>,
    }

    impl FakeUploader {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail the next upload with `error`; queued failures apply in order.
        pub fn fail_next(&self, error: UploadError) {
            self.inner.lock().failures.push_back(error);
        }

        /// Every attempted upload, including failed ones
        pub fn calls(&self) -> Vec<UploadCall> {
            self.inner.lock().calls.clone()
        }
    }

    #[async_trait]
    impl UploadClient for FakeUploader {
        async fn put(
            &self,
            url: &str,
            content_type: &str,
            body: Vec<u8>,
        ) -> Result<(), UploadError> {
            let mut inner = self.inner.lock();
            inner.calls.push(UploadCall {
                url: url.to_string(),
                content_type: content_type.to_string(),
                body,
            });
            match inner.failures.pop_front() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeUploader, UploadCall};

#[cfg(test)]
#[path = "upload_tests.rs"]
mod tests;
