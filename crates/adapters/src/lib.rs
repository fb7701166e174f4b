// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dx-adapters: connections to the outside world.
//!
//! - [`RemoteLink`]: acknowledged event link to the server ([`WsLink`])
//! - [`UploadClient`]: direct evidence upload to a server-issued URL ([`HttpUploader`])

pub mod link;
pub mod upload;

pub use link::{LinkConfig, LinkError, RemoteLink, ServerEvent, WsLink};
pub use upload::{HttpUploader, UploadClient, UploadError, DEFAULT_UPLOAD_TIMEOUT};

#[cfg(any(test, feature = "test-support"))]
pub use link::FakeRemoteLink;
#[cfg(any(test, feature = "test-support"))]
pub use upload::{FakeUploader, UploadCall};
