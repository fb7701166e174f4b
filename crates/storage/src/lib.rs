// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dx-storage: durable local storage for records awaiting delivery and for
//! evidence clips awaiting upload.

mod fs;
pub mod mime;
mod store;

#[cfg(any(test, feature = "test-support"))]
mod memory;

pub use fs::{FsLocalStore, MONITOR_LOGS_DIR, VIDEOS_DIR};
pub use store::{LocalStore, RecordHandle, StoreError, StoredRecord, VideoPayload};

#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryStore;
