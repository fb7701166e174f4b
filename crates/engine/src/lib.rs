// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dx-engine: delivery of monitoring records and their evidence.
//!
//! - [`OfflineQueue`]: send-or-persist, chunked flush with per-record acceptance
//! - [`EvidenceUploader`]: server-requested uploads, memory first then disk
//! - [`MonitorWindow`]: turns worker samples into records

pub mod evidence;
pub mod monitor;
pub mod queue;
pub mod uploader;

pub use evidence::{Evidence, EvidenceBindings, EvidenceSource, ResolvedEvidence};
pub use monitor::{MonitorConfig, MonitorWindow, MONITOR_EVENT_KINDS};
pub use queue::{
    FlushReport, FlushSkip, OfflineQueue, SubmitOutcome, DEFAULT_BULK_TIMEOUT, DEFAULT_CHUNK_SIZE,
};
pub use uploader::{EvidenceUploader, UploadOutcome};
