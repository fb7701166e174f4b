// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dx-core: Core types shared by the Distract client runtime

pub mod macros;

pub mod clock;
pub mod correlation;
pub mod id;
pub mod record;

pub use clock::{Clock, FakeClock, SystemClock};
pub use correlation::CorrelationId;
#[cfg(any(test, feature = "test-support"))]
pub use record::OfflineLogRecordBuilder;
pub use record::{OfflineLogRecord, TransactionId, DEFAULT_MIMETYPE};
