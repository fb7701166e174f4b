// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire formats for the Distract client.
//!
//! Two protocols live here:
//! - the worker protocol: newline-delimited JSON over the worker's stdio
//! - the server protocol: acknowledged JSON frames over the remote link

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod remote;
mod worker;

pub use remote::{
    events, BulkAck, BulkFailure, BulkPayload, ClientFrame, PostLogAck, ServerFrame, UploadRequest,
};
pub use worker::{
    decode_line, encode_request, Inbound, ProtocolError, WorkerEvent, WorkerRequest,
    CORRELATION_FIELD, MAX_FRAME_LEN, TYPE_FIELD, VALUE_FIELD,
};

#[cfg(test)]
mod property_tests;
