// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Correlation identifiers pairing a worker request with its reply.

crate::define_id! {
    /// Opaque token assigned to each request at enqueue time and echoed
    /// back by the worker in the matching reply.
    pub struct CorrelationId("cor-");
}
