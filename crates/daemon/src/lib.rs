// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Distract client daemon library
//!
//! The `dxd` binary wires these together: configuration and single-instance
//! startup in [`lifecycle`], file logging in [`logging`], and the main
//! select loop in [`runtime`].

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod env;
pub mod identity;
pub mod lifecycle;
pub mod logging;
pub mod runtime;

pub use lifecycle::{startup, Config, DaemonState, LifecycleError, StartupResult};
pub use runtime::{Runtime, RuntimeSettings};
