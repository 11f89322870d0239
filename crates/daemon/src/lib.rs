// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tkv daemon library: configuration, HTTP service and lifecycle of `tkvd`

pub mod config;
pub mod lifecycle;
pub mod server;
pub mod service;

pub use config::{BackendConfig, Config, ConfigError};
pub use lifecycle::{open_logger, startup, verify, Daemon, LifecycleError, VerifyReport};
pub use service::{KvService, ServiceError, Status};
