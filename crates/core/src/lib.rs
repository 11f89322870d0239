// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! tkv-core: the durability contract of the tkv key-value service
//!
//! This crate provides:
//! - The in-memory [`KeyValueStore`] that holds current state
//! - The [`Event`] record of a single mutation
//! - The [`TransactionLogger`] contract shared by every log backend
//! - The [`RecoveryCoordinator`] that rebuilds state at startup

pub mod event;
pub mod logger;
pub mod recovery;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use event::{Event, EventKind};
pub use logger::{validate_key, ErrorStream, EventStream, LogError, TransactionLogger};
pub use recovery::{RecoveryCoordinator, RecoveryError, RecoveryPhase, RecoveryReport};
pub use store::{KeyValueStore, StoreError};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeTransactionLogger, LoggedCall};
