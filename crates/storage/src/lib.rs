// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Transaction log backends
//!
//! ```text
//! write_put / write_delete ─► bounded queue ─► background writer ─► file | table
//!                                                                      │
//!                              RecoveryCoordinator ◄── read_events ◄───┘
//! ```

pub mod file;
pub mod postgres;
pub mod record;
pub mod sqlite;
mod table;
mod writer;

pub use file::FileTransactionLogger;
pub use postgres::{PostgresParams, PostgresTransactionLogger};
pub use sqlite::{SqliteParams, SqliteTransactionLogger};
pub use writer::DEFAULT_QUEUE_CAPACITY;
