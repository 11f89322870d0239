// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transaction logger contract
//!
//! ```text
//! construct ──► read_events (optional, replay) ──► run ──► write_put / write_delete ──► close
//! ```
//!
//! Writes are fire-and-forget: they enqueue onto a bounded queue drained by a
//! single background task that owns the backing resource. Failures of that
//! task arrive asynchronously on the error stream.

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::event::Event;

/// Lazy, ordered stream of historical events
pub type EventStream = mpsc::Receiver<Event>;

/// Asynchronous failures from a replay producer or the background writer
pub type ErrorStream = mpsc::Receiver<LogError>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced by transaction loggers
#[derive(Debug, Error)]
pub enum LogError {
    #[error("cannot open transaction log {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("database error: {0}")]
    Database(#[source] BoxError),
    #[error("cannot set up transaction table: {0}")]
    Schema(#[source] BoxError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupted record at line {line}: {reason}")]
    Corrupted { line: u64, reason: String },
    #[error("transaction numbers out of sequence: {found} after {previous}")]
    OutOfSequence { previous: u64, found: u64 },
    #[error("no sequence numbers left after {last}")]
    SequenceExhausted { last: u64 },
    #[error("invalid event: {0}")]
    InvalidEvent(String),
    #[error("transaction logger is not running")]
    NotRunning,
    #[error("transaction logger is already running")]
    AlreadyRunning,
    #[error("replay still in progress")]
    ReplayInProgress,
    #[error("transaction logger is closed")]
    Closed,
    #[error("background writer stopped")]
    WriterStopped,
    #[error("background writer panicked")]
    WriterPanicked,
}

/// Durable, ordered record of mutations
///
/// Implementations own exactly one backing resource. Sequence numbers are
/// strictly increasing for the lifetime of one logger.
#[async_trait]
pub trait TransactionLogger: Send + Sync {
    /// Enqueue a put. Waits only while the queue is full.
    async fn write_put(&self, key: &str, value: &str) -> Result<(), LogError>;

    /// Enqueue a delete. Waits only while the queue is full.
    async fn write_delete(&self, key: &str) -> Result<(), LogError>;

    /// Open the write queue and spawn the background writer
    ///
    /// Must be called once, after any replay has fully drained.
    fn run(&mut self) -> Result<(), LogError>;

    /// Take the error stream of the background writer
    ///
    /// Returns `None` before [`run`](Self::run) or once the stream was taken.
    /// The writer reports at most one error and then stops.
    fn take_errors(&mut self) -> Option<ErrorStream>;

    /// Stream every previously durable event, oldest first
    ///
    /// Both streams close when replay is exhausted or has failed; a failure
    /// is delivered as a single error.
    fn read_events(&mut self) -> Result<(EventStream, ErrorStream), LogError>;

    /// Highest sequence written or observed during replay
    fn last_sequence(&self) -> u64;

    /// Stop accepting writes, drain the queue, and wait for the writer
    async fn close(&mut self) -> Result<(), LogError>;
}

/// Reject events that must never reach a log
pub fn validate_key(key: &str) -> Result<(), LogError> {
    if key.is_empty() {
        return Err(LogError::InvalidEvent("key must not be empty".to_string()));
    }
    Ok(())
}
