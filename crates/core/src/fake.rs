// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory transaction logger for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use crate::event::{Event, EventKind};
use crate::logger::{validate_key, ErrorStream, EventStream, LogError, TransactionLogger};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};

/// Recorded write call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggedCall {
    Put { key: String, value: String },
    Delete { key: String },
}

impl LoggedCall {
    /// Kind of the call, for assertions that ignore payloads
    pub fn kind(&self) -> EventKind {
        match self {
            LoggedCall::Put { .. } => EventKind::Put,
            LoggedCall::Delete { .. } => EventKind::Delete,
        }
    }
}

#[derive(Default)]
struct FakeState {
    durable: Vec<Event>,
    calls: Vec<LoggedCall>,
    last_sequence: u64,
    running: bool,
    closed: bool,
    writer_stopped: bool,
    fail_replay_at: Option<usize>,
    fail_writes: bool,
    holding_writes: bool,
    errors_tx: Option<mpsc::Sender<LogError>>,
    errors_rx: Option<ErrorStream>,
}

/// Fake logger that keeps its "durable" events in memory
///
/// Clones share state, so a test can keep a handle after boxing one.
#[derive(Clone, Default)]
pub struct FakeTransactionLogger {
    inner: Arc<Mutex<FakeState>>,
    released: Arc<Notify>,
}

impl FakeTransactionLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with events already durable, as if written by an earlier process
    pub fn with_events(events: Vec<Event>) -> Self {
        let logger = Self::new();
        logger.lock().durable = events;
        logger
    }

    /// Make replay emit an error after `n` events
    pub fn fail_replay_at(&self, n: usize) {
        self.lock().fail_replay_at = Some(n);
    }

    /// Make the next write fail in the "background", like a full disk
    pub fn fail_writes(&self) {
        self.lock().fail_writes = true;
    }

    /// Make writes wait, as if the queue were full, until released
    pub fn hold_writes(&self) {
        self.lock().holding_writes = true;
    }

    pub fn release_writes(&self) {
        self.lock().holding_writes = false;
        self.released.notify_waiters();
    }

    /// Events persisted so far
    pub fn durable(&self) -> Vec<Event> {
        self.lock().durable.clone()
    }

    /// Every write call in order
    pub fn calls(&self) -> Vec<LoggedCall> {
        self.lock().calls.clone()
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn wait_while_held(&self) {
        loop {
            let released = self.released.notified();
            if !self.lock().holding_writes {
                return;
            }
            released.await;
        }
    }

    fn append(&self, call: LoggedCall, event: Event) -> Result<(), LogError> {
        validate_key(&event.key)?;
        let mut state = self.lock();
        if state.closed {
            return Err(LogError::Closed);
        }
        if !state.running {
            return Err(LogError::NotRunning);
        }
        if state.writer_stopped {
            return Err(LogError::WriterStopped);
        }
        state.calls.push(call);

        if state.fail_writes {
            state.writer_stopped = true;
            if let Some(tx) = state.errors_tx.take() {
                let _ = tx.try_send(LogError::Io(std::io::Error::other("injected write failure")));
            }
            return Ok(());
        }

        state.last_sequence += 1;
        let sequence = state.last_sequence;
        state.durable.push(event.with_sequence(sequence));
        Ok(())
    }
}

#[async_trait]
impl TransactionLogger for FakeTransactionLogger {
    async fn write_put(&self, key: &str, value: &str) -> Result<(), LogError> {
        self.wait_while_held().await;
        self.append(
            LoggedCall::Put {
                key: key.to_string(),
                value: value.to_string(),
            },
            Event::put(key, value),
        )
    }

    async fn write_delete(&self, key: &str) -> Result<(), LogError> {
        self.wait_while_held().await;
        self.append(
            LoggedCall::Delete {
                key: key.to_string(),
            },
            Event::delete(key),
        )
    }

    fn run(&mut self) -> Result<(), LogError> {
        let mut state = self.lock();
        if state.closed {
            return Err(LogError::Closed);
        }
        if state.running {
            return Err(LogError::AlreadyRunning);
        }
        let (tx, rx) = mpsc::channel(1);
        state.errors_tx = Some(tx);
        state.errors_rx = Some(rx);
        state.running = true;
        Ok(())
    }

    fn take_errors(&mut self) -> Option<ErrorStream> {
        self.lock().errors_rx.take()
    }

    fn read_events(&mut self) -> Result<(EventStream, ErrorStream), LogError> {
        let (events, fail_at) = {
            let state = self.lock();
            if state.running {
                return Err(LogError::AlreadyRunning);
            }
            (state.durable.clone(), state.fail_replay_at)
        };
        let (event_tx, event_rx) = mpsc::channel(1);
        let (error_tx, error_rx) = mpsc::channel(1);
        let logger = self.clone();

        tokio::spawn(async move {
            for (index, event) in events.into_iter().enumerate() {
                if fail_at == Some(index) {
                    let _ = error_tx
                        .send(LogError::Corrupted {
                            line: index as u64 + 1,
                            reason: "injected replay failure".to_string(),
                        })
                        .await;
                    return;
                }
                logger.lock().last_sequence = event.sequence;
                if event_tx.send(event).await.is_err() {
                    return;
                }
            }
        });

        Ok((event_rx, error_rx))
    }

    fn last_sequence(&self) -> u64 {
        self.lock().last_sequence
    }

    async fn close(&mut self) -> Result<(), LogError> {
        let mut state = self.lock();
        state.closed = true;
        state.running = false;
        state.errors_tx = None;
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
