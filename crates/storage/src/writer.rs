// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded write queue drained by one background writer
//!
//! Producers enqueue events; the writer task is the only code that touches
//! the backing resource, so records land in enqueue order. The first failed
//! append is reported on the error stream and the writer exits, dropping its
//! receiver so later sends fail fast.

use tkv_core::{ErrorStream, Event, LogError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

/// Writes that may be buffered ahead of the writer
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Backing resource owned by the writer task
pub(crate) trait EventSink: Send + 'static {
    /// Persist one event and return the sequence number it was assigned
    fn append(&mut self, event: Event) -> Result<u64, LogError>;
}

enum QueueState {
    Idle,
    Running {
        tx: mpsc::Sender<Event>,
        task: JoinHandle<()>,
    },
    Closed,
}

pub(crate) struct WriteQueue {
    capacity: usize,
    state: QueueState,
    errors: Option<ErrorStream>,
}

impl WriteQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: QueueState::Idle,
            errors: None,
        }
    }

    /// Fails unless the queue has never been started or closed
    pub(crate) fn check_idle(&self) -> Result<(), LogError> {
        match self.state {
            QueueState::Idle => Ok(()),
            QueueState::Running { .. } => Err(LogError::AlreadyRunning),
            QueueState::Closed => Err(LogError::Closed),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        matches!(self.state, QueueState::Running { .. })
    }

    /// Spawn the writer. Requires a Tokio runtime.
    pub(crate) fn start<S: EventSink>(
        &mut self,
        sink: S,
        label: &'static str,
    ) -> Result<(), LogError> {
        self.check_idle()?;

        let (tx, rx) = mpsc::channel(self.capacity);
        let (errors_tx, errors_rx) = mpsc::channel(1);
        let task = tokio::task::spawn_blocking(move || drain(sink, rx, errors_tx, label));

        debug!(backend = label, capacity = self.capacity, "writer started");
        self.state = QueueState::Running { tx, task };
        self.errors = Some(errors_rx);
        Ok(())
    }

    /// Enqueue one event, waiting while the queue is full
    pub(crate) async fn send(&self, event: Event) -> Result<(), LogError> {
        match &self.state {
            QueueState::Idle => Err(LogError::NotRunning),
            QueueState::Closed => Err(LogError::Closed),
            QueueState::Running { tx, .. } => {
                tx.send(event).await.map_err(|_| LogError::WriterStopped)
            }
        }
    }

    pub(crate) fn take_errors(&mut self) -> Option<ErrorStream> {
        self.errors.take()
    }

    /// Refuse new writes, let the writer drain what is queued, and join it
    pub(crate) async fn close(&mut self) -> Result<(), LogError> {
        match std::mem::replace(&mut self.state, QueueState::Closed) {
            QueueState::Running { tx, task } => {
                drop(tx);
                task.await.map_err(|_| LogError::WriterPanicked)
            }
            QueueState::Idle | QueueState::Closed => Ok(()),
        }
    }
}

fn drain<S: EventSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<Event>,
    errors: mpsc::Sender<LogError>,
    label: &'static str,
) {
    while let Some(event) = rx.blocking_recv() {
        let kind = event.kind;
        match sink.append(event) {
            Ok(sequence) => trace!(backend = label, sequence, %kind, "event persisted"),
            Err(e) => {
                error!(backend = label, error = %e, "writer stopped");
                drop(rx);
                let _ = errors.try_send(e);
                return;
            }
        }
    }
    debug!(backend = label, "writer drained");
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
