// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only file backend
//!
//! Every record is flushed and synced before the next one is written, so a
//! crash loses at most the records still queued in memory.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tkv_core::{validate_key, ErrorStream, Event, EventStream, LogError, TransactionLogger};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::record::{decode_line, encode_line};
use crate::writer::{EventSink, WriteQueue, DEFAULT_QUEUE_CAPACITY};

/// Transaction logger backed by a single text file
pub struct FileTransactionLogger {
    path: PathBuf,
    file: Option<File>,
    last_sequence: Arc<AtomicU64>,
    replaying: Arc<AtomicBool>,
    queue: WriteQueue,
}

impl FileTransactionLogger {
    /// Open (or create) the log at `path`. The parent directory must exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LogError> {
        Self::with_capacity(path, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(path: impl AsRef<Path>, capacity: usize) -> Result<Self, LogError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|source| LogError::Open {
                path: path.clone(),
                source,
            })?;
        info!(path = %path.display(), "opened transaction log");

        Ok(Self {
            path,
            file: Some(file),
            last_sequence: Arc::new(AtomicU64::new(0)),
            replaying: Arc::new(AtomicBool::new(false)),
            queue: WriteQueue::new(capacity),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn enqueue(&self, event: Event) -> Result<(), LogError> {
        validate_key(&event.key)?;
        self.queue.send(event).await
    }
}

#[async_trait]
impl TransactionLogger for FileTransactionLogger {
    async fn write_put(&self, key: &str, value: &str) -> Result<(), LogError> {
        self.enqueue(Event::put(key, value)).await
    }

    async fn write_delete(&self, key: &str) -> Result<(), LogError> {
        self.enqueue(Event::delete(key)).await
    }

    fn run(&mut self) -> Result<(), LogError> {
        if self.replaying.load(Ordering::Acquire) {
            return Err(LogError::ReplayInProgress);
        }
        self.queue.check_idle()?;
        let file = self.file.take().ok_or(LogError::Closed)?;
        let sink = FileSink {
            file,
            last_sequence: Arc::clone(&self.last_sequence),
        };
        self.queue.start(sink, "file")
    }

    fn take_errors(&mut self) -> Option<ErrorStream> {
        self.queue.take_errors()
    }

    fn read_events(&mut self) -> Result<(EventStream, ErrorStream), LogError> {
        self.queue.check_idle()?;
        if self.replaying.load(Ordering::Acquire) {
            return Err(LogError::ReplayInProgress);
        }
        let file = self.file.as_ref().ok_or(LogError::Closed)?;
        let mut reader = file.try_clone()?;
        reader.seek(SeekFrom::Start(0))?;

        let (event_tx, event_rx) = mpsc::channel(1);
        let (error_tx, error_rx) = mpsc::channel(1);
        let last_sequence = Arc::clone(&self.last_sequence);
        let replaying = Arc::clone(&self.replaying);
        replaying.store(true, Ordering::Release);

        tokio::task::spawn_blocking(move || {
            let result = replay(reader, &event_tx, &last_sequence);
            replaying.store(false, Ordering::Release);
            if let Err(e) = result {
                let _ = error_tx.blocking_send(e);
            }
        });

        Ok((event_rx, error_rx))
    }

    fn last_sequence(&self) -> u64 {
        self.last_sequence.load(Ordering::Acquire)
    }

    async fn close(&mut self) -> Result<(), LogError> {
        let result = self.queue.close().await;
        self.file = None;
        debug!(path = %self.path.display(), "transaction log closed");
        result
    }
}

fn replay(
    file: File,
    events: &mpsc::Sender<Event>,
    last_sequence: &AtomicU64,
) -> Result<(), LogError> {
    let mut reader = BufReader::new(file);
    let mut text = String::new();
    let mut line = 0u64;
    let mut previous = 0u64;

    loop {
        text.clear();
        if reader.read_line(&mut text)? == 0 {
            return Ok(());
        }
        line += 1;
        if text.trim().is_empty() {
            continue;
        }

        let event = decode_line(&text, line)?;
        if event.sequence <= previous {
            return Err(LogError::OutOfSequence {
                previous,
                found: event.sequence,
            });
        }
        previous = event.sequence;
        last_sequence.store(previous, Ordering::Release);

        if events.blocking_send(event).is_err() {
            // Consumer went away
            return Ok(());
        }
    }
}

struct FileSink {
    file: File,
    last_sequence: Arc<AtomicU64>,
}

impl EventSink for FileSink {
    fn append(&mut self, event: Event) -> Result<u64, LogError> {
        let last = self.last_sequence.load(Ordering::Acquire);
        let sequence = last
            .checked_add(1)
            .ok_or(LogError::SequenceExhausted { last })?;
        let line = encode_line(&event.with_sequence(sequence));
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        self.file.sync_all()?;
        self.last_sequence.store(sequence, Ordering::Release);
        Ok(sequence)
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
