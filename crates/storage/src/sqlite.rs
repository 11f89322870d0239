// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ordered-table backend on an embedded SQLite database
//!
//! ```sql
//! CREATE TABLE transactions (
//!     sequence   INTEGER PRIMARY KEY AUTOINCREMENT,
//!     event_type INTEGER NOT NULL,
//!     key        TEXT NOT NULL,
//!     value      TEXT NOT NULL
//! )
//! ```
//!
//! The database assigns sequence numbers, so they keep increasing across
//! restarts even without a replay.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, OpenFlags};
use tkv_core::{validate_key, ErrorStream, Event, EventStream, LogError, TransactionLogger};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::table::{RowReader, TABLE};
use crate::writer::{EventSink, WriteQueue, DEFAULT_QUEUE_CAPACITY};

/// Location of the SQLite database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteParams {
    /// Database file. Created if absent; its directory must exist.
    pub path: PathBuf,
}

impl SqliteParams {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Transaction logger backed by an ordered table
pub struct SqliteTransactionLogger {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
    last_sequence: Arc<AtomicU64>,
    replaying: Arc<AtomicBool>,
    queue: WriteQueue,
}

impl SqliteTransactionLogger {
    /// Connect and make sure the transactions table exists
    pub fn open(params: &SqliteParams) -> Result<Self, LogError> {
        Self::with_capacity(params, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(params: &SqliteParams, capacity: usize) -> Result<Self, LogError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&params.path, flags).map_err(database)?;
        conn.pragma_update(None, "synchronous", "FULL").map_err(database)?;
        ensure_table(&conn)?;
        info!(path = %params.path.display(), "opened transaction table");

        Ok(Self {
            path: params.path.clone(),
            conn: Arc::new(Mutex::new(conn)),
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

fn database(e: rusqlite::Error) -> LogError {
    LogError::Database(Box::new(e))
}

fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(|e| e.into_inner())
}

fn ensure_table(conn: &Connection) -> Result<(), LogError> {
    let exists: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![TABLE],
            |row| row.get(0),
        )
        .map_err(|e| LogError::Schema(Box::new(e)))?;
    if exists {
        return Ok(());
    }

    conn.execute_batch(
        "CREATE TABLE transactions (
            sequence   INTEGER PRIMARY KEY AUTOINCREMENT,
            event_type INTEGER NOT NULL,
            key        TEXT NOT NULL,
            value      TEXT NOT NULL
        );",
    )
    .map_err(|e| LogError::Schema(Box::new(e)))?;
    debug!(table = TABLE, "created transaction table");
    Ok(())
}

#[async_trait]
impl TransactionLogger for SqliteTransactionLogger {
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
        let sink = TableSink {
            conn: Arc::clone(&self.conn),
            last_sequence: Arc::clone(&self.last_sequence),
        };
        self.queue.start(sink, "sqlite")
    }

    fn take_errors(&mut self) -> Option<ErrorStream> {
        self.queue.take_errors()
    }

    fn read_events(&mut self) -> Result<(EventStream, ErrorStream), LogError> {
        self.queue.check_idle()?;
        if self.replaying.load(Ordering::Acquire) {
            return Err(LogError::ReplayInProgress);
        }

        let (event_tx, event_rx) = mpsc::channel(1);
        let (error_tx, error_rx) = mpsc::channel(1);
        let conn = Arc::clone(&self.conn);
        let last_sequence = Arc::clone(&self.last_sequence);
        let replaying = Arc::clone(&self.replaying);
        replaying.store(true, Ordering::Release);

        tokio::task::spawn_blocking(move || {
            let result = replay(&lock(&conn), &event_tx, &last_sequence);
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
        debug!(path = %self.path.display(), "transaction table closed");
        result
    }
}

fn replay(
    conn: &Connection,
    events: &mpsc::Sender<Event>,
    last_sequence: &AtomicU64,
) -> Result<(), LogError> {
    let mut stmt = conn
        .prepare("SELECT sequence, event_type, key, value FROM transactions ORDER BY sequence ASC")
        .map_err(database)?;
    let mut rows = stmt.query([]).map_err(database)?;
    let mut reader = RowReader::new();

    while let Some(row) = rows.next().map_err(database)? {
        let event = reader.decode(
            row.get(0).map_err(database)?,
            row.get(1).map_err(database)?,
            row.get(2).map_err(database)?,
            row.get(3).map_err(database)?,
        )?;
        last_sequence.store(event.sequence, Ordering::Release);
        if events.blocking_send(event).is_err() {
            return Ok(());
        }
    }
    Ok(())
}

struct TableSink {
    conn: Arc<Mutex<Connection>>,
    last_sequence: Arc<AtomicU64>,
}

impl EventSink for TableSink {
    fn append(&mut self, event: Event) -> Result<u64, LogError> {
        let conn = lock(&self.conn);
        let mut stmt = conn
            .prepare_cached("INSERT INTO transactions (event_type, key, value) VALUES (?1, ?2, ?3)")
            .map_err(database)?;
        stmt.execute(params![event.kind.ordinal(), event.key, event.value]).map_err(database)?;
        let sequence = conn.last_insert_rowid() as u64;
        self.last_sequence.store(sequence, Ordering::Release);
        Ok(sequence)
    }
}

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;
