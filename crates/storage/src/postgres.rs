// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ordered-table backend on a PostgreSQL server
//!
//! ```sql
//! CREATE TABLE transactions (
//!     sequence   BIGSERIAL PRIMARY KEY,
//!     event_type SMALLINT NOT NULL,
//!     key        TEXT NOT NULL,
//!     value      TEXT NOT NULL
//! )
//! ```
//!
//! The connection task runs on the Tokio runtime. The background writer is a
//! blocking thread and waits on each insert through the runtime handle.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{pin_mut, TryStreamExt};
use tkv_core::{validate_key, ErrorStream, Event, EventStream, LogError, TransactionLogger};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Statement};
use tracing::{debug, error, info};

use crate::table::{RowReader, TABLE};
use crate::writer::{EventSink, WriteQueue, DEFAULT_QUEUE_CAPACITY};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

const INSERT: &str = "INSERT INTO transactions (event_type, key, value) VALUES ($1, $2, $3) \
                      RETURNING sequence";

const SELECT: &str = "SELECT sequence, event_type, key, value FROM transactions \
                      ORDER BY sequence ASC";

/// Connection parameters for a PostgreSQL server
///
/// `host` may also be a Unix socket directory.
#[derive(Clone, PartialEq, Eq)]
pub struct PostgresParams {
    pub host: String,
    pub dbname: String,
    pub user: String,
    pub password: String,
}

impl PostgresParams {
    pub fn new(
        host: impl Into<String>,
        dbname: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            dbname: dbname.into(),
            user: user.into(),
            password: password.into(),
        }
    }

    pub(crate) fn config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .dbname(&self.dbname)
            .user(&self.user)
            .password(&self.password)
            .connect_timeout(CONNECT_TIMEOUT);
        config
    }
}

impl fmt::Debug for PostgresParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresParams")
            .field("host", &self.host)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl fmt::Display for PostgresParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "postgres://{}@{}/{}", self.user, self.host, self.dbname)
    }
}

/// Transaction logger backed by a PostgreSQL table
pub struct PostgresTransactionLogger {
    server: String,
    client: Arc<Client>,
    last_sequence: Arc<AtomicU64>,
    replaying: Arc<AtomicBool>,
    queue: WriteQueue,
}

impl PostgresTransactionLogger {
    /// Connect and make sure the transactions table exists
    pub async fn connect(params: &PostgresParams) -> Result<Self, LogError> {
        Self::connect_with_capacity(params, DEFAULT_QUEUE_CAPACITY).await
    }

    pub async fn connect_with_capacity(
        params: &PostgresParams,
        capacity: usize,
    ) -> Result<Self, LogError> {
        let (client, connection) = params.config().connect(NoTls).await.map_err(database)?;
        let server = params.to_string();
        tokio::spawn({
            let server = server.clone();
            async move {
                if let Err(e) = connection.await {
                    error!(%server, error = %e, "postgres connection failed");
                }
            }
        });

        ensure_table(&client).await?;
        info!(%server, "connected to transaction table");

        Ok(Self {
            server,
            client: Arc::new(client),
            last_sequence: Arc::new(AtomicU64::new(0)),
            replaying: Arc::new(AtomicBool::new(false)),
            queue: WriteQueue::new(capacity),
        })
    }

    async fn enqueue(&self, event: Event) -> Result<(), LogError> {
        validate_key(&event.key)?;
        self.queue.send(event).await
    }
}

fn database(e: tokio_postgres::Error) -> LogError {
    LogError::Database(Box::new(e))
}

async fn ensure_table(client: &Client) -> Result<(), LogError> {
    let row = client
        .query_one(
            "SELECT EXISTS (SELECT 1 FROM pg_catalog.pg_tables \
             WHERE schemaname = current_schema() AND tablename = $1)",
            &[&TABLE],
        )
        .await
        .map_err(|e| LogError::Schema(Box::new(e)))?;
    let exists: bool = row.try_get(0).map_err(|e| LogError::Schema(Box::new(e)))?;
    if exists {
        return Ok(());
    }

    client
        .batch_execute(
            "CREATE TABLE transactions (
                sequence   BIGSERIAL PRIMARY KEY,
                event_type SMALLINT NOT NULL,
                key        TEXT NOT NULL,
                value      TEXT NOT NULL
            )",
        )
        .await
        .map_err(|e| LogError::Schema(Box::new(e)))?;
    debug!(table = TABLE, "created transaction table");
    Ok(())
}

#[async_trait]
impl TransactionLogger for PostgresTransactionLogger {
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
        let runtime =
            Handle::try_current().map_err(|e| LogError::Io(std::io::Error::other(e)))?;
        let sink = PostgresSink {
            client: Arc::clone(&self.client),
            runtime,
            insert: None,
            last_sequence: Arc::clone(&self.last_sequence),
        };
        self.queue.start(sink, "postgres")
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
        let client = Arc::clone(&self.client);
        let last_sequence = Arc::clone(&self.last_sequence);
        let replaying = Arc::clone(&self.replaying);
        replaying.store(true, Ordering::Release);

        tokio::spawn(async move {
            let result = replay(&client, &event_tx, &last_sequence).await;
            replaying.store(false, Ordering::Release);
            if let Err(e) = result {
                let _ = error_tx.send(e).await;
            }
        });

        Ok((event_rx, error_rx))
    }

    fn last_sequence(&self) -> u64 {
        self.last_sequence.load(Ordering::Acquire)
    }

    async fn close(&mut self) -> Result<(), LogError> {
        let result = self.queue.close().await;
        debug!(server = %self.server, "transaction table closed");
        result
    }
}

async fn replay(
    client: &Client,
    events: &mpsc::Sender<Event>,
    last_sequence: &AtomicU64,
) -> Result<(), LogError> {
    let rows = client
        .query_raw(SELECT, std::iter::empty::<&(dyn ToSql + Sync)>())
        .await
        .map_err(database)?;
    pin_mut!(rows);
    let mut reader = RowReader::new();

    while let Some(row) = rows.try_next().await.map_err(database)? {
        let ordinal: i16 = row.try_get(1).map_err(database)?;
        let event = reader.decode(
            row.try_get(0).map_err(database)?,
            i64::from(ordinal),
            row.try_get(2).map_err(database)?,
            row.try_get(3).map_err(database)?,
        )?;
        last_sequence.store(event.sequence, Ordering::Release);
        if events.send(event).await.is_err() {
            return Ok(());
        }
    }
    Ok(())
}

struct PostgresSink {
    client: Arc<Client>,
    runtime: Handle,
    insert: Option<Statement>,
    last_sequence: Arc<AtomicU64>,
}

impl PostgresSink {
    async fn insert(&mut self, event: &Event) -> Result<i64, tokio_postgres::Error> {
        let statement = match &self.insert {
            Some(statement) => statement.clone(),
            None => {
                let statement = self.client.prepare(INSERT).await?;
                self.insert = Some(statement.clone());
                statement
            }
        };
        let ordinal = i16::from(event.kind.ordinal());
        let row = self
            .client
            .query_one(&statement, &[&ordinal, &event.key, &event.value])
            .await?;
        row.try_get(0)
    }
}

impl EventSink for PostgresSink {
    fn append(&mut self, event: Event) -> Result<u64, LogError> {
        let runtime = self.runtime.clone();
        let sequence = runtime.block_on(self.insert(&event)).map_err(database)?;
        let sequence = u64::try_from(sequence)
            .map_err(|_| LogError::Database(format!("negative sequence {}", sequence).into()))?;
        self.last_sequence.store(sequence, Ordering::Release);
        Ok(sequence)
    }
}

#[cfg(test)]
#[path = "postgres_tests.rs"]
mod tests;
