// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, recovery, serving, shutdown.

use std::fs::{File, OpenOptions};
use std::future::Future;
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use fs2::FileExt;
use thiserror::Error;
use tkv_core::{
    ErrorStream, KeyValueStore, LogError, RecoveryCoordinator, RecoveryError, TransactionLogger,
};
use tkv_storage::{
    FileTransactionLogger, PostgresTransactionLogger, SqliteParams, SqliteTransactionLogger,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::config::{BackendConfig, Config, ConfigError};
use crate::server;
use crate::service::KvService;

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Transaction log error: {0}")]
    Log(#[from] LogError),

    #[error("Recovery failed: {0}")]
    Recovery(#[from] RecoveryError),

    #[error("Failed to bind {0}: {1}")]
    BindFailed(SocketAddr, #[source] std::io::Error),

    #[error("Transaction log failed while serving: {0}")]
    LogFailed(#[source] LogError),

    #[error("Daemon is not listening")]
    NotListening,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of a verification replay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyReport {
    pub events_applied: u64,
    pub last_sequence: u64,
    pub keys: usize,
}

/// Daemon state during operation
pub struct Daemon {
    /// Configuration
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// Bound listener, consumed by `run`
    listener: Option<TcpListener>,
    /// The store and its logger
    pub service: Arc<KvService>,
    /// Background writer failures
    log_errors: Option<ErrorStream>,
    /// When daemon started
    pub start_time: Instant,
}

impl Daemon {
    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr, LifecycleError> {
        let listener = self.listener.as_ref().ok_or(LifecycleError::NotListening)?;
        Ok(listener.local_addr()?)
    }

    /// Serve until `stop` resolves or the transaction log fails, then shut down
    ///
    /// A log failure is returned as [`LifecycleError::LogFailed`] after the
    /// shutdown completes.
    pub async fn run(
        &mut self,
        stop: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), LifecycleError> {
        let listener = self.listener.take().ok_or(LifecycleError::NotListening)?;
        let errors = self.log_errors.take();
        let service = Arc::clone(&self.service);
        let (fatal_tx, mut fatal_rx) = oneshot::channel();

        let shutdown = async move {
            tokio::select! {
                _ = stop => {}
                e = next_log_error(errors) => {
                    error!(error = %e, "transaction log failed, shutting down");
                    service.mark_unhealthy();
                    let _ = fatal_tx.send(e);
                }
            }
        };

        let router = server::router(Arc::clone(&self.service), self.start_time);
        let served = server::serve(listener, router, shutdown).await;
        let closed = self.shutdown().await;
        served?;
        closed?;

        match fatal_rx.try_recv() {
            Ok(e) => Err(LifecycleError::LogFailed(e)),
            Err(_) => Ok(()),
        }
    }

    /// Shutdown the daemon gracefully
    pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        // 1. Drain the write queue and stop the writer
        let closed = self.service.close().await;
        if let Err(e) = &closed {
            error!(error = %e, "failed to close transaction log");
        }

        // 2. Remove PID file; the lock itself is released on drop
        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        info!("Daemon shutdown complete");
        closed.map_err(LifecycleError::Log)
    }
}

/// Wait for the first writer failure. A stream that ends means the writer died.
async fn next_log_error(errors: Option<ErrorStream>) -> LogError {
    match errors {
        Some(mut errors) => errors.recv().await.unwrap_or(LogError::WriterStopped),
        None => std::future::pending().await,
    }
}

/// Open the configured backend without replaying it
pub async fn open_logger(config: &Config) -> Result<Box<dyn TransactionLogger>, LogError> {
    let logger: Box<dyn TransactionLogger> = match &config.backend {
        BackendConfig::File { path } => Box::new(FileTransactionLogger::with_capacity(
            path,
            config.queue_capacity,
        )?),
        BackendConfig::Sqlite { path } => Box::new(SqliteTransactionLogger::with_capacity(
            &SqliteParams::new(path),
            config.queue_capacity,
        )?),
        BackendConfig::Postgres(params) => Box::new(
            PostgresTransactionLogger::connect_with_capacity(params, config.queue_capacity).await?,
        ),
    };
    info!(
        backend = config.backend.kind(),
        location = %config.backend,
        "transaction log opened"
    );
    Ok(logger)
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<Daemon, LifecycleError> {
    // 1. Create state directory (needed for lock file and default log paths)
    std::fs::create_dir_all(&config.state_dir)?;

    // 2. Acquire lock file FIRST - prevents two daemons sharing one log
    let lock_file = acquire_lock(&config.lock_path)?;

    // 3. Open the backend
    let started = match open_logger(config).await {
        Ok(logger) => startup_inner(config, lock_file, logger).await,
        Err(e) => Err(e.into()),
    };
    if started.is_err() {
        // Clean up any resources created before failure
        cleanup_on_failure(config);
    }
    started
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(
    config: &Config,
    lock_file: File,
    mut logger: Box<dyn TransactionLogger>,
) -> Result<Daemon, LifecycleError> {
    // 4. Replay BEFORE binding (fail fast on corruption)
    let store = Arc::new(KeyValueStore::new());
    let report = RecoveryCoordinator::new()
        .initialize(logger.as_mut(), &store)
        .await?;
    info!(
        "Recovered state: {} keys from {} events (last sequence {})",
        store.len(),
        report.events_applied,
        report.last_sequence
    );

    let log_errors = logger.take_errors();
    let service = Arc::new(KvService::new(store, logger));

    // 5. Bind (LAST - only after recovery succeeded)
    let listener = match TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            if let Err(close_err) = service.close().await {
                warn!("Failed to close transaction log: {}", close_err);
            }
            return Err(LifecycleError::BindFailed(config.bind_addr, e));
        }
    };
    info!("Listening on {}", listener.local_addr()?);

    Ok(Daemon {
        config: config.clone(),
        lock_file,
        listener: Some(listener),
        service,
        log_errors,
        start_time: Instant::now(),
    })
}

fn acquire_lock(path: &Path) -> Result<File, LifecycleError> {
    let mut lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    // Write PID to lock file
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    Ok(lock_file)
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    // Remove PID/lock file
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

/// Replay the configured log into a scratch store without going live
pub async fn verify(config: &Config) -> Result<VerifyReport, LifecycleError> {
    let mut logger = open_logger(config).await?;
    let store = KeyValueStore::new();
    let report = RecoveryCoordinator::new()
        .replay(logger.as_mut(), &store)
        .await?;
    logger.close().await?;

    Ok(VerifyReport {
        events_applied: report.events_applied,
        last_sequence: report.last_sequence,
        keys: store.len(),
    })
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
