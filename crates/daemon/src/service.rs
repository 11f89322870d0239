// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Key-value service: the only code that pairs store mutations with log writes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tkv_core::{KeyValueStore, LogError, StoreError, TransactionLogger};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error};

/// Service errors surfaced to request handlers
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no such key")]
    NotFound,

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("transaction log unavailable")]
    LogUnavailable,

    #[error("transaction log error: {0}")]
    Log(#[source] LogError),
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NoSuchKey => ServiceError::NotFound,
        }
    }
}

/// Snapshot for the status endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub keys: usize,
    pub last_sequence: u64,
    pub healthy: bool,
}

/// Store plus its transaction log
///
/// Writes hold the gate from enqueue through apply, so the store sees
/// mutations in exactly the order they were persisted. Status reads share
/// the logger with in-flight writes and only wait for `close`.
pub struct KvService {
    store: Arc<KeyValueStore>,
    write_gate: Mutex<()>,
    logger: RwLock<Box<dyn TransactionLogger>>,
    healthy: AtomicBool,
}

impl KvService {
    /// Wrap a store and a logger that is already running
    pub fn new(store: Arc<KeyValueStore>, logger: Box<dyn TransactionLogger>) -> Self {
        Self {
            store,
            write_gate: Mutex::new(()),
            logger: RwLock::new(logger),
            healthy: AtomicBool::new(true),
        }
    }

    pub fn get(&self, key: &str) -> Result<String, ServiceError> {
        Ok(self.store.get(key)?)
    }

    pub async fn put(&self, key: &str, value: &str) -> Result<(), ServiceError> {
        check_key(key)?;
        let _gate = self.write_gate.lock().await;
        let logger = self.logger.read().await;
        self.check_healthy()?;
        logger
            .write_put(key, value)
            .await
            .map_err(|e| self.log_failure(e))?;
        self.store.put(key, value);
        debug!(key, "put applied");
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<(), ServiceError> {
        check_key(key)?;
        let _gate = self.write_gate.lock().await;
        let logger = self.logger.read().await;
        self.check_healthy()?;
        logger
            .write_delete(key)
            .await
            .map_err(|e| self.log_failure(e))?;
        self.store.delete(key);
        debug!(key, "delete applied");
        Ok(())
    }

    /// Refuse all further writes. Reads keep working.
    pub fn mark_unhealthy(&self) {
        self.healthy.store(false, Ordering::Release);
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    pub async fn status(&self) -> Status {
        let last_sequence = self.logger.read().await.last_sequence();
        Status {
            keys: self.store.len(),
            last_sequence,
            healthy: self.is_healthy(),
        }
    }

    /// Drain queued writes and stop the background writer
    pub async fn close(&self) -> Result<(), LogError> {
        let mut logger = self.logger.write().await;
        self.mark_unhealthy();
        logger.close().await
    }

    fn check_healthy(&self) -> Result<(), ServiceError> {
        if self.is_healthy() {
            Ok(())
        } else {
            Err(ServiceError::LogUnavailable)
        }
    }

    fn log_failure(&self, e: LogError) -> ServiceError {
        match e {
            LogError::WriterStopped | LogError::WriterPanicked | LogError::Closed => {
                error!(error = %e, "transaction log unavailable");
                self.mark_unhealthy();
                ServiceError::LogUnavailable
            }
            LogError::InvalidEvent(reason) => ServiceError::InvalidKey(reason),
            other => ServiceError::Log(other),
        }
    }
}

fn check_key(key: &str) -> Result<(), ServiceError> {
    if key.is_empty() {
        return Err(ServiceError::InvalidKey("key must not be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
