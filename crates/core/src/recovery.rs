// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup recovery: replay the log into the store, then go live
//!
//! ```text
//! Replaying ──(both streams drained, no error)──► LiveQueueOpen ──► Running
//! ```
//!
//! Any replay error aborts recovery; the caller must not serve traffic.

use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info};

use crate::logger::{LogError, TransactionLogger};
use crate::store::KeyValueStore;

/// Recovery errors. Both are fatal to startup.
#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("replay aborted: {0}")]
    Replay(#[source] LogError),
    #[error("cannot open live write queue: {0}")]
    Start(#[source] LogError),
}

/// Where the coordinator is in its startup sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryPhase {
    Replaying,
    LiveQueueOpen,
    Running,
}

/// Outcome of a completed replay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    pub events_applied: u64,
    pub last_sequence: u64,
}

/// Drives a logger from replay into live mode
#[derive(Debug)]
pub struct RecoveryCoordinator {
    phase: RecoveryPhase,
}

impl RecoveryCoordinator {
    pub fn new() -> Self {
        Self {
            phase: RecoveryPhase::Replaying,
        }
    }

    pub fn phase(&self) -> RecoveryPhase {
        self.phase
    }

    /// Replay everything into `store`, then open the live write queue
    pub async fn initialize(
        &mut self,
        logger: &mut dyn TransactionLogger,
        store: &KeyValueStore,
    ) -> Result<RecoveryReport, RecoveryError> {
        let report = self.replay(logger, store).await?;

        self.phase = RecoveryPhase::LiveQueueOpen;
        logger.run().map_err(RecoveryError::Start)?;
        self.phase = RecoveryPhase::Running;

        info!(
            events = report.events_applied,
            last_sequence = report.last_sequence,
            "transaction log live"
        );
        Ok(report)
    }

    /// Replay without going live (used to verify a log)
    pub async fn replay(
        &mut self,
        logger: &mut dyn TransactionLogger,
        store: &KeyValueStore,
    ) -> Result<RecoveryReport, RecoveryError> {
        self.phase = RecoveryPhase::Replaying;
        let started = Instant::now();

        let (mut events, mut errors) = logger.read_events().map_err(RecoveryError::Replay)?;
        let mut events_open = true;
        let mut errors_open = true;
        let mut events_applied = 0u64;

        loop {
            tokio::select! {
                biased;

                err = errors.recv(), if errors_open => match err {
                    Some(e) => return Err(RecoveryError::Replay(e)),
                    None => errors_open = false,
                },

                event = events.recv(), if events_open => match event {
                    Some(event) => {
                        store.apply(&event);
                        events_applied += 1;
                    }
                    None => events_open = false,
                },

                else => break,
            }
        }

        let report = RecoveryReport {
            events_applied,
            last_sequence: logger.last_sequence(),
        };
        debug!(
            events = report.events_applied,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "replay drained"
        );
        Ok(report)
    }
}

impl Default for RecoveryCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
