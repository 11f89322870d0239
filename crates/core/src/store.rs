// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory key-value state
//!
//! A single map behind one reader-writer lock. Every operation holds the
//! lock for exactly one map operation and never performs I/O while holding it.

use crate::event::{Event, EventKind};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

/// Errors returned by store lookups
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("no such key")]
    NoSuchKey,
}

/// Concurrent string-to-string map holding the current state
#[derive(Debug, Default)]
pub struct KeyValueStore {
    map: RwLock<HashMap<String, String>>,
}

impl KeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a key
    pub fn put(&self, key: &str, value: &str) {
        let mut map = self.map.write().unwrap_or_else(|e| e.into_inner());
        map.insert(key.to_string(), value.to_string());
    }

    /// Current value of a key
    pub fn get(&self, key: &str) -> Result<String, StoreError> {
        let map = self.map.read().unwrap_or_else(|e| e.into_inner());
        map.get(key).cloned().ok_or(StoreError::NoSuchKey)
    }

    /// Remove a key. Removing an absent key is a no-op.
    pub fn delete(&self, key: &str) {
        let mut map = self.map.write().unwrap_or_else(|e| e.into_inner());
        map.remove(key);
    }

    /// Apply a logged event
    pub fn apply(&self, event: &Event) {
        match event.kind {
            EventKind::Put => self.put(&event.key, &event.value),
            EventKind::Delete => self.delete(&event.key),
        }
    }

    /// Number of keys currently held
    pub fn len(&self) -> usize {
        self.map.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Point-in-time copy of the whole map
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.map.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
