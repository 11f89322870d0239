// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mutation events recorded in the transaction log

use std::fmt;

/// Kind of mutation an [`Event`] records
///
/// The discriminants are the on-disk ordinals. Zero is deliberately unused so
/// that an unset field can never decode as a valid kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventKind {
    Delete = 1,
    Put = 2,
}

impl EventKind {
    /// The small ordinal written to the log
    pub fn ordinal(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for EventKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(EventKind::Delete),
            2 => Ok(EventKind::Put),
            other => Err(other),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Delete => write!(f, "delete"),
            EventKind::Put => write!(f, "put"),
        }
    }
}

/// One durable mutation
///
/// Events handed to a logger carry sequence 0; the logger (or its storage
/// engine) assigns the real sequence when the event is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub sequence: u64,
    pub kind: EventKind,
    pub key: String,
    /// Empty for deletes
    pub value: String,
}

impl Event {
    /// An unsequenced put
    pub fn put(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            sequence: 0,
            kind: EventKind::Put,
            key: key.into(),
            value: value.into(),
        }
    }

    /// An unsequenced delete
    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            sequence: 0,
            kind: EventKind::Delete,
            key: key.into(),
            value: String::new(),
        }
    }

    /// Same event stamped with a sequence number
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
