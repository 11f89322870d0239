// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Row checks shared by the ordered-table backends
//!
//! Both engines keep one row per event in a `transactions` table keyed by a
//! database-assigned sequence, and replay it with `ORDER BY sequence`.

use tkv_core::{Event, EventKind, LogError};

pub(crate) const TABLE: &str = "transactions";

/// Turns raw rows into events, in replay order
pub(crate) struct RowReader {
    row: u64,
    previous: u64,
}

impl RowReader {
    pub(crate) fn new() -> Self {
        Self {
            row: 0,
            previous: 0,
        }
    }

    /// Validate one row. Rows are counted from 1 for error reports.
    pub(crate) fn decode(
        &mut self,
        sequence: i64,
        ordinal: i64,
        key: String,
        value: String,
    ) -> Result<Event, LogError> {
        self.row += 1;
        let line = self.row;
        let corrupted = |reason: String| LogError::Corrupted { line, reason };

        let sequence = u64::try_from(sequence)
            .map_err(|_| corrupted(format!("invalid sequence {}", sequence)))?;
        let kind = u8::try_from(ordinal)
            .ok()
            .and_then(|ordinal| EventKind::try_from(ordinal).ok())
            .ok_or_else(|| corrupted(format!("invalid event kind {}", ordinal)))?;
        if key.is_empty() {
            return Err(corrupted("empty key".to_string()));
        }
        if sequence <= self.previous {
            return Err(LogError::OutOfSequence {
                previous: self.previous,
                found: sequence,
            });
        }
        self.previous = sequence;

        Ok(Event {
            sequence,
            kind,
            key,
            value,
        })
    }
}

#[cfg(test)]
#[path = "table_tests.rs"]
mod tests;
