// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line format of the sequential log file
//!
//! One record per line, four tab-separated fields:
//!
//! ```text
//! <sequence>\t<kind ordinal>\t<key>\t<value>\n
//! ```
//!
//! Backslash, tab, newline and carriage return inside key or value are
//! escaped so every record stays on one line with exactly four fields.

use tkv_core::{Event, EventKind, LogError};

const DELIMITER: char = '\t';

/// Render an event as one newline-terminated record
pub fn encode_line(event: &Event) -> String {
    format!(
        "{}\t{}\t{}\t{}\n",
        event.sequence,
        event.kind.ordinal(),
        escape(&event.key),
        escape(&event.value)
    )
}

/// Parse one record. `line` is the 1-based line number used in errors.
pub fn decode_line(text: &str, line: u64) -> Result<Event, LogError> {
    let corrupted = |reason: String| LogError::Corrupted { line, reason };

    let text = text.strip_suffix('\n').unwrap_or(text);
    let text = text.strip_suffix('\r').unwrap_or(text);
    let fields: Vec<&str> = text.split(DELIMITER).collect();
    let [sequence, kind, key, value] = fields[..] else {
        return Err(corrupted(format!(
            "expected 4 fields, found {}",
            fields.len()
        )));
    };

    let sequence: u64 = sequence
        .parse()
        .map_err(|_| corrupted(format!("invalid sequence {:?}", sequence)))?;
    let kind = kind
        .parse::<u8>()
        .ok()
        .and_then(|ordinal| EventKind::try_from(ordinal).ok())
        .ok_or_else(|| corrupted(format!("invalid event kind {:?}", kind)))?;
    let key = unescape(key).map_err(&corrupted)?;
    if key.is_empty() {
        return Err(corrupted("empty key".to_string()));
    }
    let value = unescape(value).map_err(&corrupted)?;

    Ok(Event {
        sequence,
        kind,
        key,
        value,
    })
}

fn escape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for c in field.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(field: &str) -> Result<String, String> {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => return Err(format!("invalid escape \\{}", other)),
            None => return Err("dangling escape".to_string()),
        }
    }
    Ok(out)
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
