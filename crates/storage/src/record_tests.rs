// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn encode_put_layout() {
    let line = encode_line(&Event::put("a", "1").with_sequence(1));
    assert_eq!(line, "1\t2\ta\t1\n");
}

#[test]
fn encode_delete_has_empty_value_field() {
    let line = encode_line(&Event::delete("b").with_sequence(2));
    assert_eq!(line, "2\t1\tb\t\n");
}

#[test]
fn decode_put() {
    let event = decode_line("3\t2\tkey\tsome value\n", 1).unwrap();

    assert_eq!(event, Event::put("key", "some value").with_sequence(3));
}

#[test]
fn decode_delete() {
    let event = decode_line("4\t1\tkey\t", 1).unwrap();

    assert_eq!(event, Event::delete("key").with_sequence(4));
}

#[test]
fn decode_tolerates_crlf() {
    let event = decode_line("1\t2\ta\tb\r\n", 1).unwrap();
    assert_eq!(event.value, "b");
}

#[test]
fn special_characters_survive_a_round_trip() {
    let event = Event::put("tab\tkey", "line one\nline two\\ and \r").with_sequence(9);

    let line = encode_line(&event);

    assert_eq!(line.matches('\n').count(), 1);
    assert_eq!(line.matches('\t').count(), 3);
    assert_eq!(decode_line(&line, 1).unwrap(), event);
}

#[parameterized(
    too_few_fields = { "1\t2\ta" },
    too_many_fields = { "1\t2\ta\tb\tc" },
    bad_sequence = { "x\t2\ta\tb" },
    negative_sequence = { "-1\t2\ta\tb" },
    zero_kind = { "1\t0\ta\tb" },
    unknown_kind = { "1\t9\ta\tb" },
    empty_key = { "1\t2\t\tb" },
    bad_escape = { "1\t2\ta\\q\tb" },
    dangling_escape = { "1\t2\ta\tb\\" },
)]
fn decode_rejects(text: &str) {
    let result = decode_line(text, 7);
    assert!(matches!(result, Err(LogError::Corrupted { line: 7, .. })));
}
