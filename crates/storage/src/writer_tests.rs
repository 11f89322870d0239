// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct MemorySink {
    events: Arc<Mutex<Vec<Event>>>,
    fail_after: Option<usize>,
}

impl EventSink for MemorySink {
    fn append(&mut self, event: Event) -> Result<u64, LogError> {
        let mut events = self.events.lock().unwrap();
        if self.fail_after == Some(events.len()) {
            return Err(LogError::Io(std::io::Error::other("disk full")));
        }
        let sequence = events.len() as u64 + 1;
        events.push(event.with_sequence(sequence));
        Ok(sequence)
    }
}

#[tokio::test]
async fn send_before_start_is_rejected() {
    let queue = WriteQueue::new(4);

    let result = queue.send(Event::put("a", "1")).await;

    assert!(matches!(result, Err(LogError::NotRunning)));
}

#[tokio::test]
async fn close_drains_queued_events_in_order() {
    let sink = MemorySink::default();
    let mut queue = WriteQueue::new(2);
    queue.start(sink.clone(), "memory").unwrap();

    for i in 0..10 {
        queue.send(Event::put(format!("k{i}"), "v")).await.unwrap();
    }
    queue.close().await.unwrap();

    let events = sink.events.lock().unwrap();
    let keys: Vec<_> = events.iter().map(|e| e.key.clone()).collect();
    let expected: Vec<_> = (0..10).map(|i| format!("k{i}")).collect();
    assert_eq!(keys, expected);
}

#[tokio::test]
async fn start_twice_fails() {
    let mut queue = WriteQueue::new(1);
    queue.start(MemorySink::default(), "memory").unwrap();

    let result = queue.start(MemorySink::default(), "memory");

    assert!(matches!(result, Err(LogError::AlreadyRunning)));
    queue.close().await.unwrap();
}

#[tokio::test]
async fn send_after_close_fails() {
    let mut queue = WriteQueue::new(1);
    queue.start(MemorySink::default(), "memory").unwrap();
    queue.close().await.unwrap();

    assert!(matches!(
        queue.send(Event::delete("a")).await,
        Err(LogError::Closed)
    ));
    assert!(matches!(
        queue.start(MemorySink::default(), "memory"),
        Err(LogError::Closed)
    ));
}

#[tokio::test]
async fn sink_failure_is_reported_once_then_writes_stop() {
    let sink = MemorySink {
        fail_after: Some(1),
        ..MemorySink::default()
    };
    let mut queue = WriteQueue::new(1);
    queue.start(sink.clone(), "memory").unwrap();
    let mut errors = queue.take_errors().unwrap();

    queue.send(Event::put("a", "1")).await.unwrap();
    queue.send(Event::put("b", "2")).await.unwrap();

    let error = errors.recv().await.unwrap();
    assert!(matches!(error, LogError::Io(_)));
    assert!(errors.recv().await.is_none());
    assert!(matches!(
        queue.send(Event::put("c", "3")).await,
        Err(LogError::WriterStopped)
    ));
    assert_eq!(sink.events.lock().unwrap().len(), 1);
    queue.close().await.unwrap();
}

#[tokio::test]
async fn errors_can_be_taken_once() {
    let mut queue = WriteQueue::new(1);
    assert!(queue.take_errors().is_none());

    queue.start(MemorySink::default(), "memory").unwrap();

    assert!(queue.take_errors().is_some());
    assert!(queue.take_errors().is_none());
    queue.close().await.unwrap();
}
