#![cfg(feature = "telemetry-json")]

use backoff_replay::telemetry::MemorySink;
use backoff_replay::{ManualClock, RetryBuffer, Timestamp};
use serde_json::{json, Value};
use std::time::Duration;

#[test]
fn buffer_run_serializes_every_event() {
    let sink = MemorySink::new();
    let buffer: RetryBuffer<u64, &str> = RetryBuffer::builder()
        .capacity(1)
        .base_timeout(Duration::from_millis(1500))
        .with_clock(ManualClock::new(Timestamp::from_millis(0)))
        .with_sink(sink.clone())
        .build()
        .unwrap();

    buffer.enqueue_unacked(1, "first", 0);
    buffer.enqueue_unacked(2, "second", 2);
    buffer.enqueue_unacked(2, "second", 3);
    buffer.pop_earliest_due().unwrap();

    let lines: Vec<String> = sink.events().iter().map(|e| e.to_json().to_string()).collect();
    let parsed: Vec<Value> =
        lines.iter().map(|line| serde_json::from_str(line).unwrap()).collect();

    assert_eq!(
        parsed,
        vec![
            json!({ "kind": "enqueued", "attempt": 0, "due_ms": 1500, "tracked": 1 }),
            json!({ "kind": "evicted", "attempt": 0, "due_ms": 1500, "policy": "earliest_due" }),
            json!({ "kind": "enqueued", "attempt": 2, "due_ms": 6000, "tracked": 1 }),
            json!({ "kind": "evicted", "attempt": 2, "due_ms": 6000, "policy": "earliest_due" }),
            json!({ "kind": "enqueued", "attempt": 3, "due_ms": 12000, "tracked": 1 }),
            json!({ "kind": "popped", "attempt": 3, "due_ms": 12000 }),
        ]
    );
}
