use backoff_replay::{BufferError, Clock, ManualClock, RetryBuffer, SystemClock, Timestamp};
use proptest::prelude::*;
use std::time::Duration;

const START: Timestamp = Timestamp::from_millis(1_700_000_000_000);

fn buffer_with_clock(capacity: usize) -> (RetryBuffer<u64, String>, ManualClock) {
    let clock = ManualClock::new(START);
    let buffer = RetryBuffer::builder()
        .capacity(capacity)
        .base_timeout(Duration::from_millis(1500))
        .with_clock(clock.clone())
        .build()
        .unwrap();
    (buffer, clock)
}

#[test]
fn max_size_evicts_first_inserted_of_shared_due_time() {
    let (buffer, _) = buffer_with_clock(10);
    for id in 0..11 {
        buffer.enqueue_unacked(id, format!("Message {id}"), 0);
    }
    assert_eq!(buffer.len(), 10);
    let popped = buffer.pop_earliest_due().unwrap();
    assert_eq!(popped.id, 1, "id 0 should have been evicted on overflow");
    assert_eq!(popped.payload, "Message 1");
}

#[test]
fn acked_ids_never_come_back() {
    let (buffer, _) = buffer_with_clock(10);
    for id in 0..11 {
        buffer.enqueue_unacked(id, format!("Message {id}"), 0);
    }
    for id in [0, 1, 2, 3, 5, 6] {
        buffer.acknowledge(&id);
    }
    assert_eq!(buffer.pop_earliest_due().unwrap().id, 4);
    let rest: Vec<u64> =
        std::iter::from_fn(|| buffer.pop_earliest_due().ok()).map(|m| m.id).collect();
    assert_eq!(rest, vec![7, 8, 9, 10]);
    assert_eq!(buffer.pop_earliest_due(), Err(BufferError::Empty));
}

#[test]
fn large_backoff_moves_peek_forward() {
    let (buffer, _) = buffer_with_clock(1000);
    let empty_peek = buffer.peek_earliest_due();
    assert_eq!(empty_peek, START.saturating_add(Duration::from_millis(1500)));

    buffer.enqueue_unacked(2, "fake_Message".into(), 2);
    let peek = buffer.peek_earliest_due();
    assert!(empty_peek < peek);
    assert_eq!(peek.as_secs_f64() - START.as_secs_f64(), 6.0);

    let (id, payload, attempt) = buffer.pop_earliest_due().unwrap().into_parts();
    assert_eq!((id, payload.as_str(), attempt), (2, "fake_Message", 2));
    assert!(buffer.is_empty());
}

#[test]
fn wall_clock_due_times_are_comparable_to_caller_reads() {
    let buffer: RetryBuffer<u64, ()> = RetryBuffer::new(8, Duration::from_millis(1500)).unwrap();
    let before = SystemClock.now();
    let due = buffer.enqueue_unacked(1, (), 0);
    let after = SystemClock.now();
    assert!(due >= before.saturating_add(Duration::from_millis(1500)));
    assert!(due <= after.saturating_add(Duration::from_millis(1500)));
}

#[test]
fn redelivery_cycle_grows_backoff() {
    let (buffer, clock) = buffer_with_clock(16);
    buffer.enqueue_unacked(42, "m".into(), 0);

    let mut waits = Vec::new();
    for _ in 0..4 {
        let now = clock.now();
        let due = buffer.peek_earliest_due();
        waits.push(due.saturating_duration_since(now));
        clock.set(due);
        let msg = buffer.pop_due().expect("due after advancing to peek");
        buffer.enqueue_unacked(msg.id, msg.payload.clone(), msg.next_attempt());
    }
    assert_eq!(
        waits,
        vec![
            Duration::from_millis(1500),
            Duration::from_millis(3000),
            Duration::from_millis(6000),
            Duration::from_millis(12000),
        ]
    );
    assert_eq!(buffer.attempt_of(&42), Some(4));
}

#[derive(Debug, Clone)]
enum Op {
    Enqueue { id: u8, attempt: u8 },
    Ack { id: u8 },
    Pop,
    Advance { millis: u16 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..24, 0u8..6).prop_map(|(id, attempt)| Op::Enqueue { id, attempt }),
        2 => (0u8..24).prop_map(|id| Op::Ack { id }),
        1 => Just(Op::Pop),
        1 => (0u16..5_000).prop_map(|millis| Op::Advance { millis }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    })]

    /// Property: capacity is never exceeded and peek/pop always agree on the minimum due-time.
    #[test]
    fn capacity_and_peek_pop_agree(
        capacity in 1usize..12,
        ops in prop::collection::vec(op_strategy(), 1..80)
    ) {
        let (buffer, clock) = buffer_with_clock(capacity);
        let mut model: std::collections::HashMap<u64, Timestamp> = Default::default();

        for op in ops {
            match op {
                Op::Enqueue { id, attempt } => {
                    let was_full = model.len() >= capacity;
                    let evicted_before = buffer.evicted_count();
                    let due = buffer.enqueue_unacked(u64::from(id), String::new(), u32::from(attempt));
                    let expected = clock.now().saturating_add(
                        Duration::from_millis(1500) * 2u32.pow(u32::from(attempt)),
                    );
                    prop_assert_eq!(due, expected);
                    prop_assert_eq!(buffer.evicted_count() - evicted_before, u64::from(was_full));
                    model.retain(|id, _| buffer.contains(id));
                    model.insert(u64::from(id), due);
                }
                Op::Ack { id } => {
                    let tracked = model.remove(&u64::from(id)).is_some();
                    prop_assert_eq!(buffer.acknowledge(&u64::from(id)), tracked);
                }
                Op::Pop => {
                    let peek = buffer.peek_earliest_due();
                    match buffer.pop_earliest_due() {
                        Ok(msg) => {
                            prop_assert_eq!(msg.due, peek);
                            prop_assert_eq!(Some(&peek), model.values().min());
                            model.remove(&msg.id);
                        }
                        Err(err) => {
                            prop_assert!(err.is_empty());
                            prop_assert!(model.is_empty());
                        }
                    }
                }
                Op::Advance { millis } => clock.advance(Duration::from_millis(u64::from(millis))),
            }
            prop_assert!(buffer.len() <= capacity);
            prop_assert_eq!(buffer.len(), model.len());
            if let Some(min) = model.values().min() {
                prop_assert_eq!(buffer.peek_earliest_due(), *min);
            }
        }
    }

    /// Property: higher attempts are due strictly later when enqueued at the same instant,
    /// including delays of months and years.
    #[test]
    fn due_time_grows_with_attempt(k1 in 0u32..46, gap in 1u32..8) {
        let (buffer, _) = buffer_with_clock(4);
        let low = buffer.enqueue_unacked(1, String::new(), k1);
        let high = buffer.enqueue_unacked(2, String::new(), k1 + gap);
        prop_assert!(high > low, "attempt {} not later than attempt {}", k1 + gap, k1);
        let expected = 1500u64 << k1;
        prop_assert_eq!(low.saturating_duration_since(START), Duration::from_millis(expected));
    }

    /// Property: acknowledging twice, or acknowledging unknown ids, leaves pop order untouched.
    #[test]
    fn ack_is_idempotent(ids in prop::collection::vec(0u64..50, 1..20), stray in 100u64..200) {
        let (a, _) = buffer_with_clock(64);
        let (b, _) = buffer_with_clock(64);
        for id in &ids {
            a.enqueue_unacked(*id, String::new(), 0);
            b.enqueue_unacked(*id, String::new(), 0);
        }
        let first = ids[0];
        a.acknowledge(&first);
        b.acknowledge(&first);
        b.acknowledge(&first);
        b.acknowledge(&stray);

        let drain = |buf: &RetryBuffer<u64, String>| {
            std::iter::from_fn(|| buf.pop_earliest_due().ok()).map(|m| m.id).collect::<Vec<_>>()
        };
        prop_assert_eq!(drain(&a), drain(&b));
    }
}
