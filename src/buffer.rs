//! Bounded retry buffer.
//!
//! Tracks dispatched-but-unacknowledged messages and tells the caller when each one becomes
//! eligible for redelivery.
//!
//! Semantics:
//! - `enqueue_unacked(id, payload, attempt)` files the message at
//!   `now + 2^attempt * base_timeout`. Enqueuing an id that is already tracked replaces its
//!   record (last write wins); this is also how a redelivered message is re-armed, with
//!   `attempt + 1`.
//! - At capacity, an enqueue first discards exactly one tracked message chosen by the
//!   configured [`EvictionPolicy`]. Nothing is returned for it; it shows up in
//!   [`BufferStats::evicted`] and as a [`BufferEvent::Evicted`].
//! - `acknowledge(id)` forgets the message. Unknown ids are ignored.
//! - `peek_earliest_due()` is a polling hint: the smallest due-time, or `now + base_timeout`
//!   when nothing is tracked.
//! - `pop_earliest_due()` removes and returns the message with the smallest due-time, earliest
//!   enqueued first among equal due-times. Popping an empty buffer is an error.
//!
//! Concurrency: one mutex per buffer serializes every operation, reads included. Clones share
//! the same buffer. Sinks run after the lock is released.
//!
//! Example
//! ```rust
//! use backoff_replay::RetryBuffer;
//! use std::time::Duration;
//!
//! let buffer = RetryBuffer::new(1000, Duration::from_millis(1500)).unwrap();
//! buffer.enqueue_unacked(7u64, "payload", 0);
//! assert_eq!(buffer.len(), 1);
//!
//! // no ack arrived in time: take it back, redeliver, and re-arm one attempt later
//! let msg = buffer.pop_earliest_due().unwrap();
//! buffer.enqueue_unacked(msg.id, msg.payload, msg.attempt + 1);
//!
//! assert!(buffer.acknowledge(&7));
//! assert!(buffer.is_empty());
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::debug;

use crate::clock::{Clock, Timestamp};
use crate::config::{RetryBufferBuilder, RetryBufferConfig};
use crate::due_index::DueIndex;
use crate::error::{BufferError, ConfigError};
use crate::eviction::EvictionPolicy;
use crate::telemetry::{BufferEvent, EventSink, NullSink};

/// A message handed back by the buffer: popped for redelivery or evicted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unacked<K, P> {
    /// Caller-supplied message id.
    pub id: K,
    /// Opaque payload, handed back untouched.
    pub payload: P,
    /// Attempt number the message was enqueued with.
    pub attempt: u32,
    /// Due-time it was filed under.
    pub due: Timestamp,
}

impl<K, P> Unacked<K, P> {
    /// Attempt number to use when re-enqueuing after redelivery.
    pub fn next_attempt(&self) -> u32 {
        self.attempt.saturating_add(1)
    }

    pub fn into_parts(self) -> (K, P, u32) {
        (self.id, self.payload, self.attempt)
    }
}

/// Point-in-time counters for a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BufferStats {
    /// Messages currently tracked
    pub tracked: usize,
    /// Configured capacity
    pub capacity: usize,
    /// Enqueues of ids that were not tracked
    pub enqueued: u64,
    /// Enqueues that replaced a tracked id
    pub replaced: u64,
    /// Acknowledgments of tracked ids
    pub acknowledged: u64,
    /// Messages handed back by pops
    pub popped: u64,
    /// Messages discarded at capacity
    pub evicted: u64,
}

#[derive(Debug)]
struct Record<P> {
    payload: P,
    attempt: u32,
    seq: u64,
}

#[derive(Debug)]
struct State<K, P> {
    records: HashMap<K, Record<P>>,
    due: DueIndex<K>,
    // enqueue sequence -> id; drives `EvictionPolicy::OldestInserted`
    inserted: BTreeMap<u64, K>,
    next_seq: u64,
    stats: BufferStats,
}

impl<K, P> State<K, P>
where
    K: Hash + Eq + Clone,
{
    fn new(capacity: usize) -> Self {
        Self {
            records: HashMap::new(),
            due: DueIndex::new(),
            inserted: BTreeMap::new(),
            next_seq: 0,
            stats: BufferStats { capacity, ..BufferStats::default() },
        }
    }

    fn insert(&mut self, id: K, payload: P, attempt: u32, due: Timestamp) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.due.insert(id.clone(), due);
        self.inserted.insert(seq, id.clone());
        self.records.insert(id, Record { payload, attempt, seq });
    }

    fn remove(&mut self, id: &K) -> Option<Unacked<K, P>> {
        let due = self.due.remove(id)?;
        let (id, record) = self.records.remove_entry(id)?;
        self.inserted.remove(&record.seq);
        Some(Unacked { id, payload: record.payload, attempt: record.attempt, due })
    }

    fn pop_earliest(&mut self) -> Option<Unacked<K, P>> {
        let (id, due) = self.due.pop_earliest()?;
        let record = self.records.remove(&id)?;
        self.inserted.remove(&record.seq);
        Some(Unacked { id, payload: record.payload, attempt: record.attempt, due })
    }

    fn evict(&mut self, policy: EvictionPolicy) -> Option<Unacked<K, P>> {
        match policy {
            EvictionPolicy::EarliestDue => self.pop_earliest(),
            EvictionPolicy::OldestInserted => {
                let oldest = self.inserted.first_key_value().map(|(_, id)| id.clone())?;
                self.remove(&oldest)
            }
        }
    }

    fn len(&self) -> usize {
        self.due.len()
    }
}

/// Bounded, time-ordered buffer of unacknowledged messages.
///
/// Clones share the same underlying state via `Arc`; independent buffers never contend.
pub struct RetryBuffer<K, P> {
    state: Arc<Mutex<State<K, P>>>,
    config: RetryBufferConfig,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
}

impl<K, P> Clone for RetryBuffer<K, P> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            config: self.config.clone(),
            clock: self.clock.clone(),
            sink: self.sink.clone(),
        }
    }
}

impl<K, P> fmt::Debug for RetryBuffer<K, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryBuffer")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("sink", &self.sink)
            .finish_non_exhaustive()
    }
}

impl<K, P> RetryBuffer<K, P>
where
    K: Hash + Eq + Clone,
{
    /// Buffer holding at most `capacity` messages, with exponential backoff unit `base_timeout`
    /// and the wall clock.
    pub fn new(capacity: usize, base_timeout: Duration) -> Result<Self, ConfigError> {
        let config = RetryBufferConfig::new(capacity, base_timeout)?;
        Ok(Self::with_config(config))
    }

    /// Buffer from an already validated config, using the wall clock and no telemetry.
    pub fn with_config(config: RetryBufferConfig) -> Self {
        Self::from_parts(config, Arc::new(crate::clock::SystemClock), Arc::new(NullSink))
    }

    pub fn builder() -> RetryBufferBuilder<K, P> {
        RetryBufferBuilder::new()
    }

    pub(crate) fn from_parts(
        config: RetryBufferConfig,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        debug!(
            target: "backoff_replay::buffer",
            capacity = config.capacity(),
            base_timeout = ?config.base_timeout(),
            max_backoff = ?config.backoff().max(),
            eviction = %config.eviction(),
            "retry buffer created"
        );
        Self {
            state: Arc::new(Mutex::new(State::new(config.capacity()))),
            config,
            clock,
            sink,
        }
    }

    /// Override the clock (useful for deterministic tests).
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Attach a telemetry sink.
    pub fn with_sink<S: EventSink + 'static>(mut self, sink: S) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    fn lock(&self) -> MutexGuard<'_, State<K, P>> {
        // indices are consistent between operations, so a poisoned lock is safe to reuse
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, events: &[BufferEvent]) {
        for event in events {
            self.sink.emit(event);
        }
    }

    /// Start tracking `id`, due for redelivery `2^attempt * base_timeout` from now.
    ///
    /// At capacity one tracked message is evicted first, even when `id` is already tracked.
    /// An existing record for `id` is replaced. Returns the due-time assigned.
    pub fn enqueue_unacked(&self, id: K, payload: P, attempt: u32) -> Timestamp {
        let delay = self.config.jitter().apply(self.config.backoff().delay(attempt));
        let due = self.clock.now().saturating_add(delay);

        let mut events = Vec::with_capacity(2);
        {
            let mut state = self.lock();
            if state.len() >= self.config.capacity() {
                let policy = self.config.eviction();
                if let Some(evicted) = state.evict(policy) {
                    state.stats.evicted += 1;
                    debug!(
                        target: "backoff_replay::buffer",
                        attempt = evicted.attempt,
                        due = %evicted.due,
                        policy = %policy,
                        "message evicted at capacity"
                    );
                    events.push(BufferEvent::Evicted {
                        attempt: evicted.attempt,
                        due: evicted.due,
                        policy,
                    });
                }
            }

            let replaced = state.remove(&id).is_some();
            state.insert(id, payload, attempt, due);
            if replaced {
                state.stats.replaced += 1;
                debug!(target: "backoff_replay::buffer", attempt, due = %due, "tracked id replaced; last write wins");
                events.push(BufferEvent::Replaced { attempt, due });
            } else {
                state.stats.enqueued += 1;
                events.push(BufferEvent::Enqueued { attempt, due, tracked: state.len() });
            }
        }
        self.emit(&events);
        due
    }

    /// Stop tracking `id`. Returns whether it was tracked; unknown ids are a no-op.
    pub fn acknowledge(&self, id: &K) -> bool {
        let tracked = {
            let mut state = self.lock();
            if state.remove(id).is_none() {
                return false;
            }
            state.stats.acknowledged += 1;
            state.len()
        };
        self.emit(&[BufferEvent::Acknowledged { tracked }]);
        true
    }

    /// Smallest due-time among tracked messages, or `now + base_timeout` when empty.
    ///
    /// The empty-buffer value is only a hint for when to look again; no message is due then.
    pub fn peek_earliest_due(&self) -> Timestamp {
        let state = self.lock();
        match state.due.earliest_due() {
            Some(due) => due,
            None => self.clock.now().saturating_add(self.config.base_timeout()),
        }
    }

    /// Remove and return the message with the smallest due-time (earliest enqueued first among
    /// equal due-times), whether or not it is due yet.
    ///
    /// Returns [`BufferError::Empty`] when nothing is tracked.
    pub fn pop_earliest_due(&self) -> Result<Unacked<K, P>, BufferError> {
        let popped = {
            let mut state = self.lock();
            let popped = state.pop_earliest().ok_or(BufferError::Empty)?;
            state.stats.popped += 1;
            popped
        };
        self.emit(&[BufferEvent::Popped { attempt: popped.attempt, due: popped.due }]);
        Ok(popped)
    }

    /// Like [`pop_earliest_due`](Self::pop_earliest_due), but only if that message is due now.
    pub fn pop_due(&self) -> Option<Unacked<K, P>> {
        let now = self.clock.now();
        let popped = {
            let mut state = self.lock();
            if state.due.earliest_due()? > now {
                return None;
            }
            let popped = state.pop_earliest()?;
            state.stats.popped += 1;
            popped
        };
        self.emit(&[BufferEvent::Popped { attempt: popped.attempt, due: popped.due }]);
        Some(popped)
    }

    /// Pop every message that is due now, in pop order.
    pub fn drain_due(&self) -> Vec<Unacked<K, P>> {
        let now = self.clock.now();
        let drained = {
            let mut state = self.lock();
            let mut drained = Vec::new();
            while state.due.earliest_due().is_some_and(|due| due <= now) {
                match state.pop_earliest() {
                    Some(popped) => drained.push(popped),
                    None => break,
                }
            }
            state.stats.popped += drained.len() as u64;
            drained
        };
        let events: Vec<BufferEvent> = drained
            .iter()
            .map(|popped| BufferEvent::Popped { attempt: popped.attempt, due: popped.due })
            .collect();
        self.emit(&events);
        drained
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity()
    }

    pub fn contains(&self, id: &K) -> bool {
        self.lock().records.contains_key(id)
    }

    /// Attempt number `id` was last enqueued with.
    pub fn attempt_of(&self, id: &K) -> Option<u32> {
        self.lock().records.get(id).map(|record| record.attempt)
    }

    pub fn due_time_of(&self, id: &K) -> Option<Timestamp> {
        self.lock().due.due_of(id)
    }

    pub fn stats(&self) -> BufferStats {
        let state = self.lock();
        BufferStats { tracked: state.len(), ..state.stats }
    }

    /// Messages discarded at capacity since the buffer was built.
    pub fn evicted_count(&self) -> u64 {
        self.lock().stats.evicted
    }

    pub fn config(&self) -> &RetryBufferConfig {
        &self.config
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        let state = self.lock();
        state.due.assert_consistent();
        assert_eq!(state.records.len(), state.due.len());
        assert_eq!(state.records.len(), state.inserted.len());
        assert!(state.records.len() <= self.config.capacity());
        for (seq, id) in &state.inserted {
            assert_eq!(state.records.get(id).map(|r| r.seq), Some(*seq));
        }
    }
}
