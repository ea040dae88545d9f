//! Due-time multimap.
//!
//! Groups ids by the exact instant they become due. Buckets are ordered by time; ids inside a
//! bucket keep insertion order, which is the tie-break for both pops and evictions. A reverse
//! map from id to due-time lets removal find the right bucket without scanning the index.
//!
//! Invariants:
//! - every id in `due_of` appears exactly once, in the bucket keyed by its due-time;
//! - the sum of bucket lengths equals `due_of.len()`;
//! - no bucket is ever empty.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::Hash;

use crate::clock::Timestamp;

/// Ordered `due-time -> ids` index with O(1) reverse lookup.
#[derive(Debug, Clone)]
pub struct DueIndex<K> {
    buckets: BTreeMap<Timestamp, VecDeque<K>>,
    due_of: HashMap<K, Timestamp>,
}

impl<K> Default for DueIndex<K> {
    fn default() -> Self {
        Self { buckets: BTreeMap::new(), due_of: HashMap::new() }
    }
}

impl<K> DueIndex<K>
where
    K: Hash + Eq + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn due_of(&self, id: &K) -> Option<Timestamp> {
        self.due_of.get(id).copied()
    }

    /// Index `id` at `due`, appending it to the end of that bucket.
    ///
    /// An id that is already indexed is moved: its previous position is dropped first and the
    /// previous due-time is returned.
    pub fn insert(&mut self, id: K, due: Timestamp) -> Option<Timestamp> {
        let previous = self.remove(&id);
        self.buckets.entry(due).or_default().push_back(id.clone());
        self.due_of.insert(id, due);
        previous
    }

    /// Drop `id` from the index, returning the due-time it was filed under.
    pub fn remove(&mut self, id: &K) -> Option<Timestamp> {
        let due = self.due_of.remove(id)?;
        if let Some(bucket) = self.buckets.get_mut(&due) {
            if let Some(pos) = bucket.iter().position(|queued| queued == id) {
                bucket.remove(pos);
            }
            if bucket.is_empty() {
                self.buckets.remove(&due);
            }
        }
        Some(due)
    }

    /// Smallest due-time alone.
    pub fn earliest_due(&self) -> Option<Timestamp> {
        self.buckets.first_key_value().map(|(due, _)| *due)
    }

    /// Number of indexed ids.
    pub fn len(&self) -> usize {
        self.due_of.len()
    }

    /// Remove and return the first id filed under the smallest due-time.
    pub fn pop_earliest(&mut self) -> Option<(K, Timestamp)> {
        let mut entry = self.buckets.first_entry()?;
        let due = *entry.key();
        let id = entry.get_mut().pop_front();
        if entry.get().is_empty() {
            entry.remove();
        }
        let id = id?;
        self.due_of.remove(&id);
        Some((id, due))
    }

    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let total: usize = self.buckets.values().map(VecDeque::len).sum();
        assert_eq!(total, self.due_of.len(), "bucket lengths must sum to the id count");
        for (due, bucket) in &self.buckets {
            assert!(!bucket.is_empty(), "empty bucket left behind at {due}");
            for id in bucket {
                assert_eq!(self.due_of.get(id), Some(due), "reverse index disagrees");
            }
        }
        for (id, due) in &self.due_of {
            let hits = self.buckets.get(due).map_or(0, |b| b.iter().filter(|q| *q == id).count());
            assert_eq!(hits, 1, "id must appear exactly once in its bucket");
        }
    }
}
