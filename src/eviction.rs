//! Capacity-overflow policy.
//!
//! When a new id arrives at a full buffer exactly one tracked message is discarded to make room.
//! The default reproduces the long-standing behavior of selecting the message *closest to
//! becoming due* (the same rule `pop_earliest_due` uses). Under sustained overflow that keeps
//! long-backoff, high-attempt messages resident and drops the ones about to be retried.
//! `OldestInserted` is the alternative for deployments that would rather shed the stalest entry.

use std::fmt;

/// Which message is discarded when the buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EvictionPolicy {
    /// Smallest due-time; earliest inserted within a shared due-time.
    #[default]
    EarliestDue,
    /// The message whose current record was enqueued longest ago.
    OldestInserted,
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionPolicy::EarliestDue => write!(f, "earliest_due"),
            EvictionPolicy::OldestInserted => write!(f, "oldest_inserted"),
        }
    }
}
