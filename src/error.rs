//! Error types for the retry buffer
use std::time::Duration;
use thiserror::Error;

use crate::backoff::BackoffError;

/// Errors returned by buffer operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BufferError {
    /// `pop_earliest_due` was called with nothing tracked.
    ///
    /// Callers are expected to consult `is_empty`/`len` (or track emptiness themselves)
    /// before popping; hitting this indicates a polling loop bug.
    #[error("retry buffer is empty; nothing to pop")]
    Empty,
}

impl BufferError {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Errors produced when validating buffer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Capacity must be > 0.
    #[error("capacity must be > 0 (got {provided})")]
    InvalidCapacity {
        /// Value provided by caller.
        provided: usize,
    },
    /// The backoff unit must be > 0.
    #[error("base timeout must be > 0 (got {0:?})")]
    InvalidBaseTimeout(Duration),
    /// The backoff cap was rejected.
    #[error("invalid backoff: {0}")]
    Backoff(#[from] BackoffError),
}
