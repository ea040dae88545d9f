//! Redelivery delay schedule.
//!
//! Attempt semantics differ from a call-site retry loop: a message is handed to the buffer
//! *after* it has been dispatched, so attempt `0` already waits one full backoff unit before it
//! becomes due again. The exponential schedule is `2^attempt * base`.
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use backoff_replay::Backoff;
//!
//! let backoff = Backoff::exponential(Duration::from_millis(1500));
//! assert_eq!(backoff.delay(0), Duration::from_millis(1500));
//! assert_eq!(backoff.delay(2), Duration::from_millis(6000));
//!
//! let capped = backoff.with_max(Duration::from_secs(10)).unwrap();
//! assert_eq!(capped.delay(5), Duration::from_secs(10));
//! ```
//!
//! Overflow behavior: delays that do not fit in a `Duration` saturate to `Duration::MAX`. Only
//! an explicit `with_max` caps the schedule below that.

use std::time::Duration;
use thiserror::Error;

/// Errors returned by backoff configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackoffError {
    #[error("max must be greater than zero")]
    MaxMustBePositive,
    #[error("max ({max:?}) must be >= base ({base:?})")]
    MaxLessThanBase { base: Duration, max: Duration },
}

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Exponential delay schedule applied to each redelivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Option<Duration>,
}

impl Backoff {
    /// `2^attempt * base`, uncapped.
    pub fn exponential(base: Duration) -> Self {
        Self { base, max: None }
    }

    /// Cap the delay. Errors if `max` is zero or smaller than the base delay.
    pub fn with_max(mut self, max: Duration) -> Result<Self, BackoffError> {
        if max.is_zero() {
            return Err(BackoffError::MaxMustBePositive);
        }
        if max < self.base {
            return Err(BackoffError::MaxLessThanBase { base: self.base, max });
        }
        self.max = Some(max);
        Ok(self)
    }

    /// The backoff unit.
    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn max(&self) -> Option<Duration> {
        self.max
    }

    /// Delay before a message enqueued at `attempt` becomes due.
    pub fn delay(&self, attempt: u32) -> Duration {
        let nanos = self.base.as_nanos().saturating_mul(2u128.saturating_pow(attempt));
        let raw = match u64::try_from(nanos / NANOS_PER_SEC) {
            Ok(secs) => Duration::new(secs, (nanos % NANOS_PER_SEC) as u32),
            Err(_) => Duration::MAX,
        };
        self.max.map(|m| raw.min(m)).unwrap_or(raw)
    }
}
