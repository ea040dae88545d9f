#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # backoff-replay
//!
//! Bounded, time-ordered retry buffer for at-least-once message delivery.
//!
//! A producer hands each message to the buffer right after dispatching it. If no
//! acknowledgment arrives, the buffer reports when the message becomes eligible for
//! redelivery, using exponential backoff on the attempt number. An acknowledgment removes
//! the message for good.
//!
//! ## Features
//!
//! - **Exponential backoff** (`2^attempt * base`) with an optional cap and opt-in jitter
//! - **Bounded capacity** with a configurable eviction policy
//! - **Per-instance locking**: every operation is linearizable, buffers never contend
//! - **Telemetry sinks** for evictions and other state changes
//!
//! ## Quick Start
//!
//! ```rust
//! use backoff_replay::{ManualClock, RetryBuffer, Timestamp};
//! use std::time::Duration;
//!
//! let clock = ManualClock::new(Timestamp::from_millis(0));
//! let buffer = RetryBuffer::builder()
//!     .capacity(1000)
//!     .base_timeout(Duration::from_millis(1500))
//!     .with_clock(clock.clone())
//!     .build()
//!     .unwrap();
//!
//! buffer.enqueue_unacked(2u64, "fake_message", 2);
//! assert_eq!(buffer.peek_earliest_due(), Timestamp::from_millis(6000));
//!
//! clock.advance(Duration::from_secs(6));
//! let due = buffer.pop_due().expect("message is due");
//! assert_eq!(due.into_parts(), (2, "fake_message", 2));
//! ```

pub mod backoff;
pub mod buffer;
pub mod clock;
pub mod config;
mod due_index;
pub mod error;
pub mod eviction;
pub mod jitter;
pub mod prelude;
pub mod telemetry;

// Re-exports
pub use backoff::{Backoff, BackoffError};
pub use buffer::{BufferStats, RetryBuffer, Unacked};
pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use config::{RetryBufferBuilder, RetryBufferConfig};
pub use error::{BufferError, ConfigError};
pub use eviction::EvictionPolicy;
pub use jitter::Jitter;
