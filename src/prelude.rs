//! Convenient re-exports for common retry buffer types.
pub use crate::{
    backoff::{Backoff, BackoffError},
    buffer::{BufferStats, RetryBuffer, Unacked},
    clock::{Clock, ManualClock, SystemClock, Timestamp},
    config::{RetryBufferBuilder, RetryBufferConfig},
    error::{BufferError, ConfigError},
    eviction::EvictionPolicy,
    jitter::Jitter,
    telemetry::{BufferEvent, EventSink, LogSink, MemorySink, NullSink},
};
