//! Telemetry and observability for retry buffers.
//!
//! Every state change of a buffer is described by a [`BufferEvent`] and handed to an
//! [`EventSink`]. Evictions in particular are otherwise invisible to callers, so production
//! deployments should attach at least a [`LogSink`] or a counting sink.
//!
//! # Sinks
//!
//! - [`NullSink`]: default, discards everything.
//! - [`LogSink`]: `tracing` at `info` (evictions at `warn`).
//! - [`MemorySink`]: bounded in-memory history, handy in tests.
//! - [`StreamingSink`]: tokio broadcast channel for async consumers.
//! - [`MulticastSink`]: fan-out to several sinks.

pub mod events;
pub mod sinks;

pub use events::BufferEvent;
pub use sinks::{EventSink, LogSink, MemorySink, MulticastSink, NullSink, StreamingSink};
