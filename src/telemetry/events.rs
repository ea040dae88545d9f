use std::fmt;

#[cfg(feature = "telemetry-json")]
use serde_json::json;

use crate::clock::Timestamp;
use crate::eviction::EvictionPolicy;

/// Events emitted by a retry buffer.
///
/// Events describe state changes only; ids and payloads are never included so sinks do not
/// need to know the buffer's key or payload types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferEvent {
    /// A new id started being tracked.
    Enqueued {
        /// Attempt number supplied by the caller
        attempt: u32,
        /// When the message becomes due for redelivery
        due: Timestamp,
        /// Tracked count after the insert
        tracked: usize,
    },
    /// An already-tracked id was enqueued again and its record replaced.
    Replaced {
        /// Attempt number of the new record
        attempt: u32,
        /// Due-time of the new record
        due: Timestamp,
    },
    /// A tracked id was acknowledged and dropped.
    Acknowledged {
        /// Tracked count after the removal
        tracked: usize,
    },
    /// The earliest-due message was handed back for redelivery.
    Popped {
        /// Attempt number of the popped record
        attempt: u32,
        /// Due-time it was filed under
        due: Timestamp,
    },
    /// A message was discarded to make room for a new id.
    ///
    /// The message is gone; nothing else will report it.
    Evicted {
        /// Attempt number of the discarded record
        attempt: u32,
        /// Due-time it was filed under
        due: Timestamp,
        /// Policy that selected it
        policy: EvictionPolicy,
    },
}

impl BufferEvent {
    /// Short machine-friendly name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            BufferEvent::Enqueued { .. } => "enqueued",
            BufferEvent::Replaced { .. } => "replaced",
            BufferEvent::Acknowledged { .. } => "acknowledged",
            BufferEvent::Popped { .. } => "popped",
            BufferEvent::Evicted { .. } => "evicted",
        }
    }

    #[cfg(feature = "telemetry-json")]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            BufferEvent::Enqueued { attempt, due, tracked } => json!({
                "kind": self.kind(),
                "attempt": *attempt,
                "due_ms": due.as_millis(),
                "tracked": *tracked,
            }),
            BufferEvent::Replaced { attempt, due } | BufferEvent::Popped { attempt, due } => {
                json!({
                    "kind": self.kind(),
                    "attempt": *attempt,
                    "due_ms": due.as_millis(),
                })
            }
            BufferEvent::Acknowledged { tracked } => {
                json!({ "kind": self.kind(), "tracked": *tracked })
            }
            BufferEvent::Evicted { attempt, due, policy } => json!({
                "kind": self.kind(),
                "attempt": *attempt,
                "due_ms": due.as_millis(),
                "policy": policy.to_string(),
            }),
        }
    }
}

impl fmt::Display for BufferEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferEvent::Enqueued { attempt, due, tracked } => {
                write!(f, "Enqueued(#{}, due={}, tracked={})", attempt, due, tracked)
            }
            BufferEvent::Replaced { attempt, due } => {
                write!(f, "Replaced(#{}, due={})", attempt, due)
            }
            BufferEvent::Acknowledged { tracked } => write!(f, "Acknowledged(tracked={})", tracked),
            BufferEvent::Popped { attempt, due } => write!(f, "Popped(#{}, due={})", attempt, due),
            BufferEvent::Evicted { attempt, due, policy } => {
                write!(f, "Evicted(#{}, due={}, policy={})", attempt, due, policy)
            }
        }
    }
}
