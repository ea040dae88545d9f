//! Buffer configuration and builder.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::backoff::Backoff;
use crate::buffer::RetryBuffer;
use crate::clock::{Clock, SystemClock};
use crate::error::ConfigError;
use crate::eviction::EvictionPolicy;
use crate::jitter::Jitter;
use crate::telemetry::{EventSink, NullSink};

/// Validated configuration for a retry buffer. Fixed once the buffer is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryBufferConfig {
    capacity: usize,
    backoff: Backoff,
    jitter: Jitter,
    eviction: EvictionPolicy,
}

impl RetryBufferConfig {
    /// Exponential backoff with unit `base_timeout`, no cap, no jitter, earliest-due eviction.
    ///
    /// # Examples
    /// ```
    /// use backoff_replay::RetryBufferConfig;
    /// use std::time::Duration;
    /// let cfg = RetryBufferConfig::new(1000, Duration::from_millis(1500)).unwrap();
    /// assert_eq!(cfg.capacity(), 1000);
    /// ```
    pub fn new(capacity: usize, base_timeout: Duration) -> Result<Self, ConfigError> {
        let cfg = Self {
            capacity,
            backoff: Backoff::exponential(base_timeout),
            jitter: Jitter::None,
            eviction: EvictionPolicy::EarliestDue,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_eviction(mut self, eviction: EvictionPolicy) -> Self {
        self.eviction = eviction;
        self
    }

    /// Maximum number of tracked messages.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Backoff unit; also the horizon reported by an empty buffer's peek.
    pub fn base_timeout(&self) -> Duration {
        self.backoff.base()
    }

    /// Exponential schedule derived from the base timeout and the optional cap.
    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn jitter(&self) -> Jitter {
        self.jitter
    }

    pub fn eviction(&self) -> EvictionPolicy {
        self.eviction
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::InvalidCapacity { provided: self.capacity });
        }
        if self.backoff.base().is_zero() {
            return Err(ConfigError::InvalidBaseTimeout(self.backoff.base()));
        }
        Ok(())
    }
}

/// Builder for [`RetryBuffer`].
pub struct RetryBufferBuilder<K, P> {
    capacity: usize,
    base_timeout: Duration,
    max_backoff: Option<Duration>,
    jitter: Jitter,
    eviction: EvictionPolicy,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
    _types: PhantomData<fn() -> (K, P)>,
}

impl<K, P> RetryBufferBuilder<K, P> {
    /// Create a builder with sane defaults: 1000 messages, 1s backoff unit.
    pub fn new() -> Self {
        Self {
            capacity: 1000,
            base_timeout: Duration::from_secs(1),
            max_backoff: None,
            jitter: Jitter::None,
            eviction: EvictionPolicy::EarliestDue,
            clock: Arc::new(SystemClock),
            sink: Arc::new(NullSink),
            _types: PhantomData,
        }
    }

    /// Maximum number of in-flight messages. Must be > 0.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Backoff unit. Must be > 0.
    pub fn base_timeout(mut self, base_timeout: Duration) -> Self {
        self.base_timeout = base_timeout;
        self
    }

    /// Cap on the computed redelivery delay. Must be >= the base timeout.
    pub fn max_backoff(mut self, max: Duration) -> Self {
        self.max_backoff = Some(max);
        self
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn eviction(mut self, eviction: EvictionPolicy) -> Self {
        self.eviction = eviction;
        self
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

    /// Validate the settings and build the buffer.
    pub fn build(self) -> Result<RetryBuffer<K, P>, ConfigError>
    where
        K: std::hash::Hash + Eq + Clone,
    {
        let mut config = RetryBufferConfig::new(self.capacity, self.base_timeout)?
            .with_jitter(self.jitter)
            .with_eviction(self.eviction);
        if let Some(max) = self.max_backoff {
            config.backoff = config.backoff.with_max(max)?;
        }
        Ok(RetryBuffer::from_parts(config, self.clock, self.sink))
    }
}

impl<K, P> Default for RetryBufferBuilder<K, P> {
    fn default() -> Self {
        Self::new()
    }
}
