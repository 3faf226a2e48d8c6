//! Queue group configuration

use crate::core::{QueueGroupError, Result};
use crate::group::MAX_INDEX_SLOTS;
use crate::queue::BackpressureStrategy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Serde adapter storing a [`Duration`] as whole milliseconds.
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Configuration for a queue group executor
///
/// Serializable so deployments can keep it in a JSON file; durations are in
/// milliseconds. Queue implementations and the assist executor are not part
/// of it and are injected through the builder instead.
///
/// # Example
///
/// ```rust
/// use rust_queue_group::pool::QueueGroupConfig;
///
/// let config = QueueGroupConfig::from_json(
///     r#"{ "core_pool_size": 2, "max_pool_size": 8, "keep_alive": 30000 }"#,
/// )
/// .unwrap();
/// assert_eq!(config.max_pool_size, 8);
/// assert_eq!(config.boss_queue_capacity, 10_000);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueGroupConfig {
    /// Workers started up front and kept until shutdown
    pub core_pool_size: usize,
    /// Upper bound on live workers, core included
    pub max_pool_size: usize,
    /// Idle time after which a non-core worker exits
    #[serde(with = "duration_ms")]
    pub keep_alive: Duration,
    /// Longest a worker blocks on the boss queue before re-checking its state.
    /// Default: 100ms
    #[serde(with = "duration_ms")]
    pub poll_interval: Duration,
    /// Period of the housekeeping loop on the assist executor
    #[serde(with = "duration_ms")]
    pub housekeeping_interval: Duration,
    /// Worker thread name prefix
    pub thread_name_prefix: String,
    /// Boss queue capacity (0 = unbounded)
    pub boss_queue_capacity: usize,
    /// Size of the index manager's slot table
    pub index_slots: usize,
    /// Create every index lane at build time instead of on first use
    pub eager_index: bool,
    /// What a submission does when the boss queue is full.
    /// Default: Block
    pub backpressure_strategy: BackpressureStrategy,
}

impl Default for QueueGroupConfig {
    fn default() -> Self {
        let cores = num_cpus::get();
        Self {
            core_pool_size: cores,
            max_pool_size: cores,
            keep_alive: Duration::from_secs(60),
            poll_interval: Duration::from_millis(100),
            housekeeping_interval: Duration::from_secs(1),
            thread_name_prefix: "queue-group".to_string(),
            // Bounded by default to prevent memory exhaustion
            boss_queue_capacity: 10_000,
            index_slots: 1024,
            eager_index: false,
            backpressure_strategy: BackpressureStrategy::default(),
        }
    }
}

impl QueueGroupConfig {
    /// Create a configuration with a fixed pool of `workers` threads
    /// (0 = number of CPUs)
    #[must_use]
    pub fn new(workers: usize) -> Self {
        let workers = if workers == 0 { num_cpus::get() } else { workers };
        Self {
            core_pool_size: workers,
            max_pool_size: workers,
            ..Default::default()
        }
    }

    /// Parse a configuration from JSON; absent fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| QueueGroupError::invalid_config("json", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration as JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| QueueGroupError::other(e.to_string()))
    }

    /// Set the number of core workers
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_core_pool_size(mut self, size: usize) -> Self {
        self.core_pool_size = size;
        self
    }

    /// Set the maximum number of workers
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_pool_size(mut self, size: usize) -> Self {
        self.max_pool_size = size;
        self
    }

    /// Set how long a non-core worker may sit idle before exiting
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Set the worker poll interval.
    ///
    /// # Trade-offs
    ///
    /// - **Shorter intervals**: faster idle-worker trimming and shutdown, more wake-ups
    /// - **Longer intervals**: fewer wake-ups, slower reaction to shutdown
    ///
    /// # Panics
    ///
    /// Panics if interval is zero.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        assert!(!interval.is_zero(), "poll interval must be non-zero");
        self.poll_interval = interval;
        self
    }

    /// Set the housekeeping period
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_housekeeping_interval(mut self, interval: Duration) -> Self {
        self.housekeeping_interval = interval;
        self
    }

    /// Set thread name prefix
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the boss queue capacity (0 = unbounded)
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_boss_queue_capacity(mut self, capacity: usize) -> Self {
        self.boss_queue_capacity = capacity;
        self
    }

    /// Set the index manager's slot count
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_index_slots(mut self, slots: usize) -> Self {
        self.index_slots = slots;
        self
    }

    /// Create all index lanes at build time
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_eager_index(mut self, eager: bool) -> Self {
        self.eager_index = eager;
        self
    }

    /// Set the backpressure strategy for the boss queue
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_backpressure_strategy(mut self, strategy: BackpressureStrategy) -> Self {
        self.backpressure_strategy = strategy;
        self
    }

    /// Reject submissions immediately when the boss queue is full
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn reject_when_full(self) -> Self {
        self.with_backpressure_strategy(BackpressureStrategy::RejectImmediately)
    }

    /// Wait at most `timeout` for boss queue space
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn block_with_timeout(self, timeout: Duration) -> Self {
        self.with_backpressure_strategy(BackpressureStrategy::BlockWithTimeout(timeout))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.core_pool_size == 0 {
            return Err(QueueGroupError::invalid_config(
                "core_pool_size",
                "Number of core workers must be greater than 0",
            ));
        }
        if self.max_pool_size < self.core_pool_size {
            return Err(QueueGroupError::invalid_config(
                "max_pool_size",
                format!(
                    "must be at least core_pool_size ({}), got {}",
                    self.core_pool_size, self.max_pool_size
                ),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(QueueGroupError::invalid_config(
                "poll_interval",
                "Poll interval must be non-zero",
            ));
        }
        if self.housekeeping_interval.is_zero() {
            return Err(QueueGroupError::invalid_config(
                "housekeeping_interval",
                "Housekeeping interval must be non-zero",
            ));
        }
        if self.index_slots == 0 || self.index_slots > MAX_INDEX_SLOTS {
            return Err(QueueGroupError::invalid_config(
                "index_slots",
                format!("must be between 1 and {}, got {}", MAX_INDEX_SLOTS, self.index_slots),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = QueueGroupConfig::default();
        assert_eq!(config.core_pool_size, num_cpus::get());
        assert_eq!(config.max_pool_size, config.core_pool_size);
        assert_eq!(config.boss_queue_capacity, 10_000);
        assert_eq!(config.backpressure_strategy, BackpressureStrategy::Block);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_new_zero_means_cpus() {
        assert_eq!(QueueGroupConfig::new(0).core_pool_size, num_cpus::get());
        assert_eq!(QueueGroupConfig::new(3).max_pool_size, 3);
    }

    #[test]
    fn test_validate_rejects_bad_sizes() {
        let config = QueueGroupConfig::new(4).with_max_pool_size(2);
        assert!(matches!(
            config.validate(),
            Err(QueueGroupError::InvalidConfig { .. })
        ));

        let config = QueueGroupConfig::new(1).with_core_pool_size(0);
        assert!(config.validate().is_err());

        let config = QueueGroupConfig::new(1).with_index_slots(MAX_INDEX_SLOTS + 1);
        assert!(config.validate().is_err());
    }

    #[test]
    #[should_panic(expected = "poll interval must be non-zero")]
    fn test_zero_poll_interval_panics() {
        let _ = QueueGroupConfig::default().with_poll_interval(Duration::ZERO);
    }

    #[test]
    fn test_json_roundtrip_uses_milliseconds() {
        let config = QueueGroupConfig::new(2)
            .with_keep_alive(Duration::from_millis(1500))
            .block_with_timeout(Duration::from_millis(250));
        let json = config.to_json().unwrap();
        assert!(json.contains("\"keep_alive\": 1500"));
        assert!(json.contains("\"block_with_timeout\": 250"));

        let parsed = QueueGroupConfig::from_json(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_from_json_validates() {
        let result = QueueGroupConfig::from_json(r#"{ "core_pool_size": 0 }"#);
        assert!(matches!(result, Err(QueueGroupError::InvalidConfig { .. })));

        let result = QueueGroupConfig::from_json("not json");
        assert!(result.is_err());
    }
}
