//! Backpressure strategies for publishing ready signals.
//!
//! The boss queue is the engine's throttle: when it is full, a submission that
//! needs to wake a worker either waits for room or is refused. Work is never
//! dropped silently.
//!
//! # Strategies
//!
//! - [`BackpressureStrategy::Block`]: Block until space is available (default)
//! - [`BackpressureStrategy::BlockWithTimeout`]: Block with timeout, return error if exceeded
//! - [`BackpressureStrategy::RejectImmediately`]: Return error immediately if queue is full
//!
//! # Example
//!
//! ```rust
//! use rust_queue_group::pool::QueueGroupConfig;
//! use rust_queue_group::queue::BackpressureStrategy;
//! use std::time::Duration;
//!
//! // Reject immediately for latency-sensitive front ends
//! let config = QueueGroupConfig::default()
//!     .with_boss_queue_capacity(1000)
//!     .with_backpressure_strategy(BackpressureStrategy::RejectImmediately);
//!
//! // Bounded wait for request handlers
//! let config = QueueGroupConfig::default()
//!     .with_boss_queue_capacity(5000)
//!     .with_backpressure_strategy(BackpressureStrategy::BlockWithTimeout(Duration::from_secs(5)));
//! ```

use super::{BossQueue, QueueError, ReadySignal};
use crate::core::{QueueGroupError, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Strategy for handling a full boss queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackpressureStrategy {
    /// Block until space is available (default behavior).
    #[default]
    Block,

    /// Block with timeout, return error if exceeded.
    BlockWithTimeout(#[serde(with = "crate::pool::config::duration_ms")] Duration),

    /// Return error immediately if queue is full.
    RejectImmediately,
}

impl BackpressureStrategy {
    /// Publishes `signal` on `boss` according to this strategy.
    ///
    /// # Errors
    ///
    /// - [`QueueGroupError::BossQueueFull`] under `RejectImmediately`
    /// - [`QueueGroupError::SubmissionTimeout`] under `BlockWithTimeout`
    /// - [`QueueGroupError::ShuttingDown`] if the boss queue was closed
    pub fn publish(
        &self,
        boss: &dyn BossQueue,
        signal: ReadySignal,
        stats: &BackpressureStats,
    ) -> Result<()> {
        let outcome = match self {
            Self::Block => boss.send(signal),
            Self::BlockWithTimeout(timeout) => boss.send_timeout(signal, *timeout),
            Self::RejectImmediately => boss.try_send(signal),
        };

        match outcome {
            Ok(()) => {
                stats.record_submission();
                Ok(())
            }
            Err(QueueError::Full(_)) => {
                stats.record_rejection();
                let max = boss.capabilities().capacity.unwrap_or(0);
                Err(QueueGroupError::boss_queue_full(boss.len(), max))
            }
            Err(QueueError::Timeout(_)) => {
                stats.record_timeout();
                let timeout_ms = match self {
                    Self::BlockWithTimeout(timeout) => timeout.as_millis() as u64,
                    _ => 0,
                };
                Err(QueueGroupError::submission_timeout(timeout_ms))
            }
            Err(QueueError::Closed(_)) | Err(QueueError::Disconnected) | Err(QueueError::Empty) => {
                Err(QueueGroupError::shutting_down(boss.len()))
            }
        }
    }
}

/// Statistics for backpressure events.
#[derive(Debug, Default)]
pub struct BackpressureStats {
    /// Ready signals published
    signals_published: AtomicU64,
    /// Submissions refused under RejectImmediately
    rejections: AtomicU64,
    /// Submissions that gave up under BlockWithTimeout
    timeouts: AtomicU64,
}

impl BackpressureStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successfully published signal.
    pub fn record_submission(&self) {
        self.signals_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a rejection.
    pub fn record_rejection(&self) {
        self.rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a timeout event.
    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Gets the number of published signals.
    pub fn signals_published(&self) -> u64 {
        self.signals_published.load(Ordering::Relaxed)
    }

    /// Gets the number of rejections.
    pub fn rejections(&self) -> u64 {
        self.rejections.load(Ordering::Relaxed)
    }

    /// Gets the number of timeouts.
    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }

    /// Gets the total number of backpressure events.
    pub fn backpressure_events(&self) -> u64 {
        self.rejections() + self.timeouts()
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> BackpressureStatsSnapshot {
        BackpressureStatsSnapshot {
            signals_published: self.signals_published(),
            rejections: self.rejections(),
            timeouts: self.timeouts(),
        }
    }
}

/// A snapshot of backpressure statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackpressureStatsSnapshot {
    /// Ready signals published
    pub signals_published: u64,
    /// Submissions refused under RejectImmediately
    pub rejections: u64,
    /// Submissions that gave up under BlockWithTimeout
    pub timeouts: u64,
}
