//! Queue abstractions for lanes and the boss dispatch queue.
//!
//! Two kinds of queue are pluggable:
//!
//! - [`TaskQueue`]: the FIFO behind one routing key's lane. Many producers,
//!   but only the worker holding the lane's claim token consumes.
//! - [`BossQueue`]: the shared multi-producer/multi-consumer carrier of
//!   [`ReadySignal`]s ("this lane has work"). Its capacity is the engine's
//!   main backpressure knob.
//!
//! # Built-in Implementations
//!
//! - [`SegTaskQueue`]: unbounded lock-free lane (default)
//! - [`ArrayTaskQueue`]: bounded lock-free lane
//! - [`ChannelTaskQueue`]: bounded or unbounded lane on crossbeam channels
//! - [`ArrayBossQueue`]: bounded lock-free boss queue, parks on a
//!   [`BlockingWaitStrategy`](crate::wait::BlockingWaitStrategy)
//! - [`ChannelBossQueue`]: bounded or unbounded boss queue on crossbeam channels
//!
//! # Queue Capability Introspection
//!
//! ```rust
//! use rust_queue_group::queue::{ArrayBossQueue, BossQueue, CapabilityFlags};
//!
//! let boss = ArrayBossQueue::new(128);
//! assert!(boss.supports(CapabilityFlags::MPMC | CapabilityFlags::BLOCKING));
//! println!("{}", boss.capabilities().describe());
//! // Output: "crossbeam::ArrayQueue: [bounded(128), lock-free, mpmc, blocking, exact-size]"
//! ```

mod backpressure;
mod boss;
mod channel;
mod factory;
mod lockfree;

pub use backpressure::{BackpressureStats, BackpressureStatsSnapshot, BackpressureStrategy};
pub use boss::{ArrayBossQueue, ChannelBossQueue};
pub use channel::ChannelTaskQueue;
pub use factory::{QueueFactory, QueueRequirements, RequirementsQueueFactory};
pub use lockfree::{ArrayTaskQueue, SegTaskQueue};

use crate::core::BoxedTask;
use crate::group::QueueExecutor;
use bitflags::bitflags;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// "This lane has pending work", carried by the boss queue.
///
/// The signal is the lane's executor handle, so a worker resolves its target
/// without a map lookup.
pub type ReadySignal = Arc<QueueExecutor>;

bitflags! {
    /// Flags for specifying required queue capabilities.
    ///
    /// Combine flags and check them with [`TaskQueue::supports()`],
    /// [`BossQueue::supports()`] or [`QueueCapabilities::satisfies()`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct CapabilityFlags: u32 {
        /// Require bounded queue (has maximum capacity)
        const BOUNDED = 1 << 0;
        /// Require unbounded queue (no maximum capacity)
        const UNBOUNDED = 1 << 1;
        /// Require lock-free operations
        const LOCK_FREE = 1 << 2;
        /// Require MPMC (multi-producer multi-consumer) support
        const MPMC = 1 << 3;
        /// Require blocking receive support
        const BLOCKING = 1 << 4;
        /// Require exact size reporting
        const EXACT_SIZE = 1 << 5;
    }
}

/// Capabilities of a queue implementation for runtime introspection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueCapabilities {
    /// Whether the queue has a maximum capacity
    pub is_bounded: bool,
    /// Maximum capacity if bounded (None for unbounded)
    pub capacity: Option<usize>,
    /// Whether the queue uses lock-free algorithms
    pub is_lock_free: bool,
    /// Whether the queue supports MPMC (multi-producer multi-consumer)
    pub mpmc: bool,
    /// Whether consumers can block waiting for an item
    pub supports_blocking: bool,
    /// Whether `len()` returns an exact count (vs approximate)
    pub exact_size: bool,
    /// Queue implementation name for debugging/logging
    pub implementation_name: &'static str,
}

impl Default for QueueCapabilities {
    fn default() -> Self {
        Self {
            is_bounded: false,
            capacity: None,
            is_lock_free: true,
            mpmc: true,
            supports_blocking: false,
            exact_size: false,
            implementation_name: "unknown",
        }
    }
}

impl QueueCapabilities {
    /// Creates capabilities for a crossbeam channel, bounded when `capacity` is set.
    pub fn channel(capacity: Option<usize>) -> Self {
        Self {
            is_bounded: capacity.is_some(),
            capacity,
            is_lock_free: true,
            mpmc: true,
            supports_blocking: true,
            exact_size: false,
            implementation_name: if capacity.is_some() {
                "crossbeam::channel::bounded"
            } else {
                "crossbeam::channel::unbounded"
            },
        }
    }

    /// Returns a human-readable description of the queue capabilities.
    pub fn describe(&self) -> String {
        let mut features = Vec::new();

        match (self.is_bounded, self.capacity) {
            (true, Some(cap)) => features.push(format!("bounded({})", cap)),
            (true, None) => features.push("bounded".to_string()),
            (false, _) => features.push("unbounded".to_string()),
        }
        if self.is_lock_free {
            features.push("lock-free".to_string());
        }
        if self.mpmc {
            features.push("mpmc".to_string());
        }
        if self.supports_blocking {
            features.push("blocking".to_string());
        }
        if self.exact_size {
            features.push("exact-size".to_string());
        }

        format!("{}: [{}]", self.implementation_name, features.join(", "))
    }

    /// Checks if these capabilities satisfy the given flags.
    pub fn satisfies(&self, flags: CapabilityFlags) -> bool {
        self.missing(flags).is_empty()
    }

    /// Lists the names of the required capabilities that are absent.
    pub fn missing(&self, flags: CapabilityFlags) -> Vec<&'static str> {
        let checks = [
            (CapabilityFlags::BOUNDED, self.is_bounded, "bounded"),
            (CapabilityFlags::UNBOUNDED, !self.is_bounded, "unbounded"),
            (CapabilityFlags::LOCK_FREE, self.is_lock_free, "lock-free"),
            (CapabilityFlags::MPMC, self.mpmc, "mpmc"),
            (CapabilityFlags::BLOCKING, self.supports_blocking, "blocking"),
            (CapabilityFlags::EXACT_SIZE, self.exact_size, "exact-size"),
        ];
        checks
            .iter()
            .filter(|(flag, present, _)| flags.contains(*flag) && !present)
            .map(|(_, _, name)| *name)
            .collect()
    }
}

/// Errors that can occur during queue operations.
///
/// Rejected items travel back inside the error so the caller can retry or
/// roll back.
pub enum QueueError<T> {
    /// Queue is full (bounded queues)
    Full(T),
    /// Queue is closed and not accepting new items
    Closed(T),
    /// Blocking send gave up after its timeout
    Timeout(T),
    /// No item available
    Empty,
    /// Queue is closed and drained
    Disconnected,
}

impl<T> QueueError<T> {
    /// Takes the rejected item out of the error, if it carries one.
    pub fn into_inner(self) -> Option<T> {
        match self {
            QueueError::Full(item) | QueueError::Closed(item) | QueueError::Timeout(item) => {
                Some(item)
            }
            QueueError::Empty | QueueError::Disconnected => None,
        }
    }
}

impl<T> fmt::Debug for QueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Full(_) => write!(f, "Full(..)"),
            QueueError::Closed(_) => write!(f, "Closed(..)"),
            QueueError::Timeout(_) => write!(f, "Timeout(..)"),
            QueueError::Empty => write!(f, "Empty"),
            QueueError::Disconnected => write!(f, "Disconnected"),
        }
    }
}

impl<T> fmt::Display for QueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Full(_) => write!(f, "queue is full"),
            QueueError::Closed(_) => write!(f, "queue is closed"),
            QueueError::Timeout(_) => write!(f, "operation timed out"),
            QueueError::Empty => write!(f, "queue is empty"),
            QueueError::Disconnected => write!(f, "queue is disconnected"),
        }
    }
}

impl<T> std::error::Error for QueueError<T> {}

/// Result type for queue operations.
pub type QueueResult<T, I> = std::result::Result<T, QueueError<I>>;

/// FIFO queue behind a single lane.
///
/// Dequeue order must equal enqueue order. Producers may call
/// [`offer`](Self::offer) concurrently; [`poll`](Self::poll) is only called by
/// the worker holding the lane's claim token.
pub trait TaskQueue: Send + Sync {
    /// Appends a task without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Full`] with the task if the queue is at capacity.
    fn offer(&self, task: BoxedTask) -> QueueResult<(), BoxedTask>;

    /// Removes the head task, if any.
    fn poll(&self) -> Option<BoxedTask>;

    /// Returns the current number of tasks in the queue.
    fn len(&self) -> usize;

    /// Returns `true` if the queue is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns how many more tasks fit, or `None` for unbounded queues.
    fn remaining_capacity(&self) -> Option<usize> {
        self.capabilities()
            .capacity
            .map(|capacity| capacity.saturating_sub(self.len()))
    }

    /// Returns the capabilities of this queue implementation.
    fn capabilities(&self) -> QueueCapabilities;

    /// Checks if this queue supports the required capabilities.
    fn supports(&self, flags: CapabilityFlags) -> bool {
        self.capabilities().satisfies(flags)
    }
}

/// Shared carrier of ready signals between producers and workers.
pub trait BossQueue: Send + Sync {
    /// Sends a signal, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] if the queue has been closed.
    fn send(&self, signal: ReadySignal) -> QueueResult<(), ReadySignal>;

    /// Attempts to send a signal without blocking.
    ///
    /// # Errors
    ///
    /// - [`QueueError::Full`] if the queue is at capacity
    /// - [`QueueError::Closed`] if the queue has been closed
    fn try_send(&self, signal: ReadySignal) -> QueueResult<(), ReadySignal>;

    /// Sends a signal, blocking at most `timeout` while the queue is full.
    ///
    /// # Errors
    ///
    /// - [`QueueError::Timeout`] if no space appeared in time
    /// - [`QueueError::Closed`] if the queue has been closed
    fn send_timeout(&self, signal: ReadySignal, timeout: Duration)
        -> QueueResult<(), ReadySignal>;

    /// Receives a signal, waiting at most `timeout`.
    ///
    /// # Returns
    ///
    /// - `Ok(signal)` if a signal arrived within the timeout
    /// - `Err(QueueError::Empty)` if none arrived
    /// - `Err(QueueError::Disconnected)` if the queue is closed and drained
    fn recv_timeout(&self, timeout: Duration) -> QueueResult<ReadySignal, ReadySignal>;

    /// Closes the queue. Queued signals can still be received.
    ///
    /// No send may succeed once `close` has returned; a receiver that sees the
    /// queue closed and empty must be able to rely on it staying empty.
    fn close(&self);

    /// Returns `true` if the queue has been closed.
    fn is_closed(&self) -> bool;

    /// Returns the number of queued signals.
    fn len(&self) -> usize;

    /// Returns `true` if no signal is queued.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the capabilities of this queue implementation.
    fn capabilities(&self) -> QueueCapabilities;

    /// Checks if this queue supports the required capabilities.
    fn supports(&self, flags: CapabilityFlags) -> bool {
        self.capabilities().satisfies(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_capabilities_default() {
        let caps = QueueCapabilities::default();
        assert!(!caps.is_bounded);
        assert!(caps.capacity.is_none());
        assert!(caps.is_lock_free);
        assert!(caps.mpmc);
        assert!(!caps.supports_blocking);
        assert_eq!(caps.implementation_name, "unknown");
    }

    #[test]
    fn test_queue_capabilities_channel() {
        let caps = QueueCapabilities::channel(Some(100));
        assert!(caps.is_bounded);
        assert_eq!(caps.capacity, Some(100));
        assert_eq!(caps.implementation_name, "crossbeam::channel::bounded");

        let caps = QueueCapabilities::channel(None);
        assert!(!caps.is_bounded);
        assert_eq!(caps.implementation_name, "crossbeam::channel::unbounded");
    }

    #[test]
    fn test_queue_capabilities_describe() {
        let caps = QueueCapabilities::channel(Some(8));
        assert_eq!(
            caps.describe(),
            "crossbeam::channel::bounded: [bounded(8), lock-free, mpmc, blocking]"
        );
    }

    #[test]
    fn test_satisfies_and_missing() {
        let caps = QueueCapabilities::channel(None);
        assert!(caps.satisfies(CapabilityFlags::MPMC | CapabilityFlags::BLOCKING));
        assert!(!caps.satisfies(CapabilityFlags::BOUNDED));
        assert_eq!(
            caps.missing(CapabilityFlags::BOUNDED | CapabilityFlags::EXACT_SIZE),
            vec!["bounded", "exact-size"]
        );
    }

    #[test]
    fn test_queue_error_into_inner() {
        let err: QueueError<u8> = QueueError::Full(3);
        assert_eq!(err.into_inner(), Some(3));
        let err: QueueError<u8> = QueueError::Disconnected;
        assert_eq!(err.into_inner(), None);
        assert_eq!(QueueError::<u8>::Timeout(1).to_string(), "operation timed out");
    }
}
