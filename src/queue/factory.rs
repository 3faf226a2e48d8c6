//! Factories producing the task queue behind each new lane.
//!
//! Every lane gets its own queue, created on the lane's first use. Any
//! `Fn() -> Box<dyn TaskQueue>` closure is a factory; [`RequirementsQueueFactory`]
//! selects a built-in implementation from declared requirements.
//!
//! # Example
//!
//! ```rust
//! use rust_queue_group::queue::{
//!     ChannelTaskQueue, QueueFactory, QueueRequirements, RequirementsQueueFactory, TaskQueue,
//! };
//!
//! // Bounded lanes, rejecting once 1000 tasks are waiting
//! let factory = RequirementsQueueFactory::new(QueueRequirements::new().bounded(1000)).unwrap();
//! assert_eq!(factory.build_queue().capabilities().capacity, Some(1000));
//!
//! // A closure works too
//! let factory = || Box::new(ChannelTaskQueue::unbounded()) as Box<dyn TaskQueue>;
//! assert!(!factory.build_queue().capabilities().is_bounded);
//! ```

use super::{ArrayTaskQueue, ChannelTaskQueue, SegTaskQueue, TaskQueue};
use crate::core::{QueueGroupError, Result};

/// Creates the task queue for a newly seen routing key.
pub trait QueueFactory: Send + Sync {
    /// Builds a fresh, empty queue.
    fn build_queue(&self) -> Box<dyn TaskQueue>;
}

impl<F> QueueFactory for F
where
    F: Fn() -> Box<dyn TaskQueue> + Send + Sync,
{
    fn build_queue(&self) -> Box<dyn TaskQueue> {
        self()
    }
}

/// Requirements for lane queue creation.
///
/// # Example
///
/// ```rust
/// use rust_queue_group::queue::QueueRequirements;
///
/// let requirements = QueueRequirements::new()
///     .bounded(1000)
///     .lock_free();
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueueRequirements {
    /// Maximum capacity (None = unbounded)
    capacity: Option<usize>,

    /// Require lock-free implementation
    lock_free: bool,
}

impl QueueRequirements {
    /// Creates a new empty requirements builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the queue to be bounded with the specified capacity.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn bounded(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Sets the queue to be unbounded.
    ///
    /// This is the default behavior.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn unbounded(mut self) -> Self {
        self.capacity = None;
        self
    }

    /// Requires the queue to use lock-free algorithms.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn lock_free(mut self) -> Self {
        self.lock_free = true;
        self
    }

    /// Returns the required capacity, if any.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Returns whether lock-free is required.
    pub fn requires_lock_free(&self) -> bool {
        self.lock_free
    }
}

/// Factory selecting a built-in lane queue from [`QueueRequirements`].
///
/// # Selection Logic
///
/// | Requirements | Selected Queue |
/// |-------------|----------------|
/// | Default | [`SegTaskQueue`] (unbounded) |
/// | `bounded(N)` | [`ChannelTaskQueue::bounded`] |
/// | `bounded(N).lock_free()` | [`ArrayTaskQueue`] |
#[derive(Clone, Debug, Default)]
pub struct RequirementsQueueFactory {
    requirements: QueueRequirements,
}

impl RequirementsQueueFactory {
    /// Creates a factory for the given requirements.
    ///
    /// # Errors
    ///
    /// Returns [`QueueGroupError::InvalidConfig`] if a bounded capacity of 0 is requested.
    pub fn new(requirements: QueueRequirements) -> Result<Self> {
        if requirements.capacity == Some(0) {
            return Err(QueueGroupError::invalid_config(
                "queue requirements",
                "bounded lane capacity must be greater than 0",
            ));
        }
        Ok(Self { requirements })
    }

    /// Returns the requirements this factory satisfies.
    pub fn requirements(&self) -> &QueueRequirements {
        &self.requirements
    }
}

impl QueueFactory for RequirementsQueueFactory {
    fn build_queue(&self) -> Box<dyn TaskQueue> {
        match (self.requirements.capacity, self.requirements.lock_free) {
            (None, _) => Box::new(SegTaskQueue::new()),
            (Some(capacity), true) => Box::new(ArrayTaskQueue::new(capacity)),
            (Some(capacity), false) => Box::new(ChannelTaskQueue::bounded(capacity)),
        }
    }
}
