//! Lock-free lane queues on crossbeam's segmented and array queues.

use super::{QueueCapabilities, QueueError, QueueResult, TaskQueue};
use crate::core::BoxedTask;
use crossbeam_queue::{ArrayQueue, SegQueue};

/// Unbounded lock-free lane queue.
///
/// This is the default lane queue: producers never wait and never get
/// rejected, so per-key backpressure only comes from the boss queue.
///
/// # Example
///
/// ```rust
/// use rust_queue_group::queue::{SegTaskQueue, TaskQueue};
/// use rust_queue_group::core::ClosureTask;
///
/// let queue = SegTaskQueue::new();
/// queue.offer(ClosureTask::boxed(|| Ok(()))).unwrap();
/// assert_eq!(queue.len(), 1);
/// ```
#[derive(Default)]
pub struct SegTaskQueue {
    queue: SegQueue<BoxedTask>,
}

impl SegTaskQueue {
    /// Creates a new empty queue.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskQueue for SegTaskQueue {
    fn offer(&self, task: BoxedTask) -> QueueResult<(), BoxedTask> {
        self.queue.push(task);
        Ok(())
    }

    fn poll(&self) -> Option<BoxedTask> {
        self.queue.pop()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn capabilities(&self) -> QueueCapabilities {
        QueueCapabilities {
            is_bounded: false,
            capacity: None,
            is_lock_free: true,
            mpmc: true,
            supports_blocking: false,
            exact_size: true,
            implementation_name: "crossbeam::SegQueue",
        }
    }
}

/// Bounded lock-free lane queue backed by a fixed ring buffer.
pub struct ArrayTaskQueue {
    queue: ArrayQueue<BoxedTask>,
}

impl ArrayTaskQueue {
    /// Creates a queue holding at most `capacity` tasks.
    ///
    /// # Panics
    ///
    /// Panics if capacity is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Bounded queue capacity must be greater than 0");
        Self {
            queue: ArrayQueue::new(capacity),
        }
    }
}

impl TaskQueue for ArrayTaskQueue {
    fn offer(&self, task: BoxedTask) -> QueueResult<(), BoxedTask> {
        self.queue.push(task).map_err(QueueError::Full)
    }

    fn poll(&self) -> Option<BoxedTask> {
        self.queue.pop()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn remaining_capacity(&self) -> Option<usize> {
        Some(self.queue.capacity().saturating_sub(self.queue.len()))
    }

    fn capabilities(&self) -> QueueCapabilities {
        QueueCapabilities {
            is_bounded: true,
            capacity: Some(self.queue.capacity()),
            is_lock_free: true,
            mpmc: true,
            supports_blocking: false,
            exact_size: true,
            implementation_name: "crossbeam::ArrayQueue",
        }
    }
}
