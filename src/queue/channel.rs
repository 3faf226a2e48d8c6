//! Lane queue backed by crossbeam channels.

use super::{QueueCapabilities, QueueError, QueueResult, TaskQueue};
use crate::core::BoxedTask;
use crossbeam::channel::{self, Receiver, Sender, TrySendError};

/// A FIFO lane queue using a crossbeam channel.
///
/// Offers never block: a full bounded channel hands the task straight back.
///
/// # Example
///
/// ```rust
/// use rust_queue_group::queue::{ChannelTaskQueue, TaskQueue};
/// use rust_queue_group::core::ClosureTask;
///
/// let queue = ChannelTaskQueue::bounded(2);
/// queue.offer(ClosureTask::boxed(|| Ok(()))).unwrap();
/// assert_eq!(queue.remaining_capacity(), Some(1));
/// assert!(queue.poll().is_some());
/// ```
pub struct ChannelTaskQueue {
    sender: Sender<BoxedTask>,
    receiver: Receiver<BoxedTask>,
    capacity: Option<usize>,
}

impl ChannelTaskQueue {
    /// Creates a new unbounded channel queue.
    pub fn unbounded() -> Self {
        let (sender, receiver) = channel::unbounded();
        Self {
            sender,
            receiver,
            capacity: None,
        }
    }

    /// Creates a new bounded channel queue with the specified capacity.
    ///
    /// # Panics
    ///
    /// Panics if capacity is 0.
    pub fn bounded(capacity: usize) -> Self {
        assert!(capacity > 0, "Bounded queue capacity must be greater than 0");
        let (sender, receiver) = channel::bounded(capacity);
        Self {
            sender,
            receiver,
            capacity: Some(capacity),
        }
    }

    /// Returns the capacity of the queue, if bounded.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

impl TaskQueue for ChannelTaskQueue {
    fn offer(&self, task: BoxedTask) -> QueueResult<(), BoxedTask> {
        self.sender.try_send(task).map_err(|e| match e {
            TrySendError::Full(task) => QueueError::Full(task),
            TrySendError::Disconnected(task) => QueueError::Closed(task),
        })
    }

    fn poll(&self) -> Option<BoxedTask> {
        self.receiver.try_recv().ok()
    }

    fn len(&self) -> usize {
        self.receiver.len()
    }

    fn capabilities(&self) -> QueueCapabilities {
        QueueCapabilities {
            exact_size: true,
            ..QueueCapabilities::channel(self.capacity)
        }
    }
}
