//! Lanes and the managers that map routing keys to them.
//!
//! A [`QueueExecutor`] owns one key's FIFO task queue and the claim token that
//! keeps at most one worker draining it. Managers resolve keys to executors:
//!
//! - [`IndexQueueGroupManager`]: fixed table of `u16` slots, O(1) lookup
//! - [`KeyQueueGroupManager`]: concurrent map of string keys, grows on first use

mod executor;
mod index;
mod key;

pub use executor::{LaneState, QueueExecutor};
pub use index::{IndexQueueGroupManager, MAX_INDEX_SLOTS};
pub use key::KeyQueueGroupManager;

pub(crate) use executor::DrainReport;

use crate::core::{Result, RoutingKey, Task};
use crate::queue::ReadySignal;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// Observer invoked synchronously on the worker thread before each task runs.
///
/// Panics raised by the listener are caught and logged; the task still runs.
pub trait GroupEventListener: Send + Sync {
    /// Called with the lane's key and the task about to run.
    fn on_queue_handle_task(&self, key: &RoutingKey, task: &dyn Task);
}

impl<F> GroupEventListener for F
where
    F: Fn(&RoutingKey, &dyn Task) + Send + Sync,
{
    fn on_queue_handle_task(&self, key: &RoutingKey, task: &dyn Task) {
        self(key, task)
    }
}

/// Destination for ready signals, installed by the running queue group.
pub(crate) trait SignalSink: Send + Sync {
    fn publish(&self, signal: ReadySignal) -> Result<()>;
}

/// State shared by a manager and every executor it creates.
#[derive(Default)]
pub(crate) struct GroupContext {
    listener: RwLock<Option<Arc<dyn GroupEventListener>>>,
    sink: RwLock<Option<Arc<dyn SignalSink>>>,
    aliases: DashMap<RoutingKey, String>,
}

impl GroupContext {
    pub(crate) fn listener(&self) -> Option<Arc<dyn GroupEventListener>> {
        self.listener.read().clone()
    }

    pub(crate) fn set_listener(&self, listener: Option<Arc<dyn GroupEventListener>>) {
        *self.listener.write() = listener;
    }

    pub(crate) fn sink(&self) -> Option<Arc<dyn SignalSink>> {
        self.sink.read().clone()
    }

    pub(crate) fn attach(&self, sink: Arc<dyn SignalSink>) {
        *self.sink.write() = Some(sink);
    }

    pub(crate) fn detach(&self) {
        *self.sink.write() = None;
    }

    pub(crate) fn set_alias(&self, key: RoutingKey, alias: String) {
        self.aliases.insert(key, alias);
    }

    pub(crate) fn alias(&self, key: &RoutingKey) -> Option<String> {
        self.aliases.get(key).map(|alias| alias.value().clone())
    }

    pub(crate) fn alias_count(&self) -> usize {
        self.aliases.len()
    }
}

/// Common operations of the index and key managers.
pub trait QueueGroupManager: Send + Sync {
    /// Routing key type accepted by this manager.
    type Key: ?Sized;

    /// Returns the unique executor for `key`, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`QueueGroupError::IndexOutOfRange`](crate::core::QueueGroupError::IndexOutOfRange)
    /// for an index beyond the manager's slot table.
    fn queue_executor(&self, key: &Self::Key) -> Result<Arc<QueueExecutor>>;

    /// Attaches a human-readable alias to `key`, replacing any previous one.
    fn set_alias(&self, key: &Self::Key, alias: String) -> Result<()>;

    /// Returns the alias attached to `key`, if any.
    fn alias(&self, key: &Self::Key) -> Option<String>;

    /// Sum of completed tasks across every executor of this manager.
    fn total_completed_task_count(&self) -> u64 {
        self.executors()
            .iter()
            .map(|executor| executor.completed_task_count())
            .sum()
    }

    /// Completed tasks of one key; 0 for a key that has never been used.
    fn completed_task_count(&self, key: &Self::Key) -> u64;

    /// Installs a listener for every executor of this manager.
    fn set_group_event_listener(&self, listener: Arc<dyn GroupEventListener>);

    /// Removes the listener.
    fn clear_group_event_listener(&self);

    /// Snapshot of all executors created so far.
    fn executors(&self) -> Vec<Arc<QueueExecutor>>;
}
