//! Open, growing map of lanes addressed by string key.

use super::{GroupContext, GroupEventListener, QueueExecutor, QueueGroupManager};
use crate::core::{Result, RoutingKey};
use crate::queue::{QueueFactory, RequirementsQueueFactory};
use dashmap::DashMap;
use log::debug;
use std::fmt;
use std::sync::Arc;

/// Resolves string routing keys through a sharded concurrent map.
///
/// Lookups of existing keys take a shard read lock only; the first use of a
/// key inserts under that shard's write lock, so concurrent first use still
/// yields exactly one executor. Lanes are never evicted; [`len`](Self::len)
/// reports how many exist.
///
/// # Example
///
/// ```rust
/// use rust_queue_group::group::{KeyQueueGroupManager, QueueGroupManager};
///
/// let manager = KeyQueueGroupManager::new();
/// manager.queue_executor("player-7").unwrap();
/// manager.set_alias("player-7", "alice".to_string()).unwrap();
/// assert_eq!(manager.alias("player-7").as_deref(), Some("alice"));
/// assert_eq!(manager.len(), 1);
/// ```
pub struct KeyQueueGroupManager {
    executors: DashMap<String, Arc<QueueExecutor>>,
    factory: Arc<dyn QueueFactory>,
    context: Arc<GroupContext>,
}

impl KeyQueueGroupManager {
    /// Creates a manager with unbounded lane queues.
    pub fn new() -> Self {
        Self::with_factory(Arc::new(RequirementsQueueFactory::default()))
    }

    /// Creates a manager whose lane queues come from `factory`.
    pub fn with_factory(factory: Arc<dyn QueueFactory>) -> Self {
        Self {
            executors: DashMap::new(),
            factory,
            context: Arc::new(GroupContext::default()),
        }
    }

    /// Number of lanes created so far.
    pub fn len(&self) -> usize {
        self.executors.len()
    }

    /// Returns `true` if no lane has been created yet.
    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }

    pub(crate) fn context(&self) -> &Arc<GroupContext> {
        &self.context
    }
}

impl Default for KeyQueueGroupManager {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueGroupManager for KeyQueueGroupManager {
    type Key = str;

    fn queue_executor(&self, key: &str) -> Result<Arc<QueueExecutor>> {
        if let Some(executor) = self.executors.get(key) {
            return Ok(Arc::clone(executor.value()));
        }

        let executor = self
            .executors
            .entry(key.to_owned())
            .or_insert_with(|| {
                debug!("Creating lane for key '{}'", key);
                Arc::new(QueueExecutor::new(
                    RoutingKey::Key(key.to_owned()),
                    self.factory.build_queue(),
                    Arc::clone(&self.context),
                ))
            })
            .value()
            .clone();
        Ok(executor)
    }

    fn set_alias(&self, key: &str, alias: String) -> Result<()> {
        self.context.set_alias(RoutingKey::from(key), alias);
        Ok(())
    }

    fn alias(&self, key: &str) -> Option<String> {
        self.context.alias(&RoutingKey::from(key))
    }

    fn completed_task_count(&self, key: &str) -> u64 {
        self.executors
            .get(key)
            .map_or(0, |executor| executor.completed_task_count())
    }

    fn set_group_event_listener(&self, listener: Arc<dyn GroupEventListener>) {
        self.context.set_listener(Some(listener));
    }

    fn clear_group_event_listener(&self) {
        self.context.set_listener(None);
    }

    fn executors(&self) -> Vec<Arc<QueueExecutor>> {
        self.executors
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}

impl fmt::Debug for KeyQueueGroupManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyQueueGroupManager")
            .field("lanes", &self.executors.len())
            .field("aliases", &self.context.alias_count())
            .finish()
    }
}
