//! Fixed slot table of lanes addressed by `u16` index.

use super::{GroupContext, GroupEventListener, QueueExecutor, QueueGroupManager};
use crate::core::{QueueGroupError, Result, RoutingKey};
use crate::queue::{QueueFactory, RequirementsQueueFactory};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Largest slot table an index manager can address.
pub const MAX_INDEX_SLOTS: usize = u16::MAX as usize + 1;

/// Resolves `u16` routing keys through a table allocated up front.
///
/// Lookups are a bounds check plus one slot read. Slots are filled either
/// eagerly at construction or on first use; concurrent first use of an index
/// still yields exactly one executor.
///
/// # Example
///
/// ```rust
/// use rust_queue_group::group::{IndexQueueGroupManager, QueueGroupManager};
/// use std::sync::Arc;
///
/// let manager = IndexQueueGroupManager::with_slots(16).unwrap();
/// let a = manager.queue_executor(&3).unwrap();
/// let b = manager.queue_executor(&3).unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// assert!(manager.queue_executor(&16).is_err());
/// ```
pub struct IndexQueueGroupManager {
    slots: Box<[OnceLock<Arc<QueueExecutor>>]>,
    factory: Arc<dyn QueueFactory>,
    context: Arc<GroupContext>,
}

impl IndexQueueGroupManager {
    /// Creates a manager with `slots` lanes whose queues come from `factory`.
    ///
    /// With `eager`, every lane is created now instead of on first use.
    ///
    /// # Errors
    ///
    /// Returns [`QueueGroupError::InvalidConfig`] unless `1 <= slots <= 65536`.
    pub fn new(factory: Arc<dyn QueueFactory>, slots: usize, eager: bool) -> Result<Self> {
        if slots == 0 || slots > MAX_INDEX_SLOTS {
            return Err(QueueGroupError::invalid_config(
                "index_slots",
                format!("must be between 1 and {}, got {}", MAX_INDEX_SLOTS, slots),
            ));
        }

        let manager = Self {
            slots: (0..slots).map(|_| OnceLock::new()).collect(),
            factory,
            context: Arc::new(GroupContext::default()),
        };
        if eager {
            for index in 0..slots {
                manager.slot(index as u16)?;
            }
        }
        Ok(manager)
    }

    /// Creates a lazily populated manager with unbounded lane queues.
    pub fn with_slots(slots: usize) -> Result<Self> {
        Self::new(Arc::new(RequirementsQueueFactory::default()), slots, false)
    }

    /// Size of the slot table.
    pub fn slots(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn context(&self) -> &Arc<GroupContext> {
        &self.context
    }

    fn slot(&self, index: u16) -> Result<&Arc<QueueExecutor>> {
        let slot = self
            .slots
            .get(index as usize)
            .ok_or_else(|| QueueGroupError::index_out_of_range(index, self.slots.len()))?;
        Ok(slot.get_or_init(|| {
            Arc::new(QueueExecutor::new(
                RoutingKey::Index(index),
                self.factory.build_queue(),
                Arc::clone(&self.context),
            ))
        }))
    }

    fn check_bounds(&self, index: u16) -> Result<()> {
        if (index as usize) < self.slots.len() {
            Ok(())
        } else {
            Err(QueueGroupError::index_out_of_range(index, self.slots.len()))
        }
    }
}

impl QueueGroupManager for IndexQueueGroupManager {
    type Key = u16;

    fn queue_executor(&self, index: &u16) -> Result<Arc<QueueExecutor>> {
        self.slot(*index).map(Arc::clone)
    }

    fn set_alias(&self, index: &u16, alias: String) -> Result<()> {
        self.check_bounds(*index)?;
        self.context.set_alias(RoutingKey::Index(*index), alias);
        Ok(())
    }

    fn alias(&self, index: &u16) -> Option<String> {
        self.context.alias(&RoutingKey::Index(*index))
    }

    fn completed_task_count(&self, index: &u16) -> u64 {
        self.slots
            .get(*index as usize)
            .and_then(OnceLock::get)
            .map_or(0, |executor| executor.completed_task_count())
    }

    fn set_group_event_listener(&self, listener: Arc<dyn GroupEventListener>) {
        self.context.set_listener(Some(listener));
    }

    fn clear_group_event_listener(&self) {
        self.context.set_listener(None);
    }

    fn executors(&self) -> Vec<Arc<QueueExecutor>> {
        self.slots
            .iter()
            .filter_map(OnceLock::get)
            .cloned()
            .collect()
    }
}

impl fmt::Debug for IndexQueueGroupManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexQueueGroupManager")
            .field("slots", &self.slots.len())
            .field("live", &self.slots.iter().filter(|slot| slot.get().is_some()).count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_slot_bounds() {
        assert!(IndexQueueGroupManager::with_slots(0).is_err());
        assert!(IndexQueueGroupManager::with_slots(MAX_INDEX_SLOTS + 1).is_err());

        let manager = IndexQueueGroupManager::with_slots(MAX_INDEX_SLOTS).unwrap();
        assert!(manager.queue_executor(&u16::MAX).is_ok());

        let manager = IndexQueueGroupManager::with_slots(8).unwrap();
        match manager.queue_executor(&8) {
            Err(QueueGroupError::IndexOutOfRange { index, slots }) => {
                assert_eq!(index, 8);
                assert_eq!(slots, 8);
            }
            other => panic!("expected IndexOutOfRange, got {:?}", other),
        }
        assert!(manager.set_alias(&8, "nope".into()).is_err());
    }

    #[test]
    fn test_lazy_and_eager_population() {
        let lazy = IndexQueueGroupManager::with_slots(4).unwrap();
        assert!(lazy.executors().is_empty());
        lazy.queue_executor(&2).unwrap();
        assert_eq!(lazy.executors().len(), 1);

        let eager =
            IndexQueueGroupManager::new(Arc::new(RequirementsQueueFactory::default()), 4, true)
                .unwrap();
        assert_eq!(eager.executors().len(), 4);
        assert_eq!(eager.executors()[3].key(), &RoutingKey::Index(3));
    }

    #[test]
    fn test_concurrent_first_use_yields_one_executor() {
        let manager = Arc::new(IndexQueueGroupManager::with_slots(64).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&manager);
                thread::spawn(move || m.queue_executor(&42).unwrap())
            })
            .collect();

        let executors: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for executor in &executors[1..] {
            assert!(Arc::ptr_eq(&executors[0], executor));
        }
        assert_eq!(manager.executors().len(), 1);
    }

    #[test]
    fn test_alias_and_counts() {
        let manager = IndexQueueGroupManager::with_slots(4).unwrap();
        assert_eq!(manager.alias(&1), None);
        manager.set_alias(&1, "inventory".into()).unwrap();
        manager.set_alias(&1, "inventory-v2".into()).unwrap();
        assert_eq!(manager.alias(&1).as_deref(), Some("inventory-v2"));

        // Unused keys report zero without creating a lane
        assert_eq!(manager.completed_task_count(&3), 0);
        assert_eq!(manager.total_completed_task_count(), 0);
        assert!(manager.executors().is_empty());
    }

    #[test]
    fn test_lane_display_carries_alias() {
        let manager = IndexQueueGroupManager::with_slots(4).unwrap();
        let lane = manager.queue_executor(&2).unwrap();
        assert_eq!(lane.to_string(), "#2");

        manager.set_alias(&2, "inventory".into()).unwrap();
        assert_eq!(lane.to_string(), "#2 (inventory)");
        assert_eq!(manager.queue_executor(&1).unwrap().to_string(), "#1");
    }
}
