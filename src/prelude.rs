//! Convenient re-exports for common types and traits

pub use crate::core::{BoxedTask, ClosureTask, QueueGroupError, Result, RoutingKey, Task};
pub use crate::group::{
    GroupEventListener, IndexQueueGroupManager, KeyQueueGroupManager, QueueExecutor,
    QueueGroupManager,
};
pub use crate::pool::{
    QueueGroupConfig, QueueGroupExecutor, QueueGroupExecutorBuilder, QueueGroupStats, WorkerStats,
};
pub use crate::queue::{BackpressureStrategy, QueueFactory, TaskQueue};
pub use crate::registry::{HandlerRegistry, Registration};
