//! Core types and traits for the queue group

pub mod error;
pub mod routing;
pub mod task;

pub use error::{QueueGroupError, Result};
pub use routing::RoutingKey;
pub use task::{BoxedTask, ClosureTask, Task};
