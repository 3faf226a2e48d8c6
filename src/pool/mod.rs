//! Worker pool and the queue group executor facade

mod assist;
pub(crate) mod config;
mod group_executor;
mod stats;
mod worker;

pub use assist::{AssistExecutor, SingleThreadAssist};
pub use config::QueueGroupConfig;
pub use group_executor::{QueueGroupExecutor, QueueGroupExecutorBuilder};
pub use stats::QueueGroupStats;
pub use worker::WorkerStats;
