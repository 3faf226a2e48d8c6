//! # Rust Queue Group
//!
//! Keyed task dispatch: tasks sharing a routing key run one at a time in
//! submission order, while tasks of different keys run in parallel on a
//! bounded worker pool.
//!
//! ## Features
//!
//! - **Ordered Lanes**: one FIFO queue per routing key, drained by at most one worker at a time
//! - **Two Key Spaces**: `u16` indexes in a fixed slot table, string keys in a concurrent map
//! - **Elastic Pool**: grows from `core_pool_size` to `max_pool_size` under load, trims idle workers
//! - **Backpressure**: block, block with timeout, or reject when the boss queue is full
//! - **Pluggable Queues**: lane and boss queues chosen by capability through a factory
//! - **Handler Registry**: code to handler factory table swapped atomically on reload
//! - **Graceful Shutdown**: queued lanes are drained before workers exit
//!
//! ## Quick Start
//!
//! ```rust
//! use rust_queue_group::prelude::*;
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//!
//! # fn main() -> Result<()> {
//! let group = QueueGroupExecutor::with_workers(4)?;
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! // Tasks of one key run in order
//! for i in 0..10 {
//!     let seen = Arc::clone(&seen);
//!     group.execute("account-42", move || {
//!         seen.lock().push(i);
//!         Ok(())
//!     })?;
//! }
//!
//! // Shutdown drains every queued lane
//! group.shutdown()?;
//! assert_eq!(*seen.lock(), (0..10).collect::<Vec<_>>());
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use rust_queue_group::prelude::*;
//! use std::time::Duration;
//!
//! # fn main() -> Result<()> {
//! let config = QueueGroupConfig::new(2)
//!     .with_max_pool_size(8)
//!     .with_keep_alive(Duration::from_secs(30))
//!     .with_thread_name_prefix("matching")
//!     .block_with_timeout(Duration::from_millis(100));
//!
//! let group = QueueGroupExecutor::with_config(config)?;
//! group.execute(7u16, || Ok(()))?;
//! # group.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Tasks
//!
//! ```rust
//! use rust_queue_group::prelude::*;
//!
//! struct Settle {
//!     amount: u64,
//! }
//!
//! impl Task for Settle {
//!     fn run(&mut self) -> Result<()> {
//!         println!("Settling {}", self.amount);
//!         Ok(())
//!     }
//!
//!     fn task_type(&self) -> &str {
//!         "Settle"
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! # let group = QueueGroupExecutor::with_workers(2)?;
//! group.submit("ledger", Settle { amount: 100 })?;
//! group.submit_batch(
//!     "ledger",
//!     vec![Box::new(Settle { amount: 1 }), Box::new(Settle { amount: 2 })],
//! )?;
//! # group.shutdown()?;
//! # assert_eq!(group.completed_task_count("ledger"), 3);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod group;
pub mod pool;
pub mod prelude;
pub mod queue;
pub mod registry;
pub mod wait;

pub use core::{BoxedTask, ClosureTask, QueueGroupError, Result, RoutingKey, Task};
pub use pool::{QueueGroupConfig, QueueGroupExecutor, QueueGroupExecutorBuilder};
