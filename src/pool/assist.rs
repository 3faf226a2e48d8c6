//! Side executor for housekeeping work that must not occupy a pool worker

use crate::core::task::panic_message;
use crate::core::{BoxedTask, QueueGroupError, Result};
use crossbeam::channel::{self, Sender};
use log::{debug, error, warn};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;

/// Runs auxiliary tasks outside the worker pool.
///
/// The queue group hands it one long-running housekeeping task at build time.
pub trait AssistExecutor: Send + Sync {
    /// Schedules `task` to run.
    ///
    /// # Errors
    ///
    /// Returns an error if the executor no longer accepts tasks.
    fn execute(&self, task: BoxedTask) -> Result<()>;
}

/// [`AssistExecutor`] backed by one dedicated thread running tasks in order.
///
/// # Example
///
/// ```rust
/// use rust_queue_group::core::ClosureTask;
/// use rust_queue_group::pool::{AssistExecutor, SingleThreadAssist};
///
/// let assist = SingleThreadAssist::new("assist").unwrap();
/// assist.execute(ClosureTask::boxed(|| Ok(()))).unwrap();
/// assist.shutdown().unwrap();
/// assert!(assist.execute(ClosureTask::boxed(|| Ok(()))).is_err());
/// ```
pub struct SingleThreadAssist {
    name: String,
    sender: Mutex<Option<Sender<BoxedTask>>>,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl SingleThreadAssist {
    /// Starts the assist thread, named `name`.
    pub fn new<S: Into<String>>(name: S) -> Result<Self> {
        let name = name.into();
        let (sender, receiver) = channel::unbounded::<BoxedTask>();

        let thread_name = name.clone();
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                for mut task in receiver {
                    match catch_unwind(AssertUnwindSafe(|| task.run())) {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            warn!("{}: task {} failed: {}", thread_name, task.task_type(), e)
                        }
                        Err(panic_info) => error!(
                            "{}: task {} panicked: {}",
                            thread_name,
                            task.task_type(),
                            panic_message(panic_info.as_ref())
                        ),
                    }
                }
                debug!("{} stopped", thread_name);
            })
            .map_err(|e| QueueGroupError::spawn_with_source(0, "Cannot create assist thread", e))?;

        Ok(Self {
            name,
            sender: Mutex::new(Some(sender)),
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Stops accepting tasks, lets queued ones finish and joins the thread.
    pub fn shutdown(&self) -> Result<()> {
        self.sender.lock().take();
        if let Some(thread) = self.thread.lock().take() {
            thread
                .join()
                .map_err(|_| QueueGroupError::join(0, format!("{} panicked", self.name)))?;
        }
        Ok(())
    }
}

impl AssistExecutor for SingleThreadAssist {
    fn execute(&self, task: BoxedTask) -> Result<()> {
        let sender = self.sender.lock();
        let sender = sender
            .as_ref()
            .ok_or_else(|| QueueGroupError::not_running(&self.name))?;
        sender
            .send(task)
            .map_err(|_| QueueGroupError::not_running(&self.name))
    }
}

impl Drop for SingleThreadAssist {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Failed to shut down '{}' during drop: {}", self.name, e);
        }
    }
}

impl std::fmt::Debug for SingleThreadAssist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleThreadAssist")
            .field("name", &self.name)
            .field("running", &self.sender.lock().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ClosureTask;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_runs_tasks_in_order_and_survives_failures() {
        let assist = SingleThreadAssist::new("assist-test").expect("Failed to start assist");
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for i in 0..3 {
            let o = Arc::clone(&order);
            assist
                .execute(ClosureTask::boxed(move || {
                    o.lock().push(i);
                    Ok(())
                }))
                .expect("Failed to submit");
        }
        assist
            .execute(ClosureTask::boxed(|| panic!("assist task blew up")))
            .expect("Failed to submit");
        let o = Arc::clone(&order);
        assist
            .execute(ClosureTask::boxed(move || {
                o.lock().push(99);
                Ok(())
            }))
            .expect("Failed to submit");

        assist.shutdown().expect("Failed to shut down");
        assert_eq!(*order.lock(), vec![0, 1, 2, 99]);
    }

    #[test]
    fn test_execute_after_shutdown_fails() {
        let assist = SingleThreadAssist::new("assist-closed").expect("Failed to start assist");
        assist.shutdown().expect("Failed to shut down");
        // Second shutdown is a no-op
        assist.shutdown().expect("Failed to shut down twice");

        let ran = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&ran);
        let result = assist.execute(ClosureTask::boxed(move || {
            r.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
        assert!(matches!(result, Err(QueueGroupError::NotRunning { .. })));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}
