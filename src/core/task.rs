//! Task trait and related types

use crate::core::error::Result;
use std::any::Any;
use std::fmt;

/// A unit of work routed to a lane and run by a worker
pub trait Task: Send {
    /// Run the task
    ///
    /// # Errors
    ///
    /// Returns an error if the task fails. The error is logged and counted
    /// by the lane; it never stops the lane from draining.
    fn run(&mut self) -> Result<()>;

    /// Get the task's type name for diagnostics
    fn task_type(&self) -> &str {
        "Task"
    }
}

impl fmt::Debug for dyn Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task({})", self.task_type())
    }
}

/// A boxed task that can be sent across threads
pub type BoxedTask = Box<dyn Task>;

/// Helper to create a task from a closure
pub struct ClosureTask<F>
where
    F: FnOnce() -> Result<()> + Send,
{
    closure: Option<F>,
    name: String,
}

impl<F> ClosureTask<F>
where
    F: FnOnce() -> Result<()> + Send,
{
    /// Create a new closure task
    pub fn new(closure: F) -> Self {
        Self {
            closure: Some(closure),
            name: "ClosureTask".to_string(),
        }
    }

    /// Create a new closure task with a custom name
    pub fn with_name<S: Into<String>>(closure: F, name: S) -> Self {
        Self {
            closure: Some(closure),
            name: name.into(),
        }
    }
}

impl<F> ClosureTask<F>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    /// Box a closure as a [`BoxedTask`]
    pub fn boxed(closure: F) -> BoxedTask {
        Box::new(Self::new(closure))
    }
}

impl<F> Task for ClosureTask<F>
where
    F: FnOnce() -> Result<()> + Send,
{
    fn run(&mut self) -> Result<()> {
        match self.closure.take() {
            Some(closure) => closure(),
            None => Err(crate::core::QueueGroupError::other(
                "ClosureTask already ran - cannot run twice",
            )),
        }
    }

    fn task_type(&self) -> &str {
        &self.name
    }
}

/// Extracts the message from a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
