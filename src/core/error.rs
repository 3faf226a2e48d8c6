//! Error types for the queue group

/// Result type for queue group operations
pub type Result<T> = std::result::Result<T, QueueGroupError>;

/// Errors that can occur in the queue group
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum QueueGroupError {
    /// The executor has been shut down
    #[error("Queue group '{name}' is not running")]
    NotRunning {
        /// Name (thread prefix) of the queue group
        name: String,
    },

    /// The boss queue was closed while a submission was in flight
    #[error("Queue group is shutting down ({pending_signals} signals pending)")]
    ShuttingDown {
        /// Ready signals still waiting for a worker
        pending_signals: usize,
    },

    /// Failed to spawn a worker thread
    #[error("Failed to spawn worker thread #{worker_id}: {message}")]
    SpawnError {
        /// ID of the worker that failed to spawn
        worker_id: usize,
        /// Error message
        message: String,
        /// Source IO error
        #[source]
        source: Option<std::io::Error>,
    },

    /// Failed to join a worker thread
    #[error("Failed to join worker thread #{worker_id}: {message}")]
    JoinError {
        /// ID of the worker that failed to join
        worker_id: usize,
        /// Error message
        message: String,
    },

    /// A task reported failure
    #[error("Task execution failed ({task}): {message}")]
    ExecutionError {
        /// Type name of the failed task
        task: String,
        /// Error message
        message: String,
    },

    /// The boss queue has no room for another ready signal
    #[error("Boss queue is full: {current}/{max} signals queued")]
    BossQueueFull {
        /// Current number of queued signals
        current: usize,
        /// Capacity of the boss queue
        max: usize,
    },

    /// A lane's task queue has no room for the submitted tasks
    #[error("Queue for key '{key}' is full: {requested} task(s) rejected at capacity {capacity}")]
    LaneFull {
        /// Routing key of the lane
        key: String,
        /// Number of tasks in the rejected submission
        requested: usize,
        /// Capacity of the lane's task queue
        capacity: usize,
    },

    /// Submission timed out waiting for boss queue space
    #[error("Submission timed out after {timeout_ms}ms")]
    SubmissionTimeout {
        /// Timeout duration in milliseconds
        timeout_ms: u64,
    },

    /// Index routing key outside the manager's slot table
    #[error("Queue index {index} is out of range (slots: {slots})")]
    IndexOutOfRange {
        /// Requested index
        index: u16,
        /// Number of slots in the table
        slots: usize,
    },

    /// Invalid configuration with parameter
    #[error("Invalid configuration for '{parameter}': {message}")]
    InvalidConfig {
        /// Configuration parameter name
        parameter: String,
        /// Error message
        message: String,
    },

    /// Handler registry reloads were disabled
    #[error("Handler registry reload is disabled")]
    ReloadDisabled,

    /// General error
    #[error("{0}")]
    Other(String),
}

impl QueueGroupError {
    /// Create a not running error
    pub fn not_running(name: impl Into<String>) -> Self {
        QueueGroupError::NotRunning { name: name.into() }
    }

    /// Create a shutting down error
    pub fn shutting_down(pending_signals: usize) -> Self {
        QueueGroupError::ShuttingDown { pending_signals }
    }

    /// Create a spawn error
    pub fn spawn(worker_id: usize, message: impl Into<String>) -> Self {
        QueueGroupError::SpawnError {
            worker_id,
            message: message.into(),
            source: None,
        }
    }

    /// Create a spawn error with source
    pub fn spawn_with_source(
        worker_id: usize,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        QueueGroupError::SpawnError {
            worker_id,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a join error
    pub fn join(worker_id: usize, message: impl Into<String>) -> Self {
        QueueGroupError::JoinError {
            worker_id,
            message: message.into(),
        }
    }

    /// Create an execution error
    pub fn execution(task: impl Into<String>, message: impl Into<String>) -> Self {
        QueueGroupError::ExecutionError {
            task: task.into(),
            message: message.into(),
        }
    }

    /// Create a boss queue full error
    pub fn boss_queue_full(current: usize, max: usize) -> Self {
        QueueGroupError::BossQueueFull { current, max }
    }

    /// Create a lane full error
    pub fn lane_full(key: impl Into<String>, requested: usize, capacity: usize) -> Self {
        QueueGroupError::LaneFull {
            key: key.into(),
            requested,
            capacity,
        }
    }

    /// Create a submission timeout error
    pub fn submission_timeout(timeout_ms: u64) -> Self {
        QueueGroupError::SubmissionTimeout { timeout_ms }
    }

    /// Create an index out of range error
    pub fn index_out_of_range(index: u16, slots: usize) -> Self {
        QueueGroupError::IndexOutOfRange { index, slots }
    }

    /// Create an invalid config error
    pub fn invalid_config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        QueueGroupError::InvalidConfig {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        QueueGroupError::Other(msg.into())
    }

    /// Returns `true` if the submission was refused because a queue was at capacity.
    pub fn is_backpressure(&self) -> bool {
        matches!(
            self,
            QueueGroupError::BossQueueFull { .. }
                | QueueGroupError::LaneFull { .. }
                | QueueGroupError::SubmissionTimeout { .. }
        )
    }
}
