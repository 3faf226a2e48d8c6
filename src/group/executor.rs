//! Per-key lane: FIFO task queue plus claim token.

use super::GroupContext;
use crate::core::task::panic_message;
use crate::core::{BoxedTask, QueueGroupError, Result, RoutingKey};
use crate::queue::{QueueCapabilities, ReadySignal, TaskQueue};
use crossbeam_utils::CachePadded;
use log::{error, warn};
use parking_lot::Mutex;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::{span, Level};

const IDLE: u8 = 0;
const PENDING: u8 = 1;
const DRAINING: u8 = 2;

/// Claim token state of a lane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LaneState {
    /// No signal outstanding and no worker draining; the queue is empty
    Idle,
    /// A ready signal is queued on the boss queue
    Pending,
    /// A worker owns the lane and is running its tasks
    Draining,
}

impl LaneState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            PENDING => LaneState::Pending,
            DRAINING => LaneState::Draining,
            _ => LaneState::Idle,
        }
    }
}

/// Outcome counts of one drain pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct DrainReport {
    pub(crate) executed: u64,
    pub(crate) failed: u64,
    pub(crate) panicked: u64,
}

/// Runs the tasks of one routing key in submission order, never two at once.
///
/// # Claim token
///
/// ```text
///   idle --(producer appends, publishes signal)--> pending
///   pending --(worker claims)--> draining
///   draining --(queue empty at release)--> idle
/// ```
///
/// Every append and the release check run under the lane's submit lock, so
/// `idle` always implies an empty queue. A task appended while the drainer
/// is releasing either keeps that drainer going or finds the lane idle and
/// publishes a fresh signal; no wake-up is lost.
pub struct QueueExecutor {
    key: RoutingKey,
    queue: Box<dyn TaskQueue>,
    state: CachePadded<AtomicU8>,
    submit_lock: Mutex<()>,
    completed: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
    context: Arc<GroupContext>,
}

impl QueueExecutor {
    pub(crate) fn new(key: RoutingKey, queue: Box<dyn TaskQueue>, context: Arc<GroupContext>) -> Self {
        Self {
            key,
            queue,
            state: CachePadded::new(AtomicU8::new(IDLE)),
            submit_lock: Mutex::new(()),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
            context,
        }
    }

    /// Routing key served by this lane.
    pub fn key(&self) -> &RoutingKey {
        &self.key
    }

    /// Appends a task; a worker picks the lane up asynchronously.
    ///
    /// # Errors
    ///
    /// - [`QueueGroupError::LaneFull`] if the lane's queue has no room
    /// - boss queue backpressure errors per the group's strategy
    /// - [`QueueGroupError::NotRunning`] if the owning queue group is not running
    pub fn execute(self: &Arc<Self>, task: BoxedTask) -> Result<()> {
        self.execute_batch(vec![task])
    }

    /// Appends `tasks` as one contiguous, ordered run.
    ///
    /// # Errors
    ///
    /// Same as [`execute`](Self::execute). On error none of the tasks is queued.
    pub fn execute_batch(self: &Arc<Self>, tasks: Vec<BoxedTask>) -> Result<()> {
        let sink = self
            .context
            .sink()
            .ok_or_else(|| QueueGroupError::not_running(format!("lane {}", self.key)))?;
        self.append(tasks, |signal| sink.publish(signal))
    }

    /// Appends under the submit lock and publishes a signal if the lane was idle.
    ///
    /// If `publish` fails, the lane had no consumer and held nothing but this
    /// submission, so the tasks are taken back out and the lane returns to idle.
    pub(crate) fn append<P>(self: &Arc<Self>, tasks: Vec<BoxedTask>, publish: P) -> Result<()>
    where
        P: FnOnce(ReadySignal) -> Result<()>,
    {
        if tasks.is_empty() {
            return Ok(());
        }
        let requested = tasks.len();

        let _guard = self.submit_lock.lock();
        if let Some(remaining) = self.queue.remaining_capacity() {
            if remaining < requested {
                return Err(self.lane_full(requested));
            }
        }

        let mut appended = 0;
        for task in tasks {
            match self.queue.offer(task) {
                Ok(()) => appended += 1,
                Err(_) => break,
            }
        }

        let outcome = if self
            .state
            .compare_exchange(IDLE, PENDING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            match publish(Arc::clone(self)) {
                Ok(()) => Ok(()),
                Err(err) => {
                    for _ in 0..appended {
                        let _ = self.queue.poll();
                    }
                    self.state.store(IDLE, Ordering::Release);
                    Err(err)
                }
            }
        } else {
            Ok(())
        };

        if outcome.is_ok() && appended < requested {
            // Only reachable with a queue whose remaining_capacity overstates room
            error!(
                "Lane {} accepted {} of {} tasks from one batch",
                self.key, appended, requested
            );
            return Err(self.lane_full(requested - appended));
        }
        outcome
    }

    fn lane_full(&self, requested: usize) -> QueueGroupError {
        QueueGroupError::lane_full(
            self.key.to_string(),
            requested,
            self.queue.capabilities().capacity.unwrap_or(0),
        )
    }

    /// Moves the token from pending to draining. Fails for a stale signal.
    pub(crate) fn try_claim(&self) -> bool {
        self.state
            .compare_exchange(PENDING, DRAINING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Runs tasks until the queue is observed empty at release.
    ///
    /// Caller must hold the claim from [`try_claim`](Self::try_claim).
    pub(crate) fn drain(&self) -> DrainReport {
        #[cfg(feature = "tracing")]
        let _span = span!(Level::DEBUG, "drain", key = %self.key).entered();

        let mut report = DrainReport::default();
        loop {
            while let Some(task) = self.queue.poll() {
                self.run_task(task, &mut report);
            }
            if self.release() {
                return report;
            }
        }
    }

    fn release(&self) -> bool {
        let _guard = self.submit_lock.lock();
        if self.queue.is_empty() {
            self.state.store(IDLE, Ordering::Release);
            true
        } else {
            false
        }
    }

    fn run_task(&self, mut task: BoxedTask, report: &mut DrainReport) {
        if let Some(listener) = self.context.listener() {
            let notified = catch_unwind(AssertUnwindSafe(|| {
                listener.on_queue_handle_task(&self.key, task.as_ref())
            }));
            if let Err(panic_info) = notified {
                error!(
                    "Group event listener panicked on lane {}: {}",
                    self,
                    panic_message(panic_info.as_ref())
                );
            }
        }

        match catch_unwind(AssertUnwindSafe(|| task.run())) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(
                    "Task {} failed on lane {} ({}): {}",
                    task.task_type(),
                    self,
                    self.queue.capabilities().implementation_name,
                    e
                );
                self.failed.fetch_add(1, Ordering::Relaxed);
                report.failed += 1;
            }
            Err(panic_info) => {
                error!(
                    "Task {} panicked on lane {} ({}): {}",
                    task.task_type(),
                    self,
                    self.queue.capabilities().implementation_name,
                    panic_message(panic_info.as_ref())
                );
                self.failed.fetch_add(1, Ordering::Relaxed);
                self.panicked.fetch_add(1, Ordering::Relaxed);
                report.failed += 1;
                report.panicked += 1;
            }
        }

        self.completed.fetch_add(1, Ordering::Relaxed);
        report.executed += 1;
    }

    /// Current claim token state.
    pub fn state(&self) -> LaneState {
        LaneState::from_raw(self.state.load(Ordering::Acquire))
    }

    /// Tasks waiting in the lane.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if no task is waiting.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Tasks that finished running, successfully or not.
    pub fn completed_task_count(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Tasks that returned an error or panicked.
    pub fn failed_task_count(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Tasks that panicked.
    pub fn panicked_task_count(&self) -> u64 {
        self.panicked.load(Ordering::Relaxed)
    }

    /// Capabilities of the lane's task queue.
    pub fn capabilities(&self) -> QueueCapabilities {
        self.queue.capabilities()
    }
}

/// Renders the lane's key, followed by its alias when one is set.
impl fmt::Display for QueueExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.context.alias(&self.key) {
            Some(alias) => write!(f, "{} ({})", self.key, alias),
            None => write!(f, "{}", self.key),
        }
    }
}

impl fmt::Debug for QueueExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueExecutor")
            .field("key", &self.key)
            .field("state", &self.state())
            .field("pending", &self.len())
            .field("completed", &self.completed_task_count())
            .finish()
    }
}
