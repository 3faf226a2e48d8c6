//! Worker threads and the pool state they share

use crate::core::task::panic_message;
use crate::core::{QueueGroupError, Result};
use crate::group::DrainReport;
use crate::queue::{BossQueue, QueueError, ReadySignal};
use log::{debug, error, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[cfg(feature = "tracing")]
use tracing::{span, Level};

/// Statistics for a worker thread
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Tasks run, including failed ones
    pub tasks_executed: AtomicU64,
    /// Tasks that returned an error or panicked
    pub tasks_failed: AtomicU64,
    /// Tasks that panicked
    pub tasks_panicked: AtomicU64,
    /// Lanes claimed and drained
    pub drain_passes: AtomicU64,
    /// Signals whose lane could not be claimed
    pub signals_dropped: AtomicU64,
    /// Total time spent draining lanes (microseconds)
    pub total_processing_time_us: AtomicU64,
}

impl WorkerStats {
    /// Create new worker statistics
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_drain(&self, report: DrainReport, elapsed: Duration) {
        self.drain_passes.fetch_add(1, Ordering::Relaxed);
        self.tasks_executed
            .fetch_add(report.executed, Ordering::Relaxed);
        self.tasks_failed.fetch_add(report.failed, Ordering::Relaxed);
        self.tasks_panicked
            .fetch_add(report.panicked, Ordering::Relaxed);
        self.total_processing_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    /// Increment signals dropped counter
    pub fn increment_signals_dropped(&self) {
        self.signals_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Fold another worker's counters into this one
    pub(crate) fn absorb(&self, other: &WorkerStats) {
        self.tasks_executed
            .fetch_add(other.get_tasks_executed(), Ordering::Relaxed);
        self.tasks_failed
            .fetch_add(other.get_tasks_failed(), Ordering::Relaxed);
        self.tasks_panicked
            .fetch_add(other.get_tasks_panicked(), Ordering::Relaxed);
        self.drain_passes
            .fetch_add(other.get_drain_passes(), Ordering::Relaxed);
        self.signals_dropped
            .fetch_add(other.get_signals_dropped(), Ordering::Relaxed);
        self.total_processing_time_us.fetch_add(
            other.total_processing_time_us.load(Ordering::Relaxed),
            Ordering::Relaxed,
        );
    }

    /// Get total tasks executed
    pub fn get_tasks_executed(&self) -> u64 {
        self.tasks_executed.load(Ordering::Relaxed)
    }

    /// Get total tasks failed
    pub fn get_tasks_failed(&self) -> u64 {
        self.tasks_failed.load(Ordering::Relaxed)
    }

    /// Get total tasks panicked
    pub fn get_tasks_panicked(&self) -> u64 {
        self.tasks_panicked.load(Ordering::Relaxed)
    }

    /// Get total drain passes
    pub fn get_drain_passes(&self) -> u64 {
        self.drain_passes.load(Ordering::Relaxed)
    }

    /// Get total signals dropped
    pub fn get_signals_dropped(&self) -> u64 {
        self.signals_dropped.load(Ordering::Relaxed)
    }

    /// Get average drain time per pass in microseconds
    pub fn get_average_drain_time_us(&self) -> f64 {
        let total = self.total_processing_time_us.load(Ordering::Relaxed);
        let count = self.drain_passes.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }
}

/// Sizing parameters of the worker pool
#[derive(Clone, Debug)]
pub(crate) struct PoolSizing {
    pub(crate) core_pool_size: usize,
    pub(crate) max_pool_size: usize,
    pub(crate) keep_alive: Duration,
    pub(crate) poll_interval: Duration,
    pub(crate) thread_name_prefix: String,
}

/// State shared by the executor facade and every worker
pub(crate) struct PoolShared {
    pub(crate) boss: Arc<dyn BossQueue>,
    pub(crate) sizing: PoolSizing,
    running: AtomicBool,
    live_workers: AtomicUsize,
    idle_workers: AtomicUsize,
    next_worker_id: AtomicUsize,
    workers: Mutex<Vec<Worker>>,
    retired: WorkerStats,
}

impl PoolShared {
    pub(crate) fn new(boss: Arc<dyn BossQueue>, sizing: PoolSizing) -> Self {
        Self {
            boss,
            sizing,
            running: AtomicBool::new(true),
            live_workers: AtomicUsize::new(0),
            idle_workers: AtomicUsize::new(0),
            next_worker_id: AtomicUsize::new(0),
            workers: Mutex::new(Vec::new()),
            retired: WorkerStats::new(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.sizing.thread_name_prefix
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Clears the running flag; returns `false` if it was already cleared.
    pub(crate) fn stop(&self) -> bool {
        self.running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn live_workers(&self) -> usize {
        self.live_workers.load(Ordering::Acquire)
    }

    pub(crate) fn idle_workers(&self) -> usize {
        self.idle_workers.load(Ordering::Acquire)
    }

    /// Starts the core workers.
    pub(crate) fn start_core(self: &Arc<Self>) -> Result<()> {
        for _ in 0..self.sizing.core_pool_size {
            self.live_workers.fetch_add(1, Ordering::AcqRel);
            if let Err(e) = self.spawn_worker() {
                self.live_workers.fetch_sub(1, Ordering::AcqRel);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Adds a worker when none is idle and the pool is below its maximum.
    pub(crate) fn grow_if_needed(self: &Arc<Self>) {
        if self.idle_workers() > 0 || !self.is_running() {
            return;
        }
        let mut live = self.live_workers();
        while live < self.sizing.max_pool_size {
            match self.live_workers.compare_exchange(
                live,
                live + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    if let Err(e) = self.spawn_worker() {
                        self.live_workers.fetch_sub(1, Ordering::AcqRel);
                        warn!("Queue group '{}' could not grow: {}", self.name(), e);
                    }
                    return;
                }
                Err(current) => live = current,
            }
        }
    }

    /// Gives up one live slot if that keeps the pool at or above its core size.
    fn try_retire(&self) -> bool {
        let mut live = self.live_workers();
        while live > self.sizing.core_pool_size {
            match self.live_workers.compare_exchange(
                live,
                live - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(current) => live = current,
            }
        }
        false
    }

    /// Caller has already reserved a live slot.
    fn spawn_worker(self: &Arc<Self>) -> Result<()> {
        let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        self.idle_workers.fetch_add(1, Ordering::AcqRel);
        match Worker::spawn(id, Arc::clone(self)) {
            Ok(worker) => {
                self.workers.lock().push(worker);
                Ok(())
            }
            Err(e) => {
                self.idle_workers.fetch_sub(1, Ordering::AcqRel);
                Err(e)
            }
        }
    }

    /// Joins workers whose threads have exited, keeping their counters.
    pub(crate) fn reap_finished(&self) -> usize {
        let finished: Vec<Worker> = {
            let mut workers = self.workers.lock();
            let (finished, running): (Vec<_>, Vec<_>) =
                workers.drain(..).partition(Worker::is_finished);
            *workers = running;
            finished
        };
        let count = finished.len();
        for worker in finished {
            self.retired.absorb(&worker.stats);
            if let Err(e) = worker.join() {
                error!("Queue group '{}': {}", self.name(), e);
            }
        }
        count
    }

    /// Joins every worker; used at shutdown after the boss queue is closed.
    pub(crate) fn join_all(&self) -> Result<()> {
        let mut first_error = None;
        loop {
            let workers = std::mem::take(&mut *self.workers.lock());
            if workers.is_empty() {
                break;
            }
            for worker in workers {
                self.retired.absorb(&worker.stats);
                if let Err(e) = worker.join() {
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Drains lanes whose signals are still queued after every worker exited.
    ///
    /// Runs on the shutdown thread; returns the number of lanes drained.
    pub(crate) fn drain_leftover_signals(&self) -> usize {
        let mut drained = 0;
        while let Ok(signal) = self.boss.recv_timeout(Duration::ZERO) {
            if !signal.try_claim() {
                self.retired.increment_signals_dropped();
                continue;
            }
            let start = Instant::now();
            let report = signal.drain();
            self.retired.record_drain(report, start.elapsed());
            drained += 1;
        }
        drained
    }

    pub(crate) fn worker_stats(&self) -> Vec<Arc<WorkerStats>> {
        self.workers.lock().iter().map(Worker::stats).collect()
    }

    /// Counters of live workers plus those already reaped.
    pub(crate) fn aggregate_stats(&self) -> WorkerStats {
        let total = WorkerStats::new();
        total.absorb(&self.retired);
        for stats in self.worker_stats() {
            total.absorb(&stats);
        }
        total
    }
}

/// A worker thread that takes ready signals and drains their lanes
#[derive(Debug)]
pub struct Worker {
    id: usize,
    thread: Option<thread::JoinHandle<()>>,
    stats: Arc<WorkerStats>,
}

impl Worker {
    /// Spawn a worker serving `shared`'s boss queue
    ///
    /// # Shutdown Behavior
    ///
    /// Workers exit when the boss queue is closed and empty, so every lane
    /// with a queued signal is drained before shutdown completes.
    pub(crate) fn spawn(id: usize, shared: Arc<PoolShared>) -> Result<Self> {
        let stats = Arc::new(WorkerStats::new());
        let stats_clone = Arc::clone(&stats);

        let thread = thread::Builder::new()
            .name(format!("{}-{}", shared.name(), id))
            .spawn(move || {
                Self::run(id, shared, stats_clone);
            })
            .map_err(|e| QueueGroupError::spawn_with_source(id, "Cannot create thread", e))?;

        Ok(Self {
            id,
            thread: Some(thread),
            stats,
        })
    }

    /// Get worker statistics
    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |thread| thread.is_finished())
    }

    /// Join the worker thread
    pub fn join(mut self) -> Result<()> {
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|_| QueueGroupError::join(self.id, "Worker panicked"))?;
        }
        Ok(())
    }

    /// Main worker loop
    ///
    /// The worker is counted idle whenever it is not draining. An idle
    /// worker past `keep_alive` retires if the pool is above its core size.
    fn run(id: usize, shared: Arc<PoolShared>, stats: Arc<WorkerStats>) {
        #[cfg(feature = "tracing")]
        let worker_span = span!(Level::DEBUG, "worker", id = id);
        #[cfg(feature = "tracing")]
        let _guard = worker_span.enter();

        debug!("Worker {}-{} started", shared.name(), id);
        let mut idle_since = Instant::now();

        loop {
            match shared.boss.recv_timeout(shared.sizing.poll_interval) {
                Ok(signal) => {
                    shared.idle_workers.fetch_sub(1, Ordering::AcqRel);
                    Self::process(id, signal, &stats);
                    shared.idle_workers.fetch_add(1, Ordering::AcqRel);
                    idle_since = Instant::now();
                }
                Err(QueueError::Empty) => {
                    if idle_since.elapsed() >= shared.sizing.keep_alive && shared.try_retire() {
                        debug!(
                            "Worker {}-{} retiring after {:?} idle",
                            shared.name(),
                            id,
                            idle_since.elapsed()
                        );
                        shared.idle_workers.fetch_sub(1, Ordering::AcqRel);
                        return;
                    }
                }
                Err(_) => {
                    // Boss queue closed and drained
                    debug!(
                        "Worker {}-{} shutting down after {} drain passes",
                        shared.name(),
                        id,
                        stats.get_drain_passes()
                    );
                    break;
                }
            }
        }

        shared.idle_workers.fetch_sub(1, Ordering::AcqRel);
        shared.live_workers.fetch_sub(1, Ordering::AcqRel);
    }

    /// Claim and drain one lane
    fn process(id: usize, signal: ReadySignal, stats: &WorkerStats) {
        if !signal.try_claim() {
            debug!(
                "Worker {} dropped signal for lane {}: already claimed",
                id,
                signal.key()
            );
            stats.increment_signals_dropped();
            return;
        }

        let start = Instant::now();
        let report = signal.drain();
        stats.record_drain(report, start.elapsed());
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            // Use a timeout to prevent Drop from hanging indefinitely
            const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

            let start = Instant::now();
            loop {
                if thread.is_finished() {
                    if let Err(panic_info) = thread.join() {
                        error!(
                            "Worker {} panicked during shutdown: {}",
                            self.id,
                            panic_message(panic_info.as_ref())
                        );
                    }
                    break;
                }

                if start.elapsed() >= JOIN_TIMEOUT {
                    warn!(
                        "Worker {} did not finish within {}s timeout during drop. \
                         Thread may be leaked.",
                        self.id,
                        JOIN_TIMEOUT.as_secs()
                    );
                    break;
                }

                // Small sleep to avoid busy-waiting
                thread::sleep(Duration::from_millis(10));
            }
        }
    }
}
