//! Queue group executor: routes keyed tasks into lanes served by a worker pool

use super::assist::{AssistExecutor, SingleThreadAssist};
use super::config::QueueGroupConfig;
use super::stats::QueueGroupStats;
use super::worker::{PoolShared, PoolSizing, WorkerStats};
use crate::core::{BoxedTask, ClosureTask, QueueGroupError, Result, RoutingKey, Task};
use crate::group::{
    GroupEventListener, IndexQueueGroupManager, KeyQueueGroupManager, QueueExecutor,
    QueueGroupManager, SignalSink,
};
use crate::queue::{
    ArrayBossQueue, BackpressureStats, BackpressureStatsSnapshot, BackpressureStrategy, BossQueue,
    CapabilityFlags, ChannelBossQueue, QueueFactory, ReadySignal, RequirementsQueueFactory,
};
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use log::{debug, error, log_enabled, warn, Level};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Publishes ready signals for running lanes, growing the pool on demand.
struct Dispatcher {
    shared: Arc<PoolShared>,
    strategy: BackpressureStrategy,
    stats: BackpressureStats,
}

impl SignalSink for Dispatcher {
    fn publish(&self, signal: ReadySignal) -> Result<()> {
        if !self.shared.is_running() {
            return Err(QueueGroupError::not_running(self.shared.name()));
        }
        self.shared.grow_if_needed();
        self.strategy
            .publish(self.shared.boss.as_ref(), signal, &self.stats)
    }
}

/// Builder for [`QueueGroupExecutor`]
///
/// # Example
///
/// ```rust
/// use rust_queue_group::pool::QueueGroupExecutor;
/// use rust_queue_group::queue::BackpressureStrategy;
///
/// let group = QueueGroupExecutor::builder()
///     .core_pool_size(2)
///     .max_pool_size(4)
///     .boss_queue_capacity(1024)
///     .backpressure_strategy(BackpressureStrategy::RejectImmediately)
///     .thread_name_prefix("orders")
///     .build()
///     .unwrap();
///
/// group.execute("customer-17", || Ok(())).unwrap();
/// group.shutdown().unwrap();
/// ```
#[derive(Default)]
pub struct QueueGroupExecutorBuilder {
    config: QueueGroupConfig,
    boss_queue: Option<Arc<dyn BossQueue>>,
    queue_factory: Option<Arc<dyn QueueFactory>>,
    assist_executor: Option<Arc<dyn AssistExecutor>>,
    index_manager: Option<Arc<IndexQueueGroupManager>>,
    key_manager: Option<Arc<KeyQueueGroupManager>>,
}

impl QueueGroupExecutorBuilder {
    /// Create a builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn config(mut self, config: QueueGroupConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the number of core workers
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn core_pool_size(mut self, size: usize) -> Self {
        self.config.core_pool_size = size;
        self
    }

    /// Set the maximum number of workers
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn max_pool_size(mut self, size: usize) -> Self {
        self.config.max_pool_size = size;
        self
    }

    /// Set how long a non-core worker may sit idle before exiting
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.config.keep_alive = keep_alive;
        self
    }

    /// Set the worker poll interval
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set the housekeeping period
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn housekeeping_interval(mut self, interval: Duration) -> Self {
        self.config.housekeeping_interval = interval;
        self
    }

    /// Set thread name prefix
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    /// Set the capacity of the default boss queue (0 = unbounded)
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn boss_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.boss_queue_capacity = capacity;
        self
    }

    /// Use a custom boss queue; `boss_queue_capacity` is then ignored
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn boss_queue(mut self, queue: Arc<dyn BossQueue>) -> Self {
        self.boss_queue = Some(queue);
        self
    }

    /// Use a custom factory for lane queues
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn queue_factory(mut self, factory: Arc<dyn QueueFactory>) -> Self {
        self.queue_factory = Some(factory);
        self
    }

    /// Run housekeeping on a caller-owned executor
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn assist_executor(mut self, executor: Arc<dyn AssistExecutor>) -> Self {
        self.assist_executor = Some(executor);
        self
    }

    /// Set the index manager's slot count
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn index_slots(mut self, slots: usize) -> Self {
        self.config.index_slots = slots;
        self
    }

    /// Create all index lanes at build time
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn eager_index(mut self, eager: bool) -> Self {
        self.config.eager_index = eager;
        self
    }

    /// Set the backpressure strategy for the boss queue
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn backpressure_strategy(mut self, strategy: BackpressureStrategy) -> Self {
        self.config.backpressure_strategy = strategy;
        self
    }

    /// Use a prebuilt index manager; `index_slots`, `eager_index` and the
    /// queue factory do not apply to it
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn index_manager(mut self, manager: Arc<IndexQueueGroupManager>) -> Self {
        self.index_manager = Some(manager);
        self
    }

    /// Use a prebuilt key manager; the queue factory does not apply to it
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn key_manager(mut self, manager: Arc<KeyQueueGroupManager>) -> Self {
        self.key_manager = Some(manager);
        self
    }

    /// Validate the configuration, start the core workers and housekeeping
    pub fn build(self) -> Result<QueueGroupExecutor> {
        let config = self.config;
        config.validate()?;

        let boss: Arc<dyn BossQueue> = match self.boss_queue {
            Some(boss) => boss,
            None if config.boss_queue_capacity == 0 => Arc::new(ChannelBossQueue::unbounded()),
            None => Arc::new(ArrayBossQueue::new(config.boss_queue_capacity)),
        };
        let required = CapabilityFlags::MPMC | CapabilityFlags::BLOCKING;
        if !boss.supports(required) {
            return Err(QueueGroupError::invalid_config(
                "boss_queue",
                format!(
                    "{} lacks required capabilities: {}",
                    boss.capabilities().implementation_name,
                    boss.capabilities().missing(required).join(", ")
                ),
            ));
        }

        let factory: Arc<dyn QueueFactory> = self
            .queue_factory
            .unwrap_or_else(|| Arc::new(RequirementsQueueFactory::default()));
        let index = match self.index_manager {
            Some(manager) => manager,
            None => Arc::new(IndexQueueGroupManager::new(
                Arc::clone(&factory),
                config.index_slots,
                config.eager_index,
            )?),
        };
        let keys = self
            .key_manager
            .unwrap_or_else(|| Arc::new(KeyQueueGroupManager::with_factory(factory)));

        let (assist, owned_assist) = match self.assist_executor {
            Some(assist) => (assist, None),
            None => {
                let owned = Arc::new(SingleThreadAssist::new(format!(
                    "{}-assist",
                    config.thread_name_prefix
                ))?);
                (Arc::clone(&owned) as Arc<dyn AssistExecutor>, Some(owned))
            }
        };

        let shared = Arc::new(PoolShared::new(
            boss,
            PoolSizing {
                core_pool_size: config.core_pool_size,
                max_pool_size: config.max_pool_size,
                keep_alive: config.keep_alive,
                poll_interval: config.poll_interval,
                thread_name_prefix: config.thread_name_prefix.clone(),
            },
        ));
        if let Err(e) = shared.start_core() {
            shared.stop();
            shared.boss.close();
            // Best effort: the spawn error is the one worth reporting
            let _ = shared.join_all();
            return Err(e);
        }

        let dispatcher = Arc::new(Dispatcher {
            shared: Arc::clone(&shared),
            strategy: config.backpressure_strategy,
            stats: BackpressureStats::new(),
        });
        index.context().attach(Arc::clone(&dispatcher) as Arc<dyn SignalSink>);
        keys.context().attach(Arc::clone(&dispatcher) as Arc<dyn SignalSink>);

        let group = QueueGroupExecutor {
            config,
            shared,
            dispatcher,
            index,
            keys,
            owned_assist,
            housekeeping_stop: Mutex::new(None),
            total_tasks_submitted: AtomicU64::new(0),
        };
        group.start_housekeeping(assist.as_ref())?;

        debug!(
            "Queue group '{}' started with {} core workers (max {})",
            group.config.thread_name_prefix, group.config.core_pool_size, group.config.max_pool_size
        );
        Ok(group)
    }
}

/// Sharded task dispatcher
///
/// Tasks are routed by [`RoutingKey`] into lanes. Tasks of one key run in
/// submission order and never concurrently; different keys run in parallel
/// on a pool of between `core_pool_size` and `max_pool_size` workers.
///
/// # Shutdown Mechanism
///
/// Shutdown stops new submissions and closes the boss queue. Workers keep
/// draining lanes whose signals are already queued and exit once it is
/// empty, so accepted work is finished before shutdown returns.
pub struct QueueGroupExecutor {
    config: QueueGroupConfig,
    shared: Arc<PoolShared>,
    dispatcher: Arc<Dispatcher>,
    index: Arc<IndexQueueGroupManager>,
    keys: Arc<KeyQueueGroupManager>,
    owned_assist: Option<Arc<SingleThreadAssist>>,
    housekeeping_stop: Mutex<Option<Sender<()>>>,
    total_tasks_submitted: AtomicU64,
}

impl std::fmt::Debug for QueueGroupExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueGroupExecutor")
            .field("config", &self.config)
            .field("running", &self.shared.is_running())
            .field("live_workers", &self.shared.live_workers())
            .field(
                "total_tasks_submitted",
                &self.total_tasks_submitted.load(Ordering::Relaxed),
            )
            .finish()
    }
}

impl QueueGroupExecutor {
    /// Create a builder
    pub fn builder() -> QueueGroupExecutorBuilder {
        QueueGroupExecutorBuilder::new()
    }

    /// Create a queue group with default configuration
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a queue group with a fixed pool of `workers` threads
    pub fn with_workers(workers: usize) -> Result<Self> {
        Self::builder().config(QueueGroupConfig::new(workers)).build()
    }

    /// Create a queue group from a configuration
    pub fn with_config(config: QueueGroupConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    fn start_housekeeping(&self, assist: &dyn AssistExecutor) -> Result<()> {
        let (stop_tx, stop_rx) = channel::bounded::<()>(0);
        let shared = Arc::clone(&self.shared);
        let dispatcher = Arc::clone(&self.dispatcher);
        let index = Arc::clone(&self.index);
        let keys = Arc::clone(&self.keys);
        let interval = self.config.housekeeping_interval;

        let housekeeping = move || {
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let reaped = shared.reap_finished();
                        if reaped > 0 {
                            debug!("Queue group '{}' reaped {} workers", shared.name(), reaped);
                        }
                        if log_enabled!(Level::Debug) {
                            let stats = QueueGroupStats::collect(
                                &shared,
                                &index,
                                &keys,
                                dispatcher.stats.snapshot(),
                            );
                            debug!("{}", stats.to_json());
                        }
                    }
                    _ => break,
                }
            }
            Ok(())
        };

        assist.execute(Box::new(ClosureTask::with_name(housekeeping, "Housekeeping")))?;
        *self.housekeeping_stop.lock() = Some(stop_tx);
        Ok(())
    }

    fn ensure_running(&self) -> Result<()> {
        if self.shared.is_running() {
            Ok(())
        } else {
            Err(QueueGroupError::not_running(&self.config.thread_name_prefix))
        }
    }

    fn resolve(&self, key: &RoutingKey) -> Result<Arc<QueueExecutor>> {
        match key {
            RoutingKey::Index(index) => self.index.queue_executor(index),
            RoutingKey::Key(key) => self.keys.queue_executor(key),
        }
    }

    /// Submit a task to the lane of `key`
    ///
    /// Returns once the task is queued. If the lane was idle, a ready signal
    /// is published under the configured [`BackpressureStrategy`].
    ///
    /// # Errors
    ///
    /// - `QueueGroupError::NotRunning` - group is shut down
    /// - `QueueGroupError::IndexOutOfRange` - index beyond the slot table
    /// - `QueueGroupError::LaneFull` - the lane's bounded queue is full
    /// - `QueueGroupError::BossQueueFull` / `SubmissionTimeout` - boss queue backpressure
    pub fn submit<K, T>(&self, key: K, task: T) -> Result<()>
    where
        K: Into<RoutingKey>,
        T: Task + 'static,
    {
        self.submit_batch(key, vec![Box::new(task)])
    }

    /// Submit tasks as one contiguous, ordered run on the lane of `key`
    ///
    /// No task of another submission to the same key interleaves with the
    /// batch. On error none of the tasks is queued.
    pub fn submit_batch<K>(&self, key: K, tasks: Vec<BoxedTask>) -> Result<()>
    where
        K: Into<RoutingKey>,
    {
        self.ensure_running()?;
        let count = tasks.len() as u64;
        let executor = self.resolve(&key.into())?;
        executor.append(tasks, |signal| self.dispatcher.publish(signal))?;
        self.total_tasks_submitted
            .fetch_add(count, Ordering::Relaxed);
        Ok(())
    }

    /// Submit a closure as a task
    pub fn execute<K, F>(&self, key: K, f: F) -> Result<()>
    where
        K: Into<RoutingKey>,
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.submit(key, ClosureTask::new(f))
    }

    /// Submit closures as one contiguous, ordered run
    pub fn execute_batch<K, F, I>(&self, key: K, closures: I) -> Result<()>
    where
        K: Into<RoutingKey>,
        F: FnOnce() -> Result<()> + Send + 'static,
        I: IntoIterator<Item = F>,
    {
        let tasks = closures.into_iter().map(ClosureTask::boxed).collect();
        self.submit_batch(key, tasks)
    }

    /// Get the lane executor of `key`, creating it on first use
    pub fn queue_executor<K: Into<RoutingKey>>(&self, key: K) -> Result<Arc<QueueExecutor>> {
        self.resolve(&key.into())
    }

    /// Attach a human-readable alias to `key`
    pub fn set_alias<K, S>(&self, key: K, alias: S) -> Result<()>
    where
        K: Into<RoutingKey>,
        S: Into<String>,
    {
        match key.into() {
            RoutingKey::Index(index) => self.index.set_alias(&index, alias.into()),
            RoutingKey::Key(key) => self.keys.set_alias(&key, alias.into()),
        }
    }

    /// Get the alias of `key`, if any
    pub fn alias<K: Into<RoutingKey>>(&self, key: K) -> Option<String> {
        match key.into() {
            RoutingKey::Index(index) => self.index.alias(&index),
            RoutingKey::Key(key) => self.keys.alias(&key),
        }
    }

    /// Tasks finished across every lane, failed ones included
    pub fn total_completed_task_count(&self) -> u64 {
        self.index.total_completed_task_count() + self.keys.total_completed_task_count()
    }

    /// Tasks finished on the lane of `key`; 0 if the lane was never used
    pub fn completed_task_count<K: Into<RoutingKey>>(&self, key: K) -> u64 {
        match key.into() {
            RoutingKey::Index(index) => self.index.completed_task_count(&index),
            RoutingKey::Key(key) => self.keys.completed_task_count(&key),
        }
    }

    /// Install a listener called on the worker thread before every task
    pub fn set_group_event_listener(&self, listener: Arc<dyn GroupEventListener>) {
        self.index.set_group_event_listener(Arc::clone(&listener));
        self.keys.set_group_event_listener(listener);
    }

    /// Remove the listener
    pub fn clear_group_event_listener(&self) {
        self.index.clear_group_event_listener();
        self.keys.clear_group_event_listener();
    }

    /// Get the index manager
    pub fn index_manager(&self) -> &Arc<IndexQueueGroupManager> {
        &self.index
    }

    /// Get the key manager
    pub fn key_manager(&self) -> &Arc<KeyQueueGroupManager> {
        &self.keys
    }

    /// Check if the group is running
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Get the number of live worker threads
    pub fn live_workers(&self) -> usize {
        self.shared.live_workers()
    }

    /// Get the number of ready signals waiting for a worker
    pub fn pending_signals(&self) -> usize {
        self.shared.boss.len()
    }

    /// Get total number of tasks accepted
    pub fn total_tasks_submitted(&self) -> u64 {
        self.total_tasks_submitted.load(Ordering::Relaxed)
    }

    /// Get statistics for all live workers
    pub fn worker_stats(&self) -> Vec<Arc<WorkerStats>> {
        self.shared.worker_stats()
    }

    /// Get boss queue publish counters
    pub fn backpressure_stats(&self) -> BackpressureStatsSnapshot {
        self.dispatcher.stats.snapshot()
    }

    /// Take a statistics snapshot
    pub fn stats(&self) -> QueueGroupStats {
        QueueGroupStats::collect(
            &self.shared,
            &self.index,
            &self.keys,
            self.dispatcher.stats.snapshot(),
        )
    }

    /// Shut down and wait for workers to drain every lane with a queued signal
    ///
    /// Concurrent and repeated calls are safe; only the first does the work.
    pub fn shutdown(&self) -> Result<()> {
        if !self.shared.stop() {
            return Ok(());
        }
        debug!(
            "Queue group '{}' shutting down with {} pending signals",
            self.config.thread_name_prefix,
            self.shared.boss.len()
        );

        self.shared.boss.close();
        let joined = self.shared.join_all();
        let leftover = self.shared.drain_leftover_signals();
        if leftover > 0 {
            warn!(
                "Queue group '{}' drained {} lanes on the shutdown thread",
                self.config.thread_name_prefix, leftover
            );
        }

        self.index.context().detach();
        self.keys.context().detach();
        self.housekeeping_stop.lock().take();
        if let Some(assist) = &self.owned_assist {
            assist.shutdown()?;
        }
        joined
    }
}

impl Drop for QueueGroupExecutor {
    fn drop(&mut self) {
        if self.shared.is_running() {
            if let Err(e) = self.shutdown() {
                error!(
                    "Failed to shutdown queue group '{}' during drop: {}",
                    self.config.thread_name_prefix, e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Instant;

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    #[test]
    fn test_group_creation_and_shutdown() {
        let group = QueueGroupExecutor::with_workers(2).expect("Failed to create queue group");
        assert!(group.is_running());
        assert_eq!(group.live_workers(), 2);

        group.shutdown().expect("Failed to shutdown queue group");
        assert!(!group.is_running());
        assert_eq!(group.live_workers(), 0);
        // Repeated shutdown is a no-op
        group.shutdown().expect("Failed to shutdown twice");
    }

    #[test]
    fn test_task_execution() {
        let group = QueueGroupExecutor::with_workers(2).expect("Failed to create queue group");
        let counter = Arc::new(AtomicUsize::new(0));

        for i in 0..10u16 {
            let counter_clone = Arc::clone(&counter);
            group
                .execute(i % 3, move || {
                    counter_clone.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                })
                .expect("Failed to submit task");
        }

        assert!(wait_until(|| group.total_completed_task_count() == 10));
        assert_eq!(counter.load(Ordering::Relaxed), 10);
        assert_eq!(group.total_tasks_submitted(), 10);
        assert_eq!(group.completed_task_count(0u16), 4);

        group.shutdown().expect("Failed to shutdown queue group");
    }

    #[test]
    fn test_submit_when_not_running() {
        let group = QueueGroupExecutor::with_workers(1).expect("Failed to create queue group");
        group.shutdown().expect("Failed to shutdown queue group");

        let result = group.execute("late", || Ok(()));
        assert!(matches!(result, Err(QueueGroupError::NotRunning { .. })));

        // Lanes obtained directly are detached as well
        let lane = group.queue_executor("late").expect("Failed to resolve lane");
        let result = lane.execute(ClosureTask::boxed(|| Ok(())));
        assert!(matches!(result, Err(QueueGroupError::NotRunning { .. })));
    }

    #[test]
    fn test_lane_execute_goes_through_group() {
        let group = QueueGroupExecutor::with_workers(2).expect("Failed to create queue group");
        let lane = group.queue_executor("direct").expect("Failed to resolve lane");
        lane.execute(ClosureTask::boxed(|| Ok(())))
            .expect("Failed to submit task");

        assert!(wait_until(|| group.completed_task_count("direct") == 1));
        group.shutdown().expect("Failed to shutdown queue group");
    }

    #[test]
    fn test_index_out_of_range() {
        let group = QueueGroupExecutor::builder()
            .core_pool_size(1)
            .max_pool_size(1)
            .index_slots(8)
            .build()
            .expect("Failed to create queue group");

        let result = group.execute(8u16, || Ok(()));
        assert!(matches!(
            result,
            Err(QueueGroupError::IndexOutOfRange { index: 8, slots: 8 })
        ));
        group.shutdown().expect("Failed to shutdown queue group");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = QueueGroupExecutor::builder()
            .core_pool_size(4)
            .max_pool_size(2)
            .build();
        assert!(matches!(result, Err(QueueGroupError::InvalidConfig { .. })));
    }

    #[test]
    fn test_shutdown_drains_queued_work() {
        let group = QueueGroupExecutor::with_workers(2).expect("Failed to create queue group");
        let counter = Arc::new(AtomicUsize::new(0));

        for i in 0..200u32 {
            let c = Arc::clone(&counter);
            group
                .execute(format!("key-{}", i % 20), move || {
                    thread::sleep(Duration::from_micros(100));
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .expect("Failed to submit task");
        }

        group.shutdown().expect("Failed to shutdown queue group");
        assert_eq!(counter.load(Ordering::SeqCst), 200);
        assert_eq!(group.total_completed_task_count(), 200);
    }

    #[test]
    fn test_aliases_and_stats() {
        let group = QueueGroupExecutor::with_workers(1).expect("Failed to create queue group");
        group.set_alias(3u16, "billing").expect("Failed to set alias");
        group.set_alias("eu-west", "region").expect("Failed to set alias");
        assert_eq!(group.alias(3u16).as_deref(), Some("billing"));
        assert_eq!(group.alias("eu-west").as_deref(), Some("region"));

        group.execute(3u16, || Ok(())).expect("Failed to submit task");
        group.execute("eu-west", || Ok(())).expect("Failed to submit task");
        assert!(wait_until(|| group.total_completed_task_count() == 2));

        let stats = group.stats();
        assert_eq!(stats.index_lanes, 1);
        assert_eq!(stats.key_lanes, 1);
        assert_eq!(stats.completed_tasks, 2);
        assert_eq!(stats.backpressure.signals_published, 2);
        assert!(stats.to_json().contains("\"completed_tasks\":2"));

        group.shutdown().expect("Failed to shutdown queue group");
    }

    #[test]
    fn test_listener_receives_key() {
        let group = QueueGroupExecutor::with_workers(1).expect("Failed to create queue group");
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        group.set_group_event_listener(Arc::new(move |key: &RoutingKey, _: &dyn Task| {
            s.lock().push(key.clone());
        }));

        group.execute("watched", || Ok(())).expect("Failed to submit task");
        assert!(wait_until(|| group.total_completed_task_count() == 1));
        assert_eq!(*seen.lock(), vec![RoutingKey::from("watched")]);

        group.clear_group_event_listener();
        group.execute("watched", || Ok(())).expect("Failed to submit task");
        assert!(wait_until(|| group.total_completed_task_count() == 2));
        assert_eq!(seen.lock().len(), 1);

        group.shutdown().expect("Failed to shutdown queue group");
    }

    #[test]
    fn test_pool_grows_to_max_under_blocked_lanes() {
        let group = QueueGroupExecutor::builder()
            .core_pool_size(1)
            .max_pool_size(3)
            .keep_alive(Duration::from_millis(100))
            .poll_interval(Duration::from_millis(10))
            .build()
            .expect("Failed to create queue group");

        let release = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let running = Arc::new(AtomicUsize::new(0));
        for (started, key) in ["a", "b", "c"].into_iter().enumerate() {
            let (r, n) = (Arc::clone(&release), Arc::clone(&running));
            group
                .execute(key, move || {
                    n.fetch_add(1, Ordering::SeqCst);
                    while !r.load(Ordering::SeqCst) {
                        thread::sleep(Duration::from_millis(5));
                    }
                    Ok(())
                })
                .expect("Failed to submit task");
            // Every worker is busy before the next key is submitted
            assert!(wait_until(|| running.load(Ordering::SeqCst) == started + 1));
        }

        assert_eq!(group.live_workers(), 3);

        release.store(true, Ordering::SeqCst);
        assert!(wait_until(|| group.live_workers() == 1));
        group.shutdown().expect("Failed to shutdown queue group");
    }

    #[test]
    fn test_custom_assist_executor_runs_housekeeping() {
        let assist = Arc::new(SingleThreadAssist::new("shared-assist").expect("Failed to start"));
        let group = QueueGroupExecutor::builder()
            .core_pool_size(1)
            .max_pool_size(1)
            .housekeeping_interval(Duration::from_millis(10))
            .assist_executor(Arc::clone(&assist) as Arc<dyn AssistExecutor>)
            .build()
            .expect("Failed to create queue group");

        group.shutdown().expect("Failed to shutdown queue group");
        // Housekeeping has ended, so the shared assist can stop promptly
        assist.shutdown().expect("Failed to stop assist");
    }
}
