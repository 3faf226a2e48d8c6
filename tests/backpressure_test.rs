//! Boss queue backpressure and bounded lane behavior

use rust_queue_group::prelude::*;
use rust_queue_group::group::LaneState;
use rust_queue_group::queue::{
    ArrayBossQueue, BossQueue, ChannelBossQueue, QueueCapabilities, QueueRequirements,
    QueueResult, ReadySignal, RequirementsQueueFactory,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

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

/// Occupies the only worker until the returned flag is set.
fn occupy_worker(group: &QueueGroupExecutor) -> Arc<AtomicBool> {
    let release = Arc::new(AtomicBool::new(false));
    let started = Arc::new(AtomicBool::new(false));
    let (r, s) = (Arc::clone(&release), Arc::clone(&started));
    group
        .execute("blocker", move || {
            s.store(true, Ordering::SeqCst);
            while !r.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(2));
            }
            Ok(())
        })
        .expect("Failed to submit blocking task");
    assert!(wait_until(|| started.load(Ordering::SeqCst)));
    release
}

fn single_worker(capacity: usize, strategy: BackpressureStrategy) -> QueueGroupExecutor {
    QueueGroupExecutor::builder()
        .core_pool_size(1)
        .max_pool_size(1)
        .boss_queue_capacity(capacity)
        .backpressure_strategy(strategy)
        .build()
        .expect("Failed to create queue group")
}

#[test]
fn test_reject_immediately_when_boss_queue_full() {
    init_logger();
    let group = single_worker(4, BackpressureStrategy::RejectImmediately);
    let release = occupy_worker(&group);

    for key in 0..4u16 {
        group.execute(key, || Ok(())).expect("Failed to submit task");
    }
    let result = group.execute(4u16, || Ok(()));
    assert!(matches!(
        result,
        Err(QueueGroupError::BossQueueFull { current: 4, max: 4 })
    ));
    assert!(result.unwrap_err().is_backpressure());

    // The rejected lane is left exactly as it was
    let lane = group.queue_executor(4u16).expect("Failed to resolve lane");
    assert_eq!(lane.state(), LaneState::Idle);
    assert!(lane.is_empty());

    // Appending to an already pending lane needs no boss queue slot
    group.execute(0u16, || Ok(())).expect("Failed to submit task");

    let stats = group.backpressure_stats();
    assert_eq!(stats.rejections, 1);

    release.store(true, Ordering::SeqCst);
    group.shutdown().expect("Failed to shutdown queue group");
    assert_eq!(group.completed_task_count(0u16), 2);
    assert_eq!(group.completed_task_count(4u16), 0);
    assert_eq!(group.total_completed_task_count(), 1 + 5);
}

#[test]
fn test_block_with_timeout_gives_up() {
    init_logger();
    let timeout = Duration::from_millis(100);
    let group = single_worker(2, BackpressureStrategy::BlockWithTimeout(timeout));
    let release = occupy_worker(&group);

    group.execute("a", || Ok(())).expect("Failed to submit task");
    group.execute("b", || Ok(())).expect("Failed to submit task");

    let start = Instant::now();
    let result = group.execute("c", || Ok(()));
    assert!(start.elapsed() >= timeout);
    assert!(matches!(
        result,
        Err(QueueGroupError::SubmissionTimeout { timeout_ms: 100 })
    ));
    assert_eq!(group.backpressure_stats().timeouts, 1);
    assert!(group
        .queue_executor("c")
        .expect("Failed to resolve lane")
        .is_empty());

    release.store(true, Ordering::SeqCst);
    group.shutdown().expect("Failed to shutdown queue group");
}

#[test]
fn test_block_waits_for_space() {
    init_logger();
    let group = Arc::new(single_worker(1, BackpressureStrategy::Block));
    let release = occupy_worker(&group);
    group.execute("a", || Ok(())).expect("Failed to submit task");

    let done = Arc::new(AtomicBool::new(false));
    let submitter = {
        let (group, done) = (Arc::clone(&group), Arc::clone(&done));
        thread::spawn(move || {
            let result = group.execute("b", || Ok(()));
            done.store(true, Ordering::SeqCst);
            result
        })
    };

    thread::sleep(Duration::from_millis(100));
    assert!(!done.load(Ordering::SeqCst), "submission should be blocked");

    release.store(true, Ordering::SeqCst);
    submitter
        .join()
        .expect("Submitter panicked")
        .expect("Blocked submission failed");

    group.shutdown().expect("Failed to shutdown queue group");
    assert_eq!(group.completed_task_count("b"), 1);
}

#[test]
fn test_blocked_submission_fails_on_shutdown() {
    init_logger();
    let group = Arc::new(single_worker(1, BackpressureStrategy::Block));
    let release = occupy_worker(&group);
    group.execute("a", || Ok(())).expect("Failed to submit task");

    let submitter = {
        let group = Arc::clone(&group);
        thread::spawn(move || group.execute("b", || Ok(())))
    };
    thread::sleep(Duration::from_millis(50));

    let closer = {
        let group = Arc::clone(&group);
        thread::spawn(move || group.shutdown())
    };
    let result = submitter.join().expect("Submitter panicked");
    assert!(matches!(result, Err(QueueGroupError::ShuttingDown { .. })));

    release.store(true, Ordering::SeqCst);
    closer
        .join()
        .expect("Closer panicked")
        .expect("Failed to shutdown queue group");
    assert_eq!(group.completed_task_count("a"), 1);
    assert_eq!(group.completed_task_count("b"), 0);
}

#[test]
fn test_bounded_lane_rejects_whole_batch() {
    init_logger();
    let factory = RequirementsQueueFactory::new(QueueRequirements::new().bounded(2))
        .expect("Failed to create factory");
    let group = QueueGroupExecutor::builder()
        .core_pool_size(1)
        .max_pool_size(1)
        .queue_factory(Arc::new(factory))
        .build()
        .expect("Failed to create queue group");
    let release = occupy_worker(&group);

    group.execute("x", || Ok(())).expect("Failed to submit task");
    group.execute("x", || Ok(())).expect("Failed to submit task");
    let result = group.execute("x", || Ok(()));
    assert!(matches!(
        result,
        Err(QueueGroupError::LaneFull { requested: 1, capacity: 2, .. })
    ));

    let ran = Arc::new(AtomicUsize::new(0));
    let closures: Vec<_> = (0..3)
        .map(|_| {
            let ran = Arc::clone(&ran);
            move || {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .collect();
    let result = group.execute_batch("y", closures);
    assert!(matches!(result, Err(QueueGroupError::LaneFull { requested: 3, .. })));
    assert!(group.queue_executor("y").expect("Failed to resolve lane").is_empty());

    release.store(true, Ordering::SeqCst);
    group.shutdown().expect("Failed to shutdown queue group");
    assert_eq!(group.completed_task_count("x"), 2);
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[test]
fn test_injected_channel_boss_queue() {
    init_logger();
    let group = QueueGroupExecutor::builder()
        .core_pool_size(2)
        .max_pool_size(2)
        .boss_queue(Arc::new(ChannelBossQueue::bounded(8)))
        .build()
        .expect("Failed to create queue group");

    for i in 0..100u16 {
        group.execute(i % 10, || Ok(())).expect("Failed to submit task");
    }
    group.shutdown().expect("Failed to shutdown queue group");
    assert_eq!(group.total_completed_task_count(), 100);
}

/// Boss queue that cannot park consumers
struct PollOnlyBossQueue(ArrayBossQueue);

impl BossQueue for PollOnlyBossQueue {
    fn send(&self, signal: ReadySignal) -> QueueResult<(), ReadySignal> {
        self.0.try_send(signal)
    }

    fn try_send(&self, signal: ReadySignal) -> QueueResult<(), ReadySignal> {
        self.0.try_send(signal)
    }

    fn send_timeout(&self, signal: ReadySignal, _: Duration) -> QueueResult<(), ReadySignal> {
        self.0.try_send(signal)
    }

    fn recv_timeout(&self, timeout: Duration) -> QueueResult<ReadySignal, ReadySignal> {
        self.0.recv_timeout(timeout)
    }

    fn close(&self) {
        self.0.close()
    }

    fn is_closed(&self) -> bool {
        self.0.is_closed()
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn capabilities(&self) -> QueueCapabilities {
        QueueCapabilities {
            supports_blocking: false,
            implementation_name: "poll-only",
            ..self.0.capabilities()
        }
    }
}

#[test]
fn test_boss_queue_without_blocking_is_rejected() {
    let result = QueueGroupExecutor::builder()
        .core_pool_size(1)
        .max_pool_size(1)
        .boss_queue(Arc::new(PollOnlyBossQueue(ArrayBossQueue::new(4))))
        .build();

    match result {
        Err(QueueGroupError::InvalidConfig { parameter, message }) => {
            assert_eq!(parameter, "boss_queue");
            assert!(message.contains("poll-only"));
        }
        other => panic!("expected InvalidConfig, got {:?}", other.map(|_| ())),
    }
}
