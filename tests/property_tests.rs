//! Property-based tests for rust_queue_group using proptest

use parking_lot::Mutex;
use proptest::prelude::*;
use rust_queue_group::prelude::*;
use rust_queue_group::queue::{ArrayTaskQueue, ChannelTaskQueue, QueueError, SegTaskQueue};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn small_group(workers: usize) -> QueueGroupExecutor {
    QueueGroupExecutor::builder()
        .core_pool_size(workers)
        .max_pool_size(workers)
        .poll_interval(Duration::from_millis(10))
        .build()
        .expect("Failed to create queue group")
}

// ============================================================================
// Configuration Tests
// ============================================================================

proptest! {
    /// Valid pool sizes always validate and survive a JSON round trip
    #[test]
    fn test_config_roundtrip(
        core in 1usize..32,
        extra in 0usize..32,
        keep_alive_ms in 1u64..120_000,
        capacity in 0usize..100_000,
        prefix in "[a-z]{3,10}"
    ) {
        let config = QueueGroupConfig::new(core)
            .with_max_pool_size(core + extra)
            .with_keep_alive(Duration::from_millis(keep_alive_ms))
            .with_boss_queue_capacity(capacity)
            .with_thread_name_prefix(&prefix);
        prop_assert!(config.validate().is_ok());

        let json = config.to_json().expect("Failed to serialize config");
        let parsed = QueueGroupConfig::from_json(&json).expect("Failed to parse config");
        prop_assert_eq!(parsed, config);
    }

    /// A maximum below the core size is always rejected
    #[test]
    fn test_config_rejects_max_below_core(core in 2usize..32, shortfall in 1usize..32) {
        let max = core.saturating_sub(shortfall);
        let config = QueueGroupConfig::new(core).with_max_pool_size(max);
        let rejected = matches!(config.validate(), Err(QueueGroupError::InvalidConfig { .. }));
        prop_assert!(rejected);
    }
}

// ============================================================================
// Lane Queue Tests
// ============================================================================

proptest! {
    /// Every lane queue implementation is FIFO and honours its capacity
    #[test]
    fn test_task_queues_fifo(capacity in 1usize..64, offered in 0usize..128) {
        let queues: Vec<Box<dyn TaskQueue>> = vec![
            Box::new(SegTaskQueue::new()),
            Box::new(ArrayTaskQueue::new(capacity)),
            Box::new(ChannelTaskQueue::bounded(capacity)),
            Box::new(ChannelTaskQueue::unbounded()),
        ];

        for queue in queues {
            let order = Arc::new(Mutex::new(Vec::new()));
            let limit = queue.capabilities().capacity.unwrap_or(usize::MAX);
            let mut accepted = 0;

            for i in 0..offered {
                let o = Arc::clone(&order);
                match queue.offer(ClosureTask::boxed(move || {
                    o.lock().push(i);
                    Ok(())
                })) {
                    Ok(()) => accepted += 1,
                    Err(QueueError::Full(_)) => prop_assert!(accepted >= limit),
                    Err(e) => panic!("Unexpected error: {:?}", e),
                }
            }
            prop_assert_eq!(accepted, offered.min(limit));
            prop_assert_eq!(queue.len(), accepted);

            while let Some(mut task) = queue.poll() {
                task.run().expect("Task failed");
            }
            prop_assert_eq!(order.lock().clone(), (0..accepted).collect::<Vec<_>>());
        }
    }
}

// ============================================================================
// Dispatch Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Any interleaving of submissions keeps each key's order
    #[test]
    fn test_per_key_order(
        workers in 1usize..6,
        keys in prop::collection::vec(0u16..8, 1..200)
    ) {
        let group = small_group(workers);
        let seen: Arc<Mutex<HashMap<u16, Vec<usize>>>> = Arc::new(Mutex::new(HashMap::new()));
        let mut expected: HashMap<u16, Vec<usize>> = HashMap::new();

        for (seq, key) in keys.iter().copied().enumerate() {
            expected.entry(key).or_default().push(seq);
            let s = Arc::clone(&seen);
            group.execute(key, move || {
                s.lock().entry(key).or_default().push(seq);
                Ok(())
            }).expect("Failed to submit task");
        }

        group.shutdown().expect("Failed to shutdown queue group");
        prop_assert_eq!(&*seen.lock(), &expected);
        prop_assert_eq!(group.total_completed_task_count(), keys.len() as u64);
    }

    /// Failing and panicking tasks are counted and never lose other work
    #[test]
    fn test_panic_isolation(
        outcomes in prop::collection::vec(0u8..3, 1..60)
    ) {
        let group = small_group(2);
        let succeeded = Arc::new(AtomicUsize::new(0));

        for (i, outcome) in outcomes.iter().copied().enumerate() {
            let s = Arc::clone(&succeeded);
            let key = format!("lane-{}", i % 3);
            group.execute(key, move || match outcome {
                0 => {
                    s.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
                1 => Err(QueueGroupError::other("planned failure")),
                _ => panic!("planned panic"),
            }).expect("Failed to submit task");
        }

        group.shutdown().expect("Failed to shutdown queue group");
        let ok = outcomes.iter().filter(|&&o| o == 0).count();
        let panics = outcomes.iter().filter(|&&o| o == 2).count();
        let stats = group.stats();
        prop_assert_eq!(succeeded.load(Ordering::SeqCst), ok);
        prop_assert_eq!(stats.completed_tasks, outcomes.len() as u64);
        prop_assert_eq!(stats.failed_tasks, (outcomes.len() - ok) as u64);
        prop_assert_eq!(stats.panicked_tasks, panics as u64);
    }

    /// Batches from one submitter stay contiguous and ordered
    #[test]
    fn test_batch_contiguity(sizes in prop::collection::vec(1usize..10, 1..20)) {
        let group = small_group(3);
        let log = Arc::new(Mutex::new(Vec::new()));

        for (batch, size) in sizes.iter().copied().enumerate() {
            let closures: Vec<_> = (0..size).map(|i| {
                let l = Arc::clone(&log);
                move || {
                    l.lock().push((batch, i));
                    Ok(())
                }
            }).collect();
            group.execute_batch("batch", closures).expect("Failed to submit batch");
        }

        group.shutdown().expect("Failed to shutdown queue group");
        let expected: Vec<_> = sizes
            .iter()
            .enumerate()
            .flat_map(|(batch, &size)| (0..size).map(move |i| (batch, i)))
            .collect();
        prop_assert_eq!(log.lock().clone(), expected);
    }
}
