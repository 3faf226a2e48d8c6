use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rust_queue_group::prelude::*;
use rust_queue_group::queue::{ArrayTaskQueue, ChannelTaskQueue, SegTaskQueue};
use rust_queue_group::wait::{BlockingWaitStrategy, WaitConditionStrategy};
use std::sync::Arc;
use std::thread;

fn group(workers: usize) -> QueueGroupExecutor {
    QueueGroupExecutor::with_workers(workers).expect("Failed to create queue group")
}

fn benchmark_group_creation(c: &mut Criterion) {
    c.bench_function("queue_group_creation", |b| {
        b.iter(|| {
            let group = group(4);
            group.shutdown().expect("Failed to shutdown queue group");
        });
    });
}

fn benchmark_key_spread(c: &mut Criterion) {
    let mut bench = c.benchmark_group("key_spread_1000_tasks");

    // Same task count spread over more lanes
    for keys in [1u16, 16, 256] {
        bench.bench_with_input(BenchmarkId::from_parameter(keys), &keys, |b, &keys| {
            b.iter_batched(
                || group(4),
                |group| {
                    for i in 0..1000u16 {
                        group
                            .execute(i % keys, || {
                                black_box(1 + 1);
                                Ok(())
                            })
                            .expect("Failed to submit task");
                    }
                    group.shutdown().expect("Failed to shutdown queue group");
                },
                BatchSize::SmallInput,
            );
        });
    }

    bench.finish();
}

fn benchmark_string_keys(c: &mut Criterion) {
    let keys: Vec<String> = (0..64).map(|i| format!("session-{}", i)).collect();
    c.bench_function("string_keys_1000_tasks", |b| {
        b.iter_batched(
            || group(4),
            |group| {
                for i in 0..1000 {
                    group
                        .execute(&keys[i % keys.len()], || Ok(()))
                        .expect("Failed to submit task");
                }
                group.shutdown().expect("Failed to shutdown queue group");
            },
            BatchSize::SmallInput,
        );
    });
}

fn benchmark_batch_submission(c: &mut Criterion) {
    c.bench_function("batch_submission_100x10", |b| {
        b.iter_batched(
            || group(4),
            |group| {
                for i in 0..100u16 {
                    group
                        .execute_batch(i % 8, (0..10).map(|_| || Ok(())))
                        .expect("Failed to submit batch");
                }
                group.shutdown().expect("Failed to shutdown queue group");
            },
            BatchSize::SmallInput,
        );
    });
}

fn benchmark_concurrent_submission(c: &mut Criterion) {
    c.bench_function("concurrent_submission_4_threads", |b| {
        b.iter_batched(
            || Arc::new(group(4)),
            |group| {
                let handles: Vec<_> = (0..4u16)
                    .map(|t| {
                        let group = Arc::clone(&group);
                        thread::spawn(move || {
                            for i in 0..250u16 {
                                group
                                    .execute(t * 64 + i % 64, || Ok(()))
                                    .expect("Failed to submit task");
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().expect("Submitter panicked");
                }
                group.shutdown().expect("Failed to shutdown queue group");
            },
            BatchSize::SmallInput,
        );
    });
}

fn benchmark_lane_queues(c: &mut Criterion) {
    let mut bench = c.benchmark_group("lane_queue_offer_poll_1000");

    let factories: [(&str, fn() -> Box<dyn TaskQueue>); 3] = [
        ("seg", || Box::new(SegTaskQueue::new())),
        ("array", || Box::new(ArrayTaskQueue::new(1024))),
        ("channel", || Box::new(ChannelTaskQueue::bounded(1024))),
    ];
    for (name, factory) in factories {
        bench.bench_function(name, |b| {
            let queue = factory();
            b.iter(|| {
                for _ in 0..1000 {
                    if queue.offer(ClosureTask::boxed(|| Ok(()))).is_err() {
                        panic!("Lane queue rejected a task below capacity");
                    }
                }
                while let Some(task) = queue.poll() {
                    black_box(task);
                }
            });
        });
    }

    bench.finish();
}

fn benchmark_signal_without_waiters(c: &mut Criterion) {
    let strategy = BlockingWaitStrategy::new();
    c.bench_function("signal_all_when_blocking_no_waiters", |b| {
        b.iter(|| strategy.signal_all_when_blocking());
    });
}

criterion_group!(
    benches,
    benchmark_group_creation,
    benchmark_key_spread,
    benchmark_string_keys,
    benchmark_batch_submission,
    benchmark_concurrent_submission,
    benchmark_lane_queues,
    benchmark_signal_without_waiters
);
criterion_main!(benches);
