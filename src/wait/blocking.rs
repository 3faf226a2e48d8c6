//! Lock-and-condvar wait strategy with a lock-free signal fast path.

use super::{WaitCondition, WaitConditionStrategy};
use crossbeam_utils::CachePadded;
use log::warn;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{fence, AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};

/// Blocking [`WaitConditionStrategy`] built on a mutex and condition variable.
///
/// # Wake-up protocol
///
/// A waiter holds the lock while it stores `signal_needed = true` (SeqCst),
/// fences, and re-evaluates its condition; it releases the lock only inside
/// the condvar wait. A signaller fences after publishing the condition's
/// state, then swaps `signal_needed` to `false`. Under the fences either the
/// waiter sees the published state, or the signaller sees the flag and
/// notifies under the lock, which it cannot acquire until the waiter is
/// parked. No wake-up is lost.
///
/// When no thread is parked the flag is `false` and
/// [`signal_all_when_blocking`](WaitConditionStrategy::signal_all_when_blocking)
/// costs one fence and one atomic swap.
#[derive(Debug, Default)]
pub struct BlockingWaitStrategy {
    lock: Mutex<()>,
    notify: Condvar,
    signal_needed: CachePadded<AtomicBool>,
    signals_sent: AtomicU64,
}

impl BlockingWaitStrategy {
    /// Creates a new strategy with no parked waiters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if a waiter may be parked and the next signal will take the lock.
    pub fn has_waiters(&self) -> bool {
        self.signal_needed.load(Ordering::SeqCst)
    }

    /// Number of broadcasts that actually acquired the lock and notified.
    pub fn signals_sent(&self) -> u64 {
        self.signals_sent.load(Ordering::Relaxed)
    }

    fn announce_waiter(&self) {
        self.signal_needed.store(true, Ordering::SeqCst);
        fence(Ordering::SeqCst);
    }
}

impl WaitConditionStrategy for BlockingWaitStrategy {
    fn wait_for<T, C>(&self, condition: &mut C) -> T
    where
        C: WaitCondition<T>,
    {
        condition.attempt_complete();
        if !condition.is_complete() {
            let mut guard = self.lock.lock();
            loop {
                self.announce_waiter();
                condition.attempt_complete();
                if condition.is_complete() {
                    break;
                }
                self.notify.wait(&mut guard);
            }
        }
        condition.result()
    }

    fn wait_for_timeout<T, C>(&self, condition: &mut C, timeout: Duration) -> T
    where
        C: WaitCondition<T>,
    {
        let start = Instant::now();
        let Some(deadline) = start.checked_add(timeout) else {
            return self.wait_for(condition);
        };
        let wall_deadline = SystemTime::now().checked_add(timeout);

        condition.attempt_complete();
        if !condition.is_complete() {
            let mut guard = self.lock.lock();
            loop {
                self.announce_waiter();
                condition.attempt_complete();
                if condition.is_complete() || Instant::now() >= deadline {
                    break;
                }
                // Remaining time is recomputed from the fixed deadline on every pass
                let _ = self.notify.wait_until(&mut guard, deadline);
            }
        }

        if !condition.is_complete() {
            if let Some(wall_deadline) = wall_deadline {
                if SystemTime::now() < wall_deadline {
                    warn!(
                        "wait gave up before its wall-clock deadline: waited {:?} of {:?}",
                        start.elapsed(),
                        timeout
                    );
                }
            }
        }
        condition.result()
    }

    fn signal_all_when_blocking(&self) {
        fence(Ordering::SeqCst);
        if self.signal_needed.swap(false, Ordering::SeqCst) {
            let _guard = self.lock.lock();
            self.signals_sent.fetch_add(1, Ordering::Relaxed);
            self.notify.notify_all();
        }
    }
}
