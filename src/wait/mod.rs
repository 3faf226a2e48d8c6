//! Parking a thread on an arbitrary condition without busy polling.
//!
//! A [`WaitCondition`] is a re-evaluatable predicate: the strategy calls
//! [`attempt_complete`](WaitCondition::attempt_complete) to let it make
//! progress (pop an item, read a flag, ...), then asks
//! [`is_complete`](WaitCondition::is_complete). Whoever makes a condition
//! true calls [`WaitConditionStrategy::signal_all_when_blocking`], which only
//! touches the lock when a waiter is actually parked.
//!
//! # Example
//!
//! ```rust
//! use rust_queue_group::wait::{BlockingWaitStrategy, FnCondition, WaitConditionStrategy};
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//! use std::thread;
//!
//! let strategy = Arc::new(BlockingWaitStrategy::new());
//! let ready = Arc::new(AtomicBool::new(false));
//!
//! let (s, r) = (Arc::clone(&strategy), Arc::clone(&ready));
//! let setter = thread::spawn(move || {
//!     r.store(true, Ordering::SeqCst);
//!     s.signal_all_when_blocking();
//! });
//!
//! let mut condition = FnCondition::new(|| ready.load(Ordering::SeqCst).then_some(42));
//! assert_eq!(strategy.wait_for(&mut condition), Some(42));
//! setter.join().unwrap();
//! ```

mod blocking;

pub use blocking::BlockingWaitStrategy;

use std::time::Duration;

/// A stateful predicate a thread can park on.
pub trait WaitCondition<T> {
    /// Re-evaluates the condition, possibly mutating internal state.
    fn attempt_complete(&mut self);

    /// Returns `true` once the condition holds.
    fn is_complete(&self) -> bool;

    /// Returns the condition's current result.
    ///
    /// After a timed wait this is whatever the condition holds at the
    /// deadline, complete or not.
    fn result(&mut self) -> T;
}

/// Coordinates parking and waking threads on [`WaitCondition`]s.
///
/// State the condition reads must be published with sequentially consistent
/// (or lock-protected) writes before calling
/// [`signal_all_when_blocking`](Self::signal_all_when_blocking).
pub trait WaitConditionStrategy: Send + Sync {
    /// Blocks until `condition` completes and returns its result.
    fn wait_for<T, C>(&self, condition: &mut C) -> T
    where
        C: WaitCondition<T>;

    /// Blocks until `condition` completes or `timeout` elapses, then returns
    /// its result.
    fn wait_for_timeout<T, C>(&self, condition: &mut C, timeout: Duration) -> T
    where
        C: WaitCondition<T>;

    /// Wakes every parked waiter; a no-op without lock traffic when none is parked.
    fn signal_all_when_blocking(&self);
}

/// Adapts a closure into a [`WaitCondition`].
///
/// The closure is polled until it yields `Some`; the result is that value,
/// or `None` if a timed wait gave up first.
pub struct FnCondition<F, T>
where
    F: FnMut() -> Option<T>,
{
    poll: F,
    value: Option<T>,
}

impl<F, T> FnCondition<F, T>
where
    F: FnMut() -> Option<T>,
{
    /// Creates a condition that completes when `poll` returns `Some`.
    pub fn new(poll: F) -> Self {
        Self { poll, value: None }
    }
}

impl<F, T> WaitCondition<Option<T>> for FnCondition<F, T>
where
    F: FnMut() -> Option<T>,
{
    fn attempt_complete(&mut self) {
        if self.value.is_none() {
            self.value = (self.poll)();
        }
    }

    fn is_complete(&self) -> bool {
        self.value.is_some()
    }

    fn result(&mut self) -> Option<T> {
        self.value.take()
    }
}
