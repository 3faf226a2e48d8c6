//! Boss queues carrying ready signals from producers to workers.

use super::{BossQueue, QueueCapabilities, QueueError, QueueResult, ReadySignal};
use crate::wait::{BlockingWaitStrategy, WaitCondition, WaitConditionStrategy};
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use crossbeam_queue::ArrayQueue;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Slice a blocked channel send waits before re-checking for close.
const CLOSE_CHECK_INTERVAL: Duration = Duration::from_millis(50);

/// Boss queue on a crossbeam channel, bounded or unbounded.
///
/// # Example
///
/// ```rust
/// use rust_queue_group::queue::{BossQueue, ChannelBossQueue};
///
/// let boss = ChannelBossQueue::bounded(64);
/// assert_eq!(boss.capabilities().capacity, Some(64));
/// boss.close();
/// assert!(boss.is_closed());
/// ```
pub struct ChannelBossQueue {
    sender: Sender<ReadySignal>,
    receiver: Receiver<ReadySignal>,
    closed: AtomicBool,
    // Senders hold it shared across the closed check and the push
    close_gate: RwLock<()>,
}

impl ChannelBossQueue {
    /// Creates a new unbounded boss queue.
    pub fn unbounded() -> Self {
        let (sender, receiver) = channel::unbounded();
        Self::from_channel(sender, receiver)
    }

    /// Creates a new bounded boss queue with the specified capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn bounded(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0");
        let (sender, receiver) = channel::bounded(capacity);
        Self::from_channel(sender, receiver)
    }

    fn from_channel(sender: Sender<ReadySignal>, receiver: Receiver<ReadySignal>) -> Self {
        Self {
            sender,
            receiver,
            closed: AtomicBool::new(false),
            close_gate: RwLock::new(()),
        }
    }

    fn send_until(
        &self,
        mut signal: ReadySignal,
        deadline: Option<Instant>,
    ) -> QueueResult<(), ReadySignal> {
        loop {
            let slice = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(QueueError::Timeout(signal));
                    }
                    remaining.min(CLOSE_CHECK_INTERVAL)
                }
                None => CLOSE_CHECK_INTERVAL,
            };
            let outcome = {
                let _open = self.close_gate.read();
                if self.closed.load(Ordering::SeqCst) {
                    return Err(QueueError::Closed(signal));
                }
                self.sender.send_timeout(signal, slice)
            };
            match outcome {
                Ok(()) => return Ok(()),
                Err(channel::SendTimeoutError::Timeout(returned)) => signal = returned,
                Err(channel::SendTimeoutError::Disconnected(returned)) => {
                    return Err(QueueError::Closed(returned))
                }
            }
        }
    }
}

impl BossQueue for ChannelBossQueue {
    fn send(&self, signal: ReadySignal) -> QueueResult<(), ReadySignal> {
        self.send_until(signal, None)
    }

    fn try_send(&self, signal: ReadySignal) -> QueueResult<(), ReadySignal> {
        let _open = self.close_gate.read();
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed(signal));
        }
        self.sender.try_send(signal).map_err(|e| match e {
            TrySendError::Full(signal) => QueueError::Full(signal),
            TrySendError::Disconnected(signal) => QueueError::Closed(signal),
        })
    }

    fn send_timeout(
        &self,
        signal: ReadySignal,
        timeout: Duration,
    ) -> QueueResult<(), ReadySignal> {
        self.send_until(signal, Instant::now().checked_add(timeout))
    }

    fn recv_timeout(&self, timeout: Duration) -> QueueResult<ReadySignal, ReadySignal> {
        if self.closed.load(Ordering::SeqCst) && self.receiver.is_empty() {
            return Err(QueueError::Disconnected);
        }

        match self.receiver.recv_timeout(timeout) {
            Ok(signal) => Ok(signal),
            Err(channel::RecvTimeoutError::Timeout) => {
                if self.closed.load(Ordering::SeqCst) && self.receiver.is_empty() {
                    Err(QueueError::Disconnected)
                } else {
                    Err(QueueError::Empty)
                }
            }
            Err(channel::RecvTimeoutError::Disconnected) => Err(QueueError::Disconnected),
        }
    }

    fn close(&self) {
        let _gate = self.close_gate.write();
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn len(&self) -> usize {
        self.receiver.len()
    }

    fn capabilities(&self) -> QueueCapabilities {
        QueueCapabilities::channel(self.sender.capacity())
    }
}

/// Bounded lock-free boss queue that parks producers and workers on a
/// [`BlockingWaitStrategy`].
///
/// Pushes and pops never take a lock; the strategies' locks are only touched
/// when a thread actually has to sleep.
pub struct ArrayBossQueue {
    queue: ArrayQueue<ReadySignal>,
    closed: AtomicBool,
    close_gate: RwLock<()>,
    not_empty: BlockingWaitStrategy,
    not_full: BlockingWaitStrategy,
}

impl ArrayBossQueue {
    /// Creates a boss queue holding at most `capacity` signals.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0");
        Self {
            queue: ArrayQueue::new(capacity),
            closed: AtomicBool::new(false),
            close_gate: RwLock::new(()),
            not_empty: BlockingWaitStrategy::new(),
            not_full: BlockingWaitStrategy::new(),
        }
    }

    /// Returns the maximum capacity of this queue.
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    fn push_waiting(
        &self,
        signal: ReadySignal,
        timeout: Option<Duration>,
    ) -> QueueResult<(), ReadySignal> {
        let mut condition = PushCondition {
            boss: self,
            pending: Some(signal),
            closed: false,
        };
        let outcome = match timeout {
            Some(timeout) => self.not_full.wait_for_timeout(&mut condition, timeout),
            None => self.not_full.wait_for(&mut condition),
        };
        if outcome.is_ok() {
            self.not_empty.signal_all_when_blocking();
        }
        outcome
    }
}

/// Completes once the pending signal is pushed or the queue is closed.
struct PushCondition<'a> {
    boss: &'a ArrayBossQueue,
    pending: Option<ReadySignal>,
    closed: bool,
}

impl WaitCondition<QueueResult<(), ReadySignal>> for PushCondition<'_> {
    fn attempt_complete(&mut self) {
        let Some(signal) = self.pending.take() else {
            return;
        };
        let _open = self.boss.close_gate.read();
        if self.boss.closed.load(Ordering::SeqCst) {
            self.closed = true;
            self.pending = Some(signal);
            return;
        }
        if let Err(signal) = self.boss.queue.push(signal) {
            self.pending = Some(signal);
        }
    }

    fn is_complete(&self) -> bool {
        self.pending.is_none() || self.closed
    }

    fn result(&mut self) -> QueueResult<(), ReadySignal> {
        match self.pending.take() {
            None => Ok(()),
            Some(signal) if self.closed => Err(QueueError::Closed(signal)),
            Some(signal) => Err(QueueError::Timeout(signal)),
        }
    }
}

/// Completes once a signal is popped or the queue is closed and drained.
struct PopCondition<'a> {
    boss: &'a ArrayBossQueue,
    signal: Option<ReadySignal>,
    disconnected: bool,
}

impl WaitCondition<QueueResult<ReadySignal, ReadySignal>> for PopCondition<'_> {
    fn attempt_complete(&mut self) {
        if self.signal.is_some() {
            return;
        }
        self.signal = self.boss.queue.pop();
        if self.signal.is_none() && self.boss.closed.load(Ordering::SeqCst) {
            // Re-check: a producer may have pushed just before closing
            self.signal = self.boss.queue.pop();
            self.disconnected = self.signal.is_none();
        }
    }

    fn is_complete(&self) -> bool {
        self.signal.is_some() || self.disconnected
    }

    fn result(&mut self) -> QueueResult<ReadySignal, ReadySignal> {
        match self.signal.take() {
            Some(signal) => Ok(signal),
            None if self.disconnected => Err(QueueError::Disconnected),
            None => Err(QueueError::Empty),
        }
    }
}

impl BossQueue for ArrayBossQueue {
    fn send(&self, signal: ReadySignal) -> QueueResult<(), ReadySignal> {
        self.push_waiting(signal, None)
    }

    fn try_send(&self, signal: ReadySignal) -> QueueResult<(), ReadySignal> {
        {
            let _open = self.close_gate.read();
            if self.closed.load(Ordering::SeqCst) {
                return Err(QueueError::Closed(signal));
            }
            self.queue.push(signal).map_err(QueueError::Full)?;
        }
        self.not_empty.signal_all_when_blocking();
        Ok(())
    }

    fn send_timeout(
        &self,
        signal: ReadySignal,
        timeout: Duration,
    ) -> QueueResult<(), ReadySignal> {
        self.push_waiting(signal, Some(timeout))
    }

    fn recv_timeout(&self, timeout: Duration) -> QueueResult<ReadySignal, ReadySignal> {
        let mut condition = PopCondition {
            boss: self,
            signal: None,
            disconnected: false,
        };
        let outcome = self.not_empty.wait_for_timeout(&mut condition, timeout);
        if outcome.is_ok() {
            self.not_full.signal_all_when_blocking();
        }
        outcome
    }

    fn close(&self) {
        {
            let _gate = self.close_gate.write();
            self.closed.store(true, Ordering::SeqCst);
        }
        self.not_empty.signal_all_when_blocking();
        self.not_full.signal_all_when_blocking();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn capabilities(&self) -> QueueCapabilities {
        QueueCapabilities {
            is_bounded: true,
            capacity: Some(self.queue.capacity()),
            is_lock_free: true,
            mpmc: true,
            supports_blocking: true,
            exact_size: true,
            implementation_name: "crossbeam::ArrayQueue",
        }
    }
}
