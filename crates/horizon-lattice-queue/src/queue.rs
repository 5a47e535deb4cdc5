//! Thread-safe FIFO message queue.
//!
//! [`MessageQueue`] hands owned values from any number of producer threads to
//! consumer threads. Producers call [`post`](MessageQueue::post); consumers
//! block in [`receive`](MessageQueue::receive) or wait with a deadline in
//! [`receive_timeout`](MessageQueue::receive_timeout).
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//! use std::time::Duration;
//!
//! use horizon_lattice_queue::{MessageQueue, QueueError};
//!
//! let queue = Arc::new(MessageQueue::new());
//!
//! let producer = {
//!     let queue = queue.clone();
//!     thread::spawn(move || {
//!         for i in 0..3 {
//!             queue.post(i).unwrap();
//!         }
//!     })
//! };
//!
//! for expected in 0..3 {
//!     assert_eq!(queue.receive().unwrap(), expected);
//! }
//! producer.join().unwrap();
//!
//! // Nothing left: a timed receive gives up.
//! let err = queue.receive_timeout(Duration::from_millis(10)).unwrap_err();
//! assert_eq!(err, QueueError::Timeout);
//! ```
//!
//! # Cancellation
//!
//! There is no way to interrupt a blocked receiver other than posting to the
//! queue. Use [`Envelope`](crate::Envelope) as the element type and post
//! [`Envelope::Shutdown`](crate::Envelope::Shutdown) to stop a consumer, or
//! use [`Consumer`](crate::Consumer) which does this for you.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::config::QueueConfig;
use crate::error::{QueueError, Result};
use crate::logging::targets;

/// Marks the queue as poisoned if a panic unwinds while it is alive, and
/// wakes every blocked receiver so they observe the failure.
///
/// Threads that were already panicking on entry do not poison the queue.
struct PoisonOnPanic<'a> {
    flag: &'a AtomicBool,
    waiters: &'a Condvar,
    panicking_on_entry: bool,
}

impl<'a> PoisonOnPanic<'a> {
    fn new(flag: &'a AtomicBool, waiters: &'a Condvar) -> Self {
        Self {
            flag,
            waiters,
            panicking_on_entry: thread::panicking(),
        }
    }
}

impl Drop for PoisonOnPanic<'_> {
    fn drop(&mut self) {
        if !self.panicking_on_entry && thread::panicking() {
            self.flag.store(true, Ordering::Release);
            self.waiters.notify_all();
        }
    }
}

/// A locked view of the queue contents.
///
/// Field order matters: the poison flag is set before the lock is released.
struct CriticalSection<'a, T> {
    _poison: PoisonOnPanic<'a>,
    guard: MutexGuard<'a, VecDeque<T>>,
}

/// A thread-safe, unbounded FIFO queue of messages.
///
/// All operations are serialized through a single mutex. A condition
/// variable tied to that mutex signals that the queue became non-empty;
/// each [`post`](Self::post) wakes at most one waiting receiver, so with
/// several receivers the order in which they are served is unspecified.
///
/// Messages still queued when the queue is dropped are dropped with it.
pub struct MessageQueue<T> {
    messages: Mutex<VecDeque<T>>,
    available: Condvar,
    poisoned: AtomicBool,
    name: String,
}

impl<T> MessageQueue<T> {
    /// Create an empty queue with default configuration.
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    /// Create an empty queue with custom configuration.
    pub fn with_config(config: QueueConfig) -> Self {
        Self {
            messages: Mutex::new(VecDeque::with_capacity(config.initial_capacity)),
            available: Condvar::new(),
            poisoned: AtomicBool::new(false),
            name: config.name,
        }
    }

    /// The name given to this queue in its configuration.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the queue is usable.
    ///
    /// Returns `false` once a panic has unwound through one of the queue's
    /// critical sections (for example a message destructor panicking during
    /// [`clear`](Self::clear)). Every other operation then fails with
    /// [`QueueError::Fatal`].
    pub fn is_ok(&self) -> bool {
        !self.poisoned.load(Ordering::Acquire)
    }

    /// Number of messages waiting at the time of the call.
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    /// Whether no messages are waiting at the time of the call.
    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// Append a message to the tail of the queue and wake one receiver.
    pub fn post(&self, msg: T) -> Result<()> {
        let mut section = self.enter()?;
        section.guard.push_back(msg);
        self.available.notify_one();
        tracing::trace!(
            target: targets::QUEUE,
            queue = %self.name,
            pending = section.guard.len(),
            "posted message"
        );
        Ok(())
    }

    /// Block until a message is available and remove it from the head.
    pub fn receive(&self) -> Result<T> {
        let mut section = self.enter()?;
        loop {
            if let Some(msg) = section.guard.pop_front() {
                return Ok(msg);
            }
            self.available.wait(&mut section.guard);
            self.check()?;
        }
    }

    /// Like [`receive`](Self::receive), but give up after `timeout`.
    ///
    /// Returns [`QueueError::Timeout`] if the queue stayed empty for the
    /// whole duration. A zero `timeout` waits forever. Spurious wakeups do
    /// not shorten the wait: the remaining time is measured against a
    /// deadline fixed when the call starts.
    #[tracing::instrument(
        skip(self),
        target = "horizon_lattice_queue::queue",
        level = "trace",
        fields(queue = %self.name)
    )]
    pub fn receive_timeout(&self, timeout: Duration) -> Result<T> {
        if timeout.is_zero() {
            return self.receive();
        }
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.receive();
        };

        let mut section = self.enter()?;
        loop {
            if let Some(msg) = section.guard.pop_front() {
                return Ok(msg);
            }
            if Instant::now() >= deadline {
                tracing::trace!(target: targets::QUEUE, queue = %self.name, "receive timed out");
                return Err(QueueError::Timeout);
            }
            self.available.wait_until(&mut section.guard, deadline);
            self.check()?;
        }
    }

    /// [`receive_timeout`](Self::receive_timeout) with the timeout in
    /// milliseconds. Zero waits forever.
    pub fn receive_timeout_ms(&self, timeout_ms: u64) -> Result<T> {
        self.receive_timeout(Duration::from_millis(timeout_ms))
    }

    /// Remove the head message without blocking.
    ///
    /// Returns `Ok(None)` if the queue is empty.
    pub fn try_receive(&self) -> Result<Option<T>> {
        let mut section = self.enter()?;
        Ok(section.guard.pop_front())
    }

    /// Discard every queued message.
    ///
    /// Receivers already blocked keep waiting for the next
    /// [`post`](Self::post).
    pub fn clear(&self) -> Result<()> {
        let mut section = self.enter()?;
        let discarded = std::mem::take(&mut *section.guard);
        let count = discarded.len();
        // Dropped while locked so a panicking destructor poisons the queue.
        drop(discarded);
        tracing::debug!(target: targets::QUEUE, queue = %self.name, count, "cleared queue");
        Ok(())
    }

    fn check(&self) -> Result<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(QueueError::Fatal(format!(
                "queue '{}' was poisoned by a panic",
                self.name
            )))
        }
    }

    fn enter(&self) -> Result<CriticalSection<'_, T>> {
        let guard = self.messages.lock();
        self.check()?;
        Ok(CriticalSection {
            _poison: PoisonOnPanic::new(&self.poisoned, &self.available),
            guard,
        })
    }
}

impl<T> Default for MessageQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for MessageQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageQueue")
            .field("name", &self.name)
            .field("len", &self.len())
            .field("ok", &self.is_ok())
            .finish()
    }
}

static_assertions::assert_impl_all!(MessageQueue<String>: Send, Sync);
