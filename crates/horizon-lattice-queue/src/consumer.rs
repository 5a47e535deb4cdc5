//! Dedicated consumer threads stopped with a poison pill.
//!
//! A [`Consumer`] owns a [`MessageQueue`] of [`Envelope`]s and a thread that
//! pops envelopes in FIFO order, handing each message to a handler closure.
//! Shutdown is requested by posting [`Envelope::Shutdown`]: every message
//! posted before it is still handled, then the thread exits.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use horizon_lattice_queue::{Consumer, QueueError};
//!
//! let total = Arc::new(AtomicUsize::new(0));
//! let sum = total.clone();
//! let consumer = Consumer::spawn(move |n: usize| {
//!     sum.fetch_add(n, Ordering::SeqCst);
//! })?;
//!
//! for n in 1..=4 {
//!     consumer.post(n)?;
//! }
//! assert!(consumer.shutdown_and_join());
//!
//! assert_eq!(total.load(Ordering::SeqCst), 10);
//! assert_eq!(consumer.processed(), 4);
//! assert_eq!(consumer.post(5), Err(QueueError::ShutDown));
//! # Ok::<(), QueueError>(())
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::{ConsumerConfig, QueueConfig};
use crate::error::{QueueError, Result};
use crate::logging::{span_names, targets};
use crate::queue::MessageQueue;

/// Queue element for consumers that can be told to stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope<T> {
    /// A message to hand to the consumer.
    Message(T),
    /// Poison pill: the consumer stops when it dequeues this.
    Shutdown,
}

impl<T> Envelope<T> {
    /// Whether this is the poison pill.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown)
    }

    /// The wrapped message, or `None` for the poison pill.
    pub fn into_message(self) -> Option<T> {
        match self {
            Self::Message(msg) => Some(msg),
            Self::Shutdown => None,
        }
    }
}

impl<T> From<T> for Envelope<T> {
    fn from(msg: T) -> Self {
        Self::Message(msg)
    }
}

/// State shared between the Consumer handle and its thread.
struct ConsumerState {
    /// Whether the consumer thread is still running.
    running: AtomicBool,
    /// Whether new messages are accepted. Held while a message or the
    /// shutdown pill is enqueued, so nothing lands behind the pill.
    accepting: Mutex<bool>,
    /// Messages handed to the handler so far.
    processed: AtomicUsize,
}

impl ConsumerState {
    fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            accepting: Mutex::new(true),
            processed: AtomicUsize::new(0),
        }
    }
}

/// Clears the running flags when the consumer thread exits, even by panic.
struct ExitGuard(Arc<ConsumerState>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        *self.0.accepting.lock() = false;
        self.0.running.store(false, Ordering::Release);
    }
}

/// A dedicated thread draining a message queue.
///
/// Messages are handled one at a time, in the order they were posted.
/// Dropping the handle requests shutdown but does not wait for the thread;
/// call [`join`](Self::join) or [`shutdown_and_join`](Self::shutdown_and_join)
/// to wait.
pub struct Consumer<T: Send + 'static> {
    queue: Arc<MessageQueue<Envelope<T>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    state: Arc<ConsumerState>,
    name: String,
}

impl<T: Send + 'static> Consumer<T> {
    /// Spawn a consumer with default configuration.
    pub fn spawn<F>(handler: F) -> Result<Self>
    where
        F: FnMut(T) + Send + 'static,
    {
        Self::with_config(ConsumerConfig::default(), handler)
    }

    /// Spawn a consumer with custom configuration.
    ///
    /// Fails with [`QueueError::Fatal`] if the thread cannot be created.
    pub fn with_config<F>(config: ConsumerConfig, handler: F) -> Result<Self>
    where
        F: FnMut(T) + Send + 'static,
    {
        let queue = Arc::new(MessageQueue::with_config(QueueConfig::with_name(
            config.name.clone(),
        )));
        let state = Arc::new(ConsumerState::new());

        let thread_queue = queue.clone();
        let exit_guard = ExitGuard(state.clone());
        let idle_timeout = config.idle_timeout;

        let mut builder = thread::Builder::new().name(config.name.clone());
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let handle = builder
            .spawn(move || {
                let exit = exit_guard;
                consumer_loop(&thread_queue, &exit.0, idle_timeout, handler);
            })
            .map_err(|err| {
                QueueError::Fatal(format!("failed to spawn consumer thread: {err}"))
            })?;

        tracing::debug!(target: targets::CONSUMER, name = %config.name, "consumer started");

        Ok(Self {
            queue,
            handle: Mutex::new(Some(handle)),
            state,
            name: config.name,
        })
    }

    /// The consumer's thread name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if the consumer thread is still running.
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Acquire)
    }

    /// Number of messages the handler has finished with.
    pub fn processed(&self) -> usize {
        self.state.processed.load(Ordering::Acquire)
    }

    /// Number of envelopes waiting in the queue.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// The underlying queue.
    ///
    /// Producers holding a clone of this `Arc` can post
    /// [`Envelope::Message`] directly, bypassing the shutdown check.
    pub fn queue(&self) -> &Arc<MessageQueue<Envelope<T>>> {
        &self.queue
    }

    /// Queue a message for the handler.
    ///
    /// Returns [`QueueError::ShutDown`] once shutdown has been requested or
    /// the thread has exited.
    pub fn post(&self, msg: T) -> Result<()> {
        let accepting = self.state.accepting.lock();
        if !*accepting {
            return Err(QueueError::ShutDown);
        }
        self.queue.post(Envelope::Message(msg))
    }

    /// Ask the consumer to stop after the messages already queued.
    ///
    /// Non-blocking. Calling it more than once has no further effect.
    pub fn shutdown(&self) -> Result<()> {
        let mut accepting = self.state.accepting.lock();
        if !*accepting {
            return Ok(());
        }
        *accepting = false;
        tracing::debug!(target: targets::CONSUMER, name = %self.name, "shutdown requested");
        self.queue.post(Envelope::Shutdown)
    }

    /// Wait for the consumer thread to finish.
    ///
    /// Returns `true` if the thread was joined successfully, `false` if it
    /// was already joined or the handler panicked.
    pub fn join(&self) -> bool {
        let mut handle = self.handle.lock();
        if let Some(h) = handle.take() {
            h.join().is_ok()
        } else {
            false
        }
    }

    /// Shut down and wait for the thread to finish.
    pub fn shutdown_and_join(&self) -> bool {
        if let Err(err) = self.shutdown() {
            tracing::warn!(target: targets::CONSUMER, name = %self.name, %err, "failed to post shutdown");
        }
        self.join()
    }
}

impl<T: Send + 'static> Drop for Consumer<T> {
    fn drop(&mut self) {
        // Don't block in drop - just request shutdown
        if let Err(err) = self.shutdown() {
            tracing::warn!(target: targets::CONSUMER, name = %self.name, %err, "failed to post shutdown");
        }
    }
}

static_assertions::assert_impl_all!(Consumer<String>: Send, Sync);

/// The consumer thread body.
fn consumer_loop<T, F>(
    queue: &MessageQueue<Envelope<T>>,
    state: &ConsumerState,
    idle_timeout: Option<Duration>,
    mut handler: F,
) where
    F: FnMut(T),
{
    let _span = tracing::debug_span!(
        target: targets::CONSUMER,
        span_names::CONSUMER_LOOP,
        queue = %queue.name()
    )
    .entered();

    loop {
        let next = match idle_timeout {
            Some(timeout) => queue.receive_timeout(timeout),
            None => queue.receive(),
        };

        match next {
            Ok(Envelope::Message(msg)) => {
                handler(msg);
                state.processed.fetch_add(1, Ordering::AcqRel);
            }
            Ok(Envelope::Shutdown) => {
                tracing::debug!(target: targets::CONSUMER, "received shutdown");
                break;
            }
            Err(QueueError::Timeout) => {
                tracing::debug!(target: targets::CONSUMER, ?idle_timeout, "idle timeout elapsed");
                // Posts that won the race against the timeout were accepted;
                // close the door, then handle them.
                *state.accepting.lock() = false;
                drain_accepted(queue, state, &mut handler);
                break;
            }
            Err(err) => {
                tracing::error!(target: targets::CONSUMER, %err, "consumer queue failed");
                break;
            }
        }
    }
}

/// Handle whatever is left in the queue once no new posts are accepted.
fn drain_accepted<T, F>(queue: &MessageQueue<Envelope<T>>, state: &ConsumerState, handler: &mut F)
where
    F: FnMut(T),
{
    loop {
        match queue.try_receive() {
            Ok(Some(Envelope::Message(msg))) => {
                handler(msg);
                state.processed.fetch_add(1, Ordering::AcqRel);
            }
            Ok(Some(Envelope::Shutdown)) | Ok(None) => break,
            Err(err) => {
                tracing::error!(target: targets::CONSUMER, %err, "consumer queue failed");
                break;
            }
        }
    }
}
