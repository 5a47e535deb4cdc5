//! Error types for the message queue.

use thiserror::Error;

/// Errors returned by [`MessageQueue`](crate::MessageQueue) and
/// [`Consumer`](crate::Consumer) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// No message became available before the receive timeout elapsed.
    ///
    /// This is the only error a caller is expected to retry on.
    #[error("Timed out waiting for a message")]
    Timeout,
    /// The queue can no longer be used.
    ///
    /// Raised when a panic unwound through a critical section of the queue,
    /// or when a consumer thread could not be started. Not recoverable for
    /// the affected instance.
    #[error("Message queue failure: {0}")]
    Fatal(String),
    /// The consumer has been asked to shut down and rejects new messages.
    #[error("Consumer has been shut down")]
    ShutDown,
}

impl QueueError {
    /// Whether this error is a receive timeout.
    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

/// A specialized Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;
