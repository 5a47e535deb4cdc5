//! Configuration for queues and consumer threads.

use std::time::Duration;

use crate::consumer::Consumer;
use crate::error::Result;
use crate::queue::MessageQueue;

/// Default name reported by queues in log events.
const DEFAULT_QUEUE_NAME: &str = "message-queue";

/// Default name for consumer threads.
const DEFAULT_CONSUMER_NAME: &str = "horizon-consumer";

/// Configuration for creating a [`MessageQueue`].
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Name used to identify the queue in log events.
    pub name: String,
    /// Number of messages to preallocate room for. The queue still grows
    /// without bound past this.
    pub initial_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_QUEUE_NAME.to_string(),
            initial_capacity: 0,
        }
    }
}

impl QueueConfig {
    /// Create a new configuration with the given queue name.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Builder for creating queues with custom configuration.
#[derive(Debug, Default)]
pub struct QueueBuilder {
    config: QueueConfig,
}

impl QueueBuilder {
    /// Create a new QueueBuilder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the queue name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the preallocated capacity.
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.config.initial_capacity = capacity;
        self
    }

    /// Build the queue.
    pub fn build<T>(self) -> MessageQueue<T> {
        MessageQueue::with_config(self.config)
    }
}

/// Configuration for spawning a [`Consumer`].
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Name for the consumer thread. Also used as the queue name.
    pub name: String,
    /// Stack size for the consumer thread in bytes. `None` uses the default.
    pub stack_size: Option<usize>,
    /// Exit the consumer thread when no message arrives for this long.
    /// `None` waits forever.
    pub idle_timeout: Option<Duration>,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_CONSUMER_NAME.to_string(),
            stack_size: None,
            idle_timeout: None,
        }
    }
}

impl ConsumerConfig {
    /// Create a new configuration with the given thread name.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Builder for spawning consumers with custom configuration.
#[derive(Debug, Default)]
pub struct ConsumerBuilder {
    config: ConsumerConfig,
}

impl ConsumerBuilder {
    /// Create a new ConsumerBuilder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the thread name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the stack size for the consumer thread.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    /// Stop the consumer after `timeout` without messages.
    ///
    /// A zero duration is ignored, since a zero receive timeout means
    /// "wait forever".
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Spawn the consumer thread, running `handler` for every message.
    pub fn spawn<T, F>(self, handler: F) -> Result<Consumer<T>>
    where
        T: Send + 'static,
        F: FnMut(T) + Send + 'static,
    {
        Consumer::with_config(self.config, handler)
    }
}
