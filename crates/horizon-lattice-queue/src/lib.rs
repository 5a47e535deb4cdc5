//! Thread-safe message queue for Horizon Lattice.
//!
//! This crate hands owned values between threads:
//!
//! - **MessageQueue**: an unbounded FIFO guarded by one mutex and one
//!   condition variable, with blocking, timed and non-blocking receive
//! - **Consumer**: a dedicated thread draining a queue, stopped by posting a
//!   poison pill ([`Envelope::Shutdown`])
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//! use std::time::Duration;
//!
//! use horizon_lattice_queue::{Envelope, MessageQueue};
//!
//! let queue = Arc::new(MessageQueue::<Envelope<String>>::new());
//!
//! let consumer = {
//!     let queue = queue.clone();
//!     thread::spawn(move || {
//!         let mut seen = Vec::new();
//!         while let Ok(Envelope::Message(text)) = queue.receive() {
//!             seen.push(text);
//!         }
//!         seen
//!     })
//! };
//!
//! queue.post(Envelope::Message("hello".into())).unwrap();
//! queue.post(Envelope::Message("world".into())).unwrap();
//! queue.post(Envelope::Shutdown).unwrap();
//!
//! assert_eq!(consumer.join().unwrap(), vec!["hello", "world"]);
//! assert!(queue.receive_timeout(Duration::from_millis(5)).is_err());
//! ```

mod config;
mod consumer;
mod error;
pub mod logging;
mod queue;

pub use config::{ConsumerBuilder, ConsumerConfig, QueueBuilder, QueueConfig};
pub use consumer::{Consumer, Envelope};
pub use error::{QueueError, Result};
pub use queue::MessageQueue;
