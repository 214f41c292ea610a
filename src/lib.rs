//! bounded-buffer - Bounded Producer/Consumer Buffer
//!
//! A fixed-capacity, thread-safe FIFO that coordinates any number of
//! producer and consumer threads with blocking `put`/`get`, plus the worker
//! and coordinator types that drive it.
//!
//! # Features
//!
//! - **Blocking Backpressure**: producers block while the buffer is full,
//!   consumers block while it is empty. Nothing is dropped or reordered.
//!
//! - **Sentinel Shutdown**: `Message::Sentinel` is a separate enum variant,
//!   so it can never collide with a payload. One sentinel stops one consumer.
//!
//! - **Bounded Joins**: every worker is a named thread with a join deadline;
//!   a deadlocked or panicked worker becomes an error, not a hang.
//!
//! # Example
//!
//! ```
//! use bounded_buffer::pipeline::{destination, BoundedBuffer, Consumer, Producer};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let buffer = Arc::new(BoundedBuffer::new(3).unwrap());
//! let out = destination();
//!
//! let producer = Producer::new(Arc::clone(&buffer))
//!     .with_sentinel()
//!     .spawn(1, vec!["a", "b", "c", "d"])
//!     .unwrap();
//! let consumer = Consumer::new(Arc::clone(&buffer), Arc::clone(&out))
//!     .spawn(1)
//!     .unwrap();
//!
//! producer.join_timeout(Duration::from_secs(5)).unwrap();
//! consumer.join_timeout(Duration::from_secs(5)).unwrap();
//! assert_eq!(*out.lock(), vec!["a", "b", "c", "d"]);
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod progress;

pub use config::{CliArgs, RunConfig};
pub use error::{BufferError, PipelineError, Result, WorkerError};
pub use pipeline::{BoundedBuffer, Consumer, Coordinator, Message, Producer, RunResult};
