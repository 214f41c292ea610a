//! Error types for bounded-buffer
//!
//! This module defines the error hierarchy for:
//! - Buffer construction and timed operations
//! - Worker thread faults (panics, stalls, spawn failures)
//! - Configuration and CLI errors
//!
//! Library code uses thiserror enums; the binary wraps them with anyhow.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Buffer errors
    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Buffer stayed full while enqueuing end-of-stream markers
    #[error("Timed out enqueuing sentinel {index} of {total}: buffer stayed full")]
    SentinelTimeout { index: usize, total: usize },
}

/// Errors raised by [`BoundedBuffer`](crate::pipeline::BoundedBuffer)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// Capacity must be at least one slot
    #[error("Invalid buffer capacity {capacity}: must be positive")]
    InvalidCapacity { capacity: usize },

    /// A timed get gave up with the buffer still empty
    #[error("Timed out after {waited:?} waiting for an item")]
    Timeout { waited: Duration },
}

/// Returned by a timed put that could not find space in time.
///
/// The rejected item is handed back so the caller decides whether to retry
/// or drop it.
pub struct PutTimeoutError<T>(pub T);

impl<T> PutTimeoutError<T> {
    /// Take back the item that was not stored
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for PutTimeoutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PutTimeoutError(..)")
    }
}

impl<T> fmt::Display for PutTimeoutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("timed out waiting for buffer space")
    }
}

impl<T> std::error::Error for PutTimeoutError<T> {}

/// Worker thread errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// The OS refused to start the thread
    #[error("Failed to spawn worker {name}: {reason}")]
    SpawnFailed { name: String, reason: String },

    /// Worker panicked (source iterator or item callback faulted)
    #[error("Worker {name} panicked: {message}")]
    Panicked { name: String, message: String },

    /// Worker still running after its join deadline (likely deadlocked)
    #[error("Worker {name} still running after {timeout:?} - possible deadlock")]
    Stalled { name: String, timeout: Duration },
}

impl WorkerError {
    /// Name of the worker thread this error refers to
    pub fn worker_name(&self) -> &str {
        match self {
            WorkerError::SpawnFailed { name, .. } => name,
            WorkerError::Panicked { name, .. } => name,
            WorkerError::Stalled { name, .. } => name,
        }
    }
}

/// Configuration and CLI errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Nothing to produce
    #[error("Invalid item count {count}: must be positive")]
    InvalidItemCount { count: usize },

    /// Invalid producer or consumer count
    #[error("Invalid {role} count {count}: must be between 1 and {max}")]
    InvalidWorkerCount {
        role: &'static str,
        count: usize,
        max: usize,
    },

    /// Negative or non-finite pacing delay
    #[error("Invalid delay {seconds}s: must be a finite, non-negative number")]
    InvalidDelay { seconds: f64 },

    /// Non-positive or non-finite join timeout
    #[error("Invalid join timeout {seconds}s: must be a finite, positive number")]
    InvalidTimeout { seconds: f64 },
}

/// Result type alias for PipelineError
pub type Result<T> = std::result::Result<T, PipelineError>;
