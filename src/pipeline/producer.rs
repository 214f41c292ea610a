//! Producer worker
//!
//! Feeds a source sequence into the shared buffer in order. A full buffer
//! simply blocks the producer; nothing is polled or dropped.

use crate::error::WorkerError;
use crate::pipeline::buffer::BoundedBuffer;
use crate::pipeline::message::Message;
use crate::pipeline::worker::{WorkerHandle, WorkerRole, WorkerStats};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Pushes items from a source into a [`BoundedBuffer`]
pub struct Producer<T> {
    buffer: Arc<BoundedBuffer<Message<T>>>,

    /// Put one sentinel after the source is exhausted
    send_sentinel: bool,

    /// Pause after each put
    pace: Option<Duration>,

    /// Stop feeding new items once set
    shutdown: Option<Arc<AtomicBool>>,

    stats: Arc<WorkerStats>,
}

impl<T> Producer<T> {
    /// Create a producer for `buffer` with no sentinel and no pacing
    pub fn new(buffer: Arc<BoundedBuffer<Message<T>>>) -> Self {
        Self {
            buffer,
            send_sentinel: false,
            pace: None,
            shutdown: None,
            stats: Arc::new(WorkerStats::default()),
        }
    }

    /// Finish with a single sentinel
    pub fn with_sentinel(mut self) -> Self {
        self.send_sentinel = true;
        self
    }

    /// Sleep for `pace` after each put; zero disables pacing
    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = (!pace.is_zero()).then_some(pace);
        self
    }

    /// Check `flag` before each item and stop early when it is set
    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Feed `source` into the buffer on the current thread
    ///
    /// Returns the number of items put, sentinel excluded.
    pub fn run<I>(&self, source: I) -> u64
    where
        I: IntoIterator<Item = T>,
    {
        let mut sent = 0u64;

        for item in source {
            if self.shutdown_requested() {
                debug!(sent, "Shutdown requested, producer stopping early");
                break;
            }

            self.buffer.put(Message::Item(item));
            self.stats.record_item();
            sent += 1;

            if let Some(pace) = self.pace {
                thread::sleep(pace);
            }
        }

        if self.send_sentinel {
            self.buffer.put(Message::Sentinel);
        }

        sent
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

impl<T: Send + 'static> Producer<T> {
    /// Run the producer on its own thread named `producer-<id>`
    pub fn spawn<I>(self, id: usize, source: I) -> Result<WorkerHandle, WorkerError>
    where
        I: IntoIterator<Item = T> + Send + 'static,
    {
        let stats = Arc::clone(&self.stats);
        WorkerHandle::spawn(id, WorkerRole::Producer, stats, move || {
            info!(worker = id, "Producer starting");
            let sent = self.run(source);
            info!(worker = id, items = sent, "Producer finished");
        })
    }
}
