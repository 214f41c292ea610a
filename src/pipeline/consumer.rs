//! Consumer worker
//!
//! Drains the shared buffer into a destination until it takes a sentinel.
//! Each consumer appends items in the order it dequeued them; when several
//! consumers share one destination the overall order is unspecified.

use crate::error::WorkerError;
use crate::pipeline::buffer::BoundedBuffer;
use crate::pipeline::message::Message;
use crate::pipeline::worker::{WorkerHandle, WorkerRole, WorkerStats};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info};

/// Collection shared by one or more consumers
pub type Destination<T> = Arc<Mutex<Vec<T>>>;

/// Hook invoked with every consumed item
pub type ItemCallback<T> = Box<dyn Fn(&T) + Send + 'static>;

/// Create an empty shared destination
pub fn destination<T>() -> Destination<T> {
    Arc::new(Mutex::new(Vec::new()))
}

/// Pulls items from a [`BoundedBuffer`] into a [`Destination`]
pub struct Consumer<T> {
    buffer: Arc<BoundedBuffer<Message<T>>>,
    destination: Destination<T>,
    on_item: Option<ItemCallback<T>>,
    stats: Arc<WorkerStats>,
}

impl<T> Consumer<T> {
    pub fn new(buffer: Arc<BoundedBuffer<Message<T>>>, destination: Destination<T>) -> Self {
        Self {
            buffer,
            destination,
            on_item: None,
            stats: Arc::new(WorkerStats::default()),
        }
    }

    /// Call `f` with each item taken from the buffer
    ///
    /// `f` runs without the destination lock held, just before the item is
    /// appended. The item is appended even if `f` panics; the panic then
    /// ends the consumer and shows up as [`WorkerError::Panicked`] when the
    /// worker is joined.
    pub fn with_callback<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) + Send + 'static,
    {
        self.on_item = Some(Box::new(f));
        self
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Consume on the current thread until a sentinel arrives
    ///
    /// Returns the number of items appended. The sentinel itself is never
    /// appended.
    pub fn run(&self) -> u64 {
        let mut taken = 0u64;

        while let Message::Item(item) = self.buffer.get() {
            self.stats.record_item();
            taken += 1;

            let outcome = self
                .on_item
                .as_ref()
                .map(|on_item| panic::catch_unwind(AssertUnwindSafe(|| on_item(&item))));

            self.destination.lock().push(item);

            if let Some(Err(payload)) = outcome {
                panic::resume_unwind(payload);
            }
        }

        debug!(items = taken, "Sentinel received");
        taken
    }
}

impl<T: Send + 'static> Consumer<T> {
    /// Run the consumer on its own thread named `consumer-<id>`
    pub fn spawn(self, id: usize) -> Result<WorkerHandle, WorkerError> {
        let stats = Arc::clone(&self.stats);
        WorkerHandle::spawn(id, WorkerRole::Consumer, stats, move || {
            info!(worker = id, "Consumer starting");
            let taken = self.run();
            info!(worker = id, items = taken, "Consumer finished");
        })
    }
}
