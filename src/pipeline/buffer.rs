//! Bounded blocking FIFO buffer
//!
//! A fixed-capacity queue guarded by one mutex and one condition variable.
//! `put` blocks while the buffer is full, `get` blocks while it is empty.
//! Every state change broadcasts to all waiters and each waiter re-checks
//! its own predicate in a loop, so a spurious wakeup or a wakeup meant for
//! the other side can never push past capacity or pop from empty.

use crate::error::{BufferError, PutTimeoutError};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::trace;

/// Counters describing buffer traffic
#[derive(Debug, Default)]
pub struct BufferStats {
    /// Items stored
    pub puts: AtomicU64,

    /// Items removed
    pub gets: AtomicU64,

    /// Times a put found the buffer full and had to wait
    pub put_waits: AtomicU64,

    /// Times a get found the buffer empty and had to wait
    pub get_waits: AtomicU64,

    /// Largest length observed after a put
    pub peak_size: AtomicUsize,
}

impl BufferStats {
    /// Copy the counters into a plain value
    pub fn snapshot(&self) -> BufferStatsSnapshot {
        BufferStatsSnapshot {
            puts: self.puts.load(Ordering::Relaxed),
            gets: self.gets.load(Ordering::Relaxed),
            put_waits: self.put_waits.load(Ordering::Relaxed),
            get_waits: self.get_waits.load(Ordering::Relaxed),
            peak_size: self.peak_size.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`BufferStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStatsSnapshot {
    pub puts: u64,
    pub gets: u64,
    pub put_waits: u64,
    pub get_waits: u64,
    pub peak_size: usize,
}

/// Fixed-capacity, thread-safe FIFO with blocking put/get
///
/// Share it between threads with `Arc<BoundedBuffer<T>>`.
pub struct BoundedBuffer<T> {
    /// Queued items, `len() <= capacity` at all times
    items: Mutex<VecDeque<T>>,

    /// Broadcast on every put and get
    changed: Condvar,

    /// Maximum number of queued items
    capacity: usize,

    stats: BufferStats,
}

impl<T> BoundedBuffer<T> {
    /// Create a buffer holding at most `capacity` items
    pub fn new(capacity: usize) -> Result<Self, BufferError> {
        if capacity == 0 {
            return Err(BufferError::InvalidCapacity { capacity });
        }

        Ok(Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            changed: Condvar::new(),
            capacity,
            stats: BufferStats::default(),
        })
    }

    /// Store an item at the tail, blocking while the buffer is full
    pub fn put(&self, item: T) {
        let mut items = self.items.lock();

        if items.len() >= self.capacity {
            self.stats.put_waits.fetch_add(1, Ordering::Relaxed);
            trace!(capacity = self.capacity, "Buffer full, producer waiting");
        }
        while items.len() >= self.capacity {
            self.changed.wait(&mut items);
        }

        items.push_back(item);
        self.record_put(items.len());
        self.changed.notify_all();
    }

    /// Remove and return the head item, blocking while the buffer is empty
    pub fn get(&self) -> T {
        let mut items = self.items.lock();

        if items.is_empty() {
            self.stats.get_waits.fetch_add(1, Ordering::Relaxed);
            trace!("Buffer empty, consumer waiting");
        }
        loop {
            if let Some(item) = items.pop_front() {
                self.stats.gets.fetch_add(1, Ordering::Relaxed);
                self.changed.notify_all();
                return item;
            }
            self.changed.wait(&mut items);
        }
    }

    /// Like [`put`](Self::put) but gives up after `timeout`
    ///
    /// On timeout the item is returned inside the error.
    pub fn put_timeout(&self, item: T, timeout: Duration) -> Result<(), PutTimeoutError<T>> {
        let deadline = Instant::now().checked_add(timeout);
        let mut items = self.items.lock();

        if items.len() >= self.capacity {
            self.stats.put_waits.fetch_add(1, Ordering::Relaxed);
        }
        while items.len() >= self.capacity {
            if self.wait_for_change(&mut items, deadline) && items.len() >= self.capacity {
                return Err(PutTimeoutError(item));
            }
        }

        items.push_back(item);
        self.record_put(items.len());
        self.changed.notify_all();
        Ok(())
    }

    /// Like [`get`](Self::get) but gives up after `timeout`
    pub fn get_timeout(&self, timeout: Duration) -> Result<T, BufferError> {
        let deadline = Instant::now().checked_add(timeout);
        let mut items = self.items.lock();

        if items.is_empty() {
            self.stats.get_waits.fetch_add(1, Ordering::Relaxed);
        }
        loop {
            if let Some(item) = items.pop_front() {
                self.stats.gets.fetch_add(1, Ordering::Relaxed);
                self.changed.notify_all();
                return Ok(item);
            }
            if self.wait_for_change(&mut items, deadline) && items.is_empty() {
                return Err(BufferError::Timeout { waited: timeout });
            }
        }
    }

    /// Remove every queued item at once, waking blocked producers
    pub fn drain(&self) -> Vec<T> {
        let mut items = self.items.lock();
        let drained: Vec<T> = items.drain(..).collect();

        if !drained.is_empty() {
            self.stats
                .gets
                .fetch_add(drained.len() as u64, Ordering::Relaxed);
            self.changed.notify_all();
        }
        drained
    }

    /// Number of queued items right now
    pub fn current_size(&self) -> usize {
        self.items.lock().len()
    }

    /// Maximum number of queued items
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.lock().len() >= self.capacity
    }

    /// Traffic counters
    pub fn stats(&self) -> &BufferStats {
        &self.stats
    }

    /// Wait for a change; returns true once `deadline` has passed.
    /// `None` (deadline not representable) waits without limit.
    fn wait_for_change(
        &self,
        items: &mut MutexGuard<'_, VecDeque<T>>,
        deadline: Option<Instant>,
    ) -> bool {
        match deadline {
            Some(deadline) => self.changed.wait_until(items, deadline).timed_out(),
            None => {
                self.changed.wait(items);
                false
            }
        }
    }

    // Caller holds the lock.
    fn record_put(&self, len: usize) {
        self.stats.puts.fetch_add(1, Ordering::Relaxed);
        self.stats.peak_size.fetch_max(len, Ordering::Relaxed);
    }
}

impl<T> std::fmt::Debug for BoundedBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedBuffer")
            .field("capacity", &self.capacity)
            .field("len", &self.current_size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread::{self, JoinHandle};

    fn join_within<R>(handle: JoinHandle<R>, timeout: Duration) -> R {
        let deadline = Instant::now() + timeout;
        while !handle.is_finished() {
            assert!(Instant::now() < deadline, "thread still running after {:?}", timeout);
            thread::sleep(Duration::from_millis(1));
        }
        handle.join().unwrap()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = BoundedBuffer::<u32>::new(0).unwrap_err();
        assert_eq!(err, BufferError::InvalidCapacity { capacity: 0 });
    }

    #[test]
    fn test_fifo_order() {
        let buffer = BoundedBuffer::new(3).unwrap();
        buffer.put(1);
        buffer.put(2);
        buffer.put(3);

        assert!(buffer.is_full());
        assert_eq!(buffer.current_size(), 3);
        assert_eq!(buffer.get(), 1);
        assert_eq!(buffer.get(), 2);
        assert_eq!(buffer.get(), 3);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_put_timeout_hands_item_back() {
        let buffer = BoundedBuffer::new(1).unwrap();
        buffer.put("a");

        let err = buffer
            .put_timeout("b", Duration::from_millis(20))
            .unwrap_err();
        assert_eq!(err.into_inner(), "b");
        assert_eq!(buffer.current_size(), 1);
        assert_eq!(buffer.stats().put_waits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_get_timeout_on_empty() {
        let buffer = BoundedBuffer::<u8>::new(2).unwrap();
        let err = buffer.get_timeout(Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, BufferError::Timeout { .. }));
    }

    #[test]
    fn test_get_timeout_receives_late_put() {
        let buffer = Arc::new(BoundedBuffer::new(1).unwrap());
        let producer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                buffer.put(42);
            })
        };

        assert_eq!(buffer.get_timeout(Duration::from_secs(5)), Ok(42));
        join_within(producer, Duration::from_secs(5));
    }

    #[test]
    fn test_blocked_put_resumes_after_get() {
        let buffer = Arc::new(BoundedBuffer::new(1).unwrap());
        buffer.put(1);

        let (done_tx, done_rx) = mpsc::channel();
        let worker = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                buffer.put(2);
                done_tx.send(()).unwrap();
            })
        };

        assert!(done_rx.recv_timeout(Duration::from_millis(50)).is_err());
        assert_eq!(buffer.get(), 1);
        assert!(done_rx.recv_timeout(Duration::from_secs(1)).is_ok());
        join_within(worker, Duration::from_secs(5));
        assert_eq!(buffer.get(), 2);
    }

    #[test]
    fn test_stats() {
        let buffer = BoundedBuffer::new(4).unwrap();
        buffer.put('x');
        buffer.put('y');
        buffer.get();

        let stats = buffer.stats().snapshot();
        assert_eq!(stats.puts, 2);
        assert_eq!(stats.gets, 1);
        assert_eq!(stats.peak_size, 2);
        assert_eq!(stats.put_waits, 0);
    }

    #[test]
    fn test_drain_releases_blocked_put() {
        let buffer = Arc::new(BoundedBuffer::new(2).unwrap());
        buffer.put(1);
        buffer.put(2);

        let putter = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || buffer.put(3))
        };

        thread::sleep(Duration::from_millis(20));
        assert_eq!(buffer.drain(), vec![1, 2]);
        join_within(putter, Duration::from_secs(5));

        assert_eq!(buffer.drain(), vec![3]);
        assert!(buffer.drain().is_empty());
        assert_eq!(buffer.stats().snapshot().gets, 3);
    }
}
