//! Worker thread handles
//!
//! Every producer and consumer runs on its own named OS thread. The handle
//! keeps the join handle, per-worker counters and a completion channel so the
//! coordinator can join with a deadline instead of hanging on a deadlock.

use crate::error::WorkerError;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::warn;

/// Which side of the buffer a worker sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerRole {
    Producer,
    Consumer,
}

impl fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerRole::Producer => f.write_str("producer"),
            WorkerRole::Consumer => f.write_str("consumer"),
        }
    }
}

/// Statistics collected by a worker
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Items put (producer) or taken (consumer), sentinels excluded
    pub items: AtomicU64,
}

impl WorkerStats {
    pub(crate) fn record_item(&self) {
        self.items.fetch_add(1, Ordering::Relaxed);
    }

    pub fn items(&self) -> u64 {
        self.items.load(Ordering::Relaxed)
    }
}

/// A running producer or consumer thread
pub struct WorkerHandle {
    id: usize,
    name: String,
    role: WorkerRole,

    /// Thread handle
    handle: Option<JoinHandle<()>>,

    /// Disconnects when the thread exits, whether it returned or unwound
    done: Receiver<()>,

    stats: Arc<WorkerStats>,
}

impl WorkerHandle {
    /// Spawn `body` on a thread named `<role>-<id>`
    pub(crate) fn spawn<F>(
        id: usize,
        role: WorkerRole,
        stats: Arc<WorkerStats>,
        body: F,
    ) -> Result<Self, WorkerError>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = format!("{}-{}", role, id);
        let (done_tx, done) = bounded::<()>(0);

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                // Dropped on return and on unwind alike.
                let _done: Sender<()> = done_tx;
                body();
            })
            .map_err(|e| WorkerError::SpawnFailed {
                name: name.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            name,
            role,
            handle: Some(handle),
            done,
            stats,
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Thread name, e.g. `consumer-2`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> WorkerRole {
        self.role
    }

    /// Get worker statistics
    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Statistics handle that outlives the join
    pub fn shared_stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    /// Whether the thread has exited
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Wait for the worker to finish, however long it takes
    pub fn join(mut self) -> Result<(), WorkerError> {
        self.join_inner()
    }

    /// Wait at most `timeout` for the worker to finish
    ///
    /// A worker still running at the deadline is reported as
    /// [`WorkerError::Stalled`]; its thread is left detached.
    pub fn join_timeout(mut self, timeout: Duration) -> Result<(), WorkerError> {
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => self.join_inner(),
            Err(RecvTimeoutError::Timeout) => {
                warn!(worker = %self.name, timeout_ms = timeout.as_millis() as u64, "Worker did not finish in time");
                Err(WorkerError::Stalled {
                    name: self.name.clone(),
                    timeout,
                })
            }
        }
    }

    fn join_inner(&mut self) -> Result<(), WorkerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|payload| WorkerError::Panicked {
                name: self.name.clone(),
                message: panic_message(payload.as_ref()),
            }),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("name", &self.name)
            .field("items", &self.stats.items())
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Best-effort text of a panic payload
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Worker thread panicked".into()
    }
}

/// Sum items across workers
pub fn aggregate_items(stats: &[Arc<WorkerStats>]) -> u64 {
    stats.iter().map(|s| s.items()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_reports_panic_message() {
        let stats = Arc::new(WorkerStats::default());
        let worker = WorkerHandle::spawn(3, WorkerRole::Consumer, stats, || {
            panic!("callback exploded");
        })
        .unwrap();

        assert_eq!(worker.name(), "consumer-3");
        let err = worker.join_timeout(Duration::from_secs(5)).unwrap_err();
        assert_eq!(
            err,
            WorkerError::Panicked {
                name: "consumer-3".into(),
                message: "callback exploded".into(),
            }
        );
    }

    #[test]
    fn test_join_timeout_reports_stall() {
        let (release_tx, release_rx) = bounded::<()>(0);
        let stats = Arc::new(WorkerStats::default());
        let worker = WorkerHandle::spawn(1, WorkerRole::Producer, stats, move || {
            let _ = release_rx.recv();
        })
        .unwrap();

        let err = worker.join_timeout(Duration::from_millis(30)).unwrap_err();
        assert!(matches!(err, WorkerError::Stalled { ref name, .. } if name == "producer-1"));

        // Let the detached thread exit.
        drop(release_tx);
    }

    #[test]
    fn test_worker_stats() {
        let stats = Arc::new(WorkerStats::default());
        let counted = Arc::clone(&stats);
        let worker = WorkerHandle::spawn(1, WorkerRole::Producer, Arc::clone(&stats), move || {
            for _ in 0..5 {
                counted.record_item();
            }
        })
        .unwrap();

        worker.join_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(stats.items(), 5);
    }
}
