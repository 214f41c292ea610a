//! Run coordinator - wires producers and consumers to one buffer
//!
//! The coordinator is responsible for:
//! - Generating the labelled items and spreading them over producers
//! - Starting every producer and consumer against a shared buffer
//! - Joining producers, then enqueuing one sentinel per live consumer
//! - Joining consumers and collecting the consumed sequence
//!
//! Every join is bounded by the configured timeout, so a deadlock is
//! reported as an error instead of hanging the process. If every consumer
//! dies early the producers are stopped rather than left blocked on a full
//! buffer, and the panic is reported ahead of anything it caused.

use crate::config::RunConfig;
use crate::error::{PipelineError, Result, WorkerError};
use crate::pipeline::buffer::{BoundedBuffer, BufferStatsSnapshot};
use crate::pipeline::consumer::{destination, Consumer, Destination};
use crate::pipeline::message::Message;
use crate::pipeline::producer::Producer;
use crate::pipeline::worker::{aggregate_items, WorkerHandle};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How often to check on producers while they run
const CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Called with each consumed item, e.g. to advance a progress bar
pub type ProgressHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Result of a completed run
#[derive(Debug)]
pub struct RunResult {
    /// Items in the order consumers appended them
    pub consumed: Vec<String>,

    /// Items actually put by producers
    pub produced: u64,

    /// Producer threads started (may be fewer than requested)
    pub producers: usize,

    /// Consumer threads started
    pub consumers: usize,

    /// Wall-clock start of the run
    pub started_at: DateTime<Utc>,

    /// Time taken for the run
    pub duration: Duration,

    /// Buffer traffic at the end of the run
    pub buffer: BufferStatsSnapshot,

    /// Whether every producer fed its whole share (vs was interrupted)
    pub completed: bool,
}

/// Coordinates one producer/consumer run
pub struct Coordinator {
    /// Configuration
    config: RunConfig,

    /// Shared buffer
    buffer: Arc<BoundedBuffer<Message<String>>>,

    /// Shutdown signal
    shutdown: Arc<AtomicBool>,

    on_consumed: Option<ProgressHook>,
}

impl Coordinator {
    /// Create a coordinator and its buffer
    ///
    /// Fails with [`BufferError::InvalidCapacity`](crate::error::BufferError)
    /// before any thread is started.
    pub fn new(config: RunConfig) -> Result<Self> {
        let buffer = Arc::new(BoundedBuffer::new(config.buffer_capacity)?);

        Ok(Self {
            config,
            buffer,
            shutdown: Arc::new(AtomicBool::new(false)),
            on_consumed: None,
        })
    }

    /// Get a clone of the shutdown flag (for signal handlers)
    ///
    /// Once set, producers stop feeding new items; consumers still drain
    /// whatever was queued and stop on their sentinels.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Invoke `hook` for every consumed item
    pub fn with_progress(mut self, hook: ProgressHook) -> Self {
        self.on_consumed = Some(hook);
        self
    }

    /// Run producers and consumers to completion
    pub fn run(self) -> Result<RunResult> {
        let start_time = Instant::now();
        let started_at = Utc::now();
        let config = &self.config;

        info!(
            items = config.item_count,
            buffer_capacity = config.buffer_capacity,
            producers = config.producer_count,
            consumers = config.consumer_count,
            delay_ms = config.delay.as_millis() as u64,
            "Starting run"
        );

        let groups = distribute_round_robin(item_labels(config.item_count), config.producer_count);
        let sink = destination();
        let producers = self.spawn_producers(groups)?;
        let mut consumers = Vec::with_capacity(config.consumer_count);
        if let Err(e) = self.spawn_consumers(&sink, &mut consumers) {
            self.stop_producers(producers);
            self.stop_consumers(consumers);
            return Err(e);
        }
        let producer_count = producers.len();
        let consumer_count = consumers.len();

        info!(
            producers = producer_count,
            consumers = consumer_count,
            "Workers spawned"
        );

        let producer_stats: Vec<_> = producers.iter().map(WorkerHandle::shared_stats).collect();
        let consumer_stats: Vec<_> = consumers.iter().map(WorkerHandle::shared_stats).collect();

        let deadline = Instant::now().checked_add(config.join_timeout);
        self.wait_for_producers(&producers, &consumers, deadline);
        let mut errors = join_all(producers, remaining(deadline, config.join_timeout));

        // One sentinel per consumer still running, even after a producer
        // fault, so no live consumer is left waiting.
        let live = consumers.iter().filter(|c| !c.is_finished()).count();
        for index in 1..=live {
            if let Err(e) = self
                .buffer
                .put_timeout(Message::Sentinel, config.join_timeout)
            {
                warn!(error = %e, sentinel = index, "Could not enqueue sentinel");
                errors.push(PipelineError::SentinelTimeout { index, total: live });
                break;
            }
        }

        errors.extend(join_all(consumers, config.join_timeout));
        if let Some(e) = primary_error(errors) {
            return Err(e);
        }

        let consumed = std::mem::take(&mut *sink.lock());
        let produced = aggregate_items(&producer_stats);
        let duration = start_time.elapsed();

        info!(
            produced,
            consumed = aggregate_items(&consumer_stats),
            duration_ms = duration.as_millis() as u64,
            "Run completed"
        );
        debug!(sequence = ?consumed, "Consumed sequence");

        Ok(RunResult {
            consumed,
            produced,
            producers: producer_count,
            consumers: consumer_count,
            started_at,
            duration,
            buffer: self.buffer.stats().snapshot(),
            completed: !self.shutdown.load(Ordering::Relaxed),
        })
    }

    /// Spawn one producer per non-empty item group
    fn spawn_producers(&self, groups: Vec<Vec<String>>) -> Result<Vec<WorkerHandle>> {
        let mut producers = Vec::with_capacity(groups.len());

        for (index, group) in groups.into_iter().enumerate() {
            let producer = Producer::new(Arc::clone(&self.buffer))
                .with_pace(self.config.delay)
                .with_shutdown(Arc::clone(&self.shutdown));
            match producer.spawn(index + 1, group) {
                Ok(handle) => producers.push(handle),
                Err(e) => {
                    self.stop_producers(producers);
                    return Err(e.into());
                }
            }
        }

        Ok(producers)
    }

    /// Poll until every producer has exited or `deadline` passes
    ///
    /// Once no consumer is left to drain the buffer, the shutdown flag is
    /// raised and queued items are discarded so blocked producers can exit.
    fn wait_for_producers(
        &self,
        producers: &[WorkerHandle],
        consumers: &[WorkerHandle],
        deadline: Option<Instant>,
    ) {
        let mut consumers_gone = false;

        while !producers.iter().all(WorkerHandle::is_finished) {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return;
            }

            if consumers.iter().all(WorkerHandle::is_finished) {
                if !consumers_gone {
                    warn!("No consumer left, stopping producers");
                    self.shutdown.store(true, Ordering::SeqCst);
                    consumers_gone = true;
                }

                let discarded = self.buffer.drain().len();
                if discarded > 0 {
                    debug!(discarded, "Discarded undeliverable items");
                }
            }

            thread::sleep(CHECK_INTERVAL);
        }
    }

    /// Stop and join producers that have no consumers to feed
    fn stop_producers(&self, producers: Vec<WorkerHandle>) {
        let deadline = Instant::now().checked_add(self.config.join_timeout);
        self.wait_for_producers(&producers, &[], deadline);
        join_all(producers, remaining(deadline, self.config.join_timeout));
    }

    /// Send each consumer its sentinel and join it
    fn stop_consumers(&self, consumers: Vec<WorkerHandle>) {
        for _ in &consumers {
            if self
                .buffer
                .put_timeout(Message::Sentinel, self.config.join_timeout)
                .is_err()
            {
                break;
            }
        }
        join_all(consumers, self.config.join_timeout);
    }

    /// Spawn consumers that all append into one shared destination
    ///
    /// On failure `consumers` holds the ones already running.
    fn spawn_consumers(
        &self,
        sink: &Destination<String>,
        consumers: &mut Vec<WorkerHandle>,
    ) -> Result<()> {
        for id in 1..=self.config.consumer_count {
            let buffer = Arc::clone(&self.buffer);
            let hook = self.on_consumed.clone();
            let consumer = Consumer::new(Arc::clone(&self.buffer), Arc::clone(sink))
                .with_callback(move |item: &String| {
                    debug!(
                        worker = id,
                        item = %item,
                        buffer_size = buffer.current_size(),
                        "Item received"
                    );
                    if let Some(hook) = &hook {
                        hook(item);
                    }
                });
            consumers.push(consumer.spawn(id)?);
        }

        Ok(())
    }
}

/// Run with `config` and return the consumed sequence
///
/// Only the multiset of the result is deterministic when more than one
/// producer or consumer runs.
pub fn run_demo(config: &RunConfig) -> Result<Vec<String>> {
    Ok(Coordinator::new(config.clone())?.run()?.consumed)
}

/// Labels `item-001` .. `item-NNN`, 1-based, zero-padded to width 3
pub fn item_labels(count: usize) -> Vec<String> {
    (1..=count).map(|index| format!("item-{:03}", index)).collect()
}

/// Deal `items` round-robin into `buckets` groups, dropping empty groups
pub fn distribute_round_robin<T>(items: Vec<T>, buckets: usize) -> Vec<Vec<T>> {
    let mut groups: Vec<Vec<T>> = (0..buckets.max(1)).map(|_| Vec::new()).collect();
    let len = groups.len();

    for (index, item) in items.into_iter().enumerate() {
        groups[index % len].push(item);
    }

    groups.retain(|group| !group.is_empty());
    groups
}

/// Join every worker, collecting failures in join order
fn join_all(workers: Vec<WorkerHandle>, timeout: Duration) -> Vec<PipelineError> {
    let mut errors = Vec::new();

    for worker in workers {
        let name = worker.name().to_string();
        if let Err(e) = worker.join_timeout(timeout) {
            warn!(worker = %name, error = %e, "Worker failed to join cleanly");
            errors.push(e.into());
        }
    }

    errors
}

/// Pick the error to report
///
/// A panicked worker is the root cause of any stall or sentinel timeout that
/// follows it, so it wins over them.
fn primary_error(mut errors: Vec<PipelineError>) -> Option<PipelineError> {
    let panicked = errors
        .iter()
        .position(|e| matches!(e, PipelineError::Worker(WorkerError::Panicked { .. })));

    match panicked {
        Some(index) => Some(errors.swap_remove(index)),
        None => errors.into_iter().next(),
    }
}

/// Time left until `deadline`, or `fallback` when there is no deadline
fn remaining(deadline: Option<Instant>, fallback: Duration) -> Duration {
    deadline.map_or(fallback, |d| d.saturating_duration_since(Instant::now()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BufferError;
    use std::sync::atomic::AtomicUsize;

    fn quick_config() -> RunConfig {
        RunConfig {
            delay: Duration::ZERO,
            join_timeout: Duration::from_secs(10),
            ..RunConfig::default()
        }
    }

    #[test]
    fn test_item_labels() {
        assert_eq!(item_labels(3), vec!["item-001", "item-002", "item-003"]);
        assert_eq!(item_labels(1000).last().map(String::as_str), Some("item-1000"));
        assert!(item_labels(0).is_empty());
    }

    #[test]
    fn test_round_robin_distribution() {
        let groups = distribute_round_robin((1..=7).collect(), 3);
        assert_eq!(groups, vec![vec![1, 4, 7], vec![2, 5], vec![3, 6]]);
    }

    #[test]
    fn test_round_robin_drops_empty_groups() {
        let groups = distribute_round_robin(vec!['a', 'b'], 5);
        assert_eq!(groups, vec![vec!['a'], vec!['b']]);
    }

    #[test]
    fn test_default_run_is_in_order() {
        let consumed = run_demo(&quick_config()).unwrap();
        assert_eq!(consumed, item_labels(8));
    }

    #[test]
    fn test_invalid_capacity_fails_before_spawning() {
        let config = RunConfig {
            buffer_capacity: 0,
            ..quick_config()
        };
        let err = Coordinator::new(config).err().unwrap();
        assert!(matches!(
            err,
            PipelineError::Buffer(BufferError::InvalidCapacity { capacity: 0 })
        ));
    }

    #[test]
    fn test_more_producers_than_items() {
        let config = RunConfig {
            item_count: 2,
            producer_count: 5,
            consumer_count: 3,
            ..quick_config()
        };
        let result = Coordinator::new(config).unwrap().run().unwrap();

        assert_eq!(result.producers, 2);
        assert_eq!(result.consumers, 3);
        assert_eq!(result.produced, 2);
        let mut consumed = result.consumed;
        consumed.sort();
        assert_eq!(consumed, item_labels(2));
        assert!(result.completed);
    }

    #[test]
    fn test_progress_hook_sees_every_item() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let config = RunConfig {
            item_count: 20,
            consumer_count: 2,
            ..quick_config()
        };

        let result = Coordinator::new(config)
            .unwrap()
            .with_progress(Arc::new(move |_item: &str| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .run()
            .unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 20);
        assert_eq!(result.buffer.puts, 22); // 20 items + 2 sentinels
        assert_eq!(result.buffer.gets, 22);
    }

    #[test]
    fn test_shutdown_before_run_skips_items() {
        let coordinator = Coordinator::new(quick_config()).unwrap();
        coordinator.shutdown_flag().store(true, Ordering::SeqCst);

        let result = coordinator.run().unwrap();
        assert!(!result.completed);
        assert_eq!(result.produced, 0);
        assert!(result.consumed.is_empty());
    }
    #[test]
    fn test_consumer_panics_reported_over_producer_stall() {
        let config = RunConfig {
            item_count: 8,
            buffer_capacity: 1,
            consumer_count: 2,
            join_timeout: Duration::from_secs(10),
            ..quick_config()
        };

        let started = Instant::now();
        let err = Coordinator::new(config)
            .unwrap()
            .with_progress(Arc::new(|_item: &str| {
                panic!("hook fault");
            }))
            .run()
            .unwrap_err();

        assert!(
            matches!(
                err,
                PipelineError::Worker(WorkerError::Panicked { ref message, .. }) if message == "hook fault"
            ),
            "unexpected error: {:?}",
            err
        );
        // The producer is stopped once the consumers are gone, not waited out.
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_spawned_workers_are_stopped() {
        let config = RunConfig {
            buffer_capacity: 1,
            consumer_count: 2,
            join_timeout: Duration::from_secs(10),
            ..quick_config()
        };
        let coordinator = Coordinator::new(config).unwrap();

        // No consumers yet, so the producer blocks on its second item.
        let producers = coordinator.spawn_producers(vec![item_labels(5)]).unwrap();
        let stats: Vec<_> = producers.iter().map(WorkerHandle::shared_stats).collect();
        thread::sleep(Duration::from_millis(20));

        let started = Instant::now();
        coordinator.stop_producers(producers);
        assert!(coordinator.shutdown_flag().load(Ordering::SeqCst));
        assert!(aggregate_items(&stats) < 5);

        let sink = destination();
        let mut consumers = Vec::new();
        coordinator.spawn_consumers(&sink, &mut consumers).unwrap();
        let consumer_stats: Vec<_> = consumers.iter().map(WorkerHandle::shared_stats).collect();
        coordinator.stop_consumers(consumers);

        assert_eq!(consumer_stats.len(), 2);
        assert_eq!(aggregate_items(&consumer_stats), sink.lock().len() as u64);
        assert!(coordinator.buffer.is_empty());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_primary_error_prefers_panic() {
        let stalled = PipelineError::Worker(WorkerError::Stalled {
            name: "producer-1".into(),
            timeout: Duration::from_millis(500),
        });
        let sentinel = PipelineError::SentinelTimeout { index: 1, total: 2 };
        let panicked = PipelineError::Worker(WorkerError::Panicked {
            name: "consumer-2".into(),
            message: "boom".into(),
        });

        let picked = primary_error(vec![stalled, sentinel, panicked]).unwrap();
        assert!(matches!(
            picked,
            PipelineError::Worker(WorkerError::Panicked { ref name, .. }) if name == "consumer-2"
        ));

        let first = primary_error(vec![PipelineError::SentinelTimeout { index: 1, total: 1 }]);
        assert!(matches!(first, Some(PipelineError::SentinelTimeout { .. })));
        assert!(primary_error(Vec::new()).is_none());
    }
}
