//! Producer/consumer pipeline over a bounded buffer
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐  ┌────────────┐         ┌────────────┐
//! │ producer-1 │  │ producer-2 │   ...   │ producer-N │
//! └─────┬──────┘  └─────┬──────┘         └─────┬──────┘
//!       │  put (blocks while full)             │
//!       └───────────────┼──────────────────────┘
//!                       ▼
//!          ┌──────────────────────────┐
//!          │      BoundedBuffer       │
//!          │  Mutex<VecDeque> +       │
//!          │  one broadcast Condvar   │
//!          └────────────┬─────────────┘
//!       get (blocks while empty)
//!       ┌───────────────┼──────────────────────┐
//!       ▼               ▼                      ▼
//! ┌────────────┐  ┌────────────┐         ┌────────────┐
//! │ consumer-1 │  │ consumer-2 │   ...   │ consumer-M │
//! └────────────┘  └────────────┘         └────────────┘
//! ```
//!
//! Each consumer stops on one `Message::Sentinel`; the coordinator enqueues
//! M sentinels once all producers have been joined.

pub mod buffer;
pub mod consumer;
pub mod coordinator;
pub mod message;
pub mod producer;
pub mod worker;

pub use buffer::{BoundedBuffer, BufferStats, BufferStatsSnapshot};
pub use consumer::{destination, Consumer, Destination, ItemCallback};
pub use coordinator::{
    distribute_round_robin, item_labels, run_demo, Coordinator, ProgressHook, RunResult,
};
pub use message::Message;
pub use producer::Producer;
pub use worker::{WorkerHandle, WorkerRole, WorkerStats};
