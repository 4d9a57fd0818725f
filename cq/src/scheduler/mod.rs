//! Scheduler for upstream API calls
//!
//! Owns the pending queue and dispatches it in bounded batches with
//! inter-batch pacing, per-request timeouts, and head-of-queue retry on
//! rate limiting.

mod config;
mod core;
mod events;
mod queue;

pub use config::SchedulerConfig;
pub use core::Scheduler;
pub use events::{DEFAULT_EVENT_CAPACITY, SchedulerEvent};
pub use queue::{FetchHandle, FetchResult, QueueState, SchedulerStats};
