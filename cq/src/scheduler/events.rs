//! Scheduler events
//!
//! Emitted on a broadcast channel; with no subscribers they are dropped.

use std::time::Duration;

use crate::api::ErrorKind;

/// Default broadcast capacity
pub const DEFAULT_EVENT_CAPACITY: usize = 1_024;

/// Something the dispatch cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// Request appended to the queue
    Queued { id: u64, endpoint: String, depth: usize },

    /// A batch left the queue
    Dispatched { ids: Vec<u64> },

    /// Request got a 429 and went back to the head of the queue
    RateLimited { id: u64, attempts: u32 },

    /// Request reached its outcome
    Settled { id: u64, error: Option<ErrorKind> },

    /// Batch drained; the next cycle waits this long
    Paused { delay: Duration },

    /// Queue drained and the cycle stopped
    Idle,
}
