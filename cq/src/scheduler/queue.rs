//! Queue types for the scheduler

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::FetchError;

/// Final outcome of a submitted request
pub type FetchResult = Result<Value, FetchError>;

/// A pending or in-flight call
///
/// Settling consumes the request, so an outcome can only be delivered once.
pub(crate) struct QueuedRequest {
    pub(crate) id: u64,
    pub(crate) endpoint: String,
    pub(crate) submitted_at: Instant,
    pub(crate) rate_limit_hits: u32,
    pub(crate) cancel: CancellationToken,
    resolution: oneshot::Sender<FetchResult>,
}

impl QueuedRequest {
    /// Create a request and the handle its caller will await
    pub(crate) fn new(id: u64, endpoint: String) -> (Self, FetchHandle) {
        let (tx, rx) = oneshot::channel();
        let handle = FetchHandle {
            id,
            endpoint: endpoint.clone(),
            rx,
        };
        let request = Self {
            id,
            endpoint,
            submitted_at: Instant::now(),
            rate_limit_hits: 0,
            cancel: CancellationToken::new(),
            resolution: tx,
        };
        (request, handle)
    }

    /// Swap in a fresh cancellation token for the next attempt
    pub(crate) fn rearm(&mut self) -> CancellationToken {
        self.cancel = CancellationToken::new();
        self.cancel.clone()
    }

    /// Deliver the outcome; false if the caller dropped its handle
    pub(crate) fn settle(self, result: FetchResult) -> bool {
        debug!(id = self.id, endpoint = %self.endpoint, ok = result.is_ok(), "QueuedRequest::settle: called");
        self.resolution.send(result).is_ok()
    }
}

/// Caller side of a submitted request
///
/// Resolves with the `data` field of the response envelope, or a classified
/// error. Dropping the handle does not cancel the request.
#[derive(Debug)]
pub struct FetchHandle {
    id: u64,
    endpoint: String,
    rx: oneshot::Receiver<FetchResult>,
}

impl FetchHandle {
    /// A handle that is already settled
    pub(crate) fn settled(id: u64, endpoint: String, result: FetchResult) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { id, endpoint, rx }
    }

    /// Submission sequence number
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Endpoint this handle was submitted for
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Future for FetchHandle {
    type Output = FetchResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| {
            received.unwrap_or_else(|_| Err(FetchError::Unavailable("request dropped before settlement".to_string())))
        })
    }
}

/// Statistics for the scheduler
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SchedulerStats {
    pub total_submitted: u64,
    pub total_succeeded: u64,
    pub total_failed: u64,
    pub total_timed_out: u64,
    pub total_rate_limited: u64,
    pub batches_dispatched: u64,
    pub cycles_started: u64,
    pub peak_queue_depth: usize,
    pub peak_active_cycles: usize,
}

impl SchedulerStats {
    /// Requests that reached a terminal outcome
    pub fn total_settled(&self) -> u64 {
        self.total_succeeded + self.total_failed
    }
}

/// Snapshot of the scheduler for display and tests
#[derive(Debug, Clone)]
pub struct QueueState {
    pub pending: usize,
    pub in_flight: usize,
    pub processing: bool,
    pub stats: SchedulerStats,
}
