//! Scheduler implementation

use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use futures::future::join_all;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::api::{ErrorKind, FetchError, Transport, TransportError, TransportResponse};

use super::config::SchedulerConfig;
use super::events::{DEFAULT_EVENT_CAPACITY, SchedulerEvent};
use super::queue::{FetchHandle, FetchResult, QueueState, QueuedRequest, SchedulerStats};

/// Internal state protected by mutex
///
/// The lock is never held across an await point.
struct SchedulerState {
    /// Pending requests, oldest first except for rate-limited retries
    queue: VecDeque<QueuedRequest>,

    /// True while a dispatch cycle is running
    processing: bool,

    /// Requests taken off the queue and not yet settled or requeued
    in_flight: usize,

    /// Dispatch cycle tasks currently alive
    active_cycles: usize,

    /// Statistics
    stats: SchedulerStats,
}

struct SchedulerInner {
    config: SchedulerConfig,
    transport: Arc<dyn Transport>,
    state: Mutex<SchedulerState>,
    next_id: AtomicU64,
    events: broadcast::Sender<SchedulerEvent>,
}

/// What one attempt of a request led to
enum Attempt {
    /// Outcome delivered to the caller
    Settled,

    /// 429 from upstream; goes back to the head of the queue
    RateLimited {
        request: QueuedRequest,
        retry_after: Option<Duration>,
    },
}

/// Classified response of a single transport call
#[derive(Debug)]
enum Classified {
    Done(FetchResult),
    RateLimited(Option<Duration>),
}

/// The Scheduler paces requests to the upstream API in bounded batches.
///
/// Cloning is cheap; all clones share one queue and one dispatch cycle.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    /// Create a new scheduler with the given configuration and transport
    pub fn new(config: SchedulerConfig, transport: Arc<dyn Transport>) -> Self {
        debug!(?config, "Scheduler::new: called");
        let (events, _) = broadcast::channel(DEFAULT_EVENT_CAPACITY);
        Self {
            inner: Arc::new(SchedulerInner {
                config,
                transport,
                state: Mutex::new(SchedulerState {
                    queue: VecDeque::new(),
                    processing: false,
                    in_flight: 0,
                    active_cycles: 0,
                    stats: SchedulerStats::default(),
                }),
                next_id: AtomicU64::new(1),
                events,
            }),
        }
    }

    /// Get the scheduler configuration
    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Queue a request for an endpoint
    ///
    /// Never fails synchronously: every failure, including the absence of a
    /// Tokio runtime, is delivered through the returned handle.
    pub fn submit(&self, endpoint: impl Into<String>) -> FetchHandle {
        let endpoint = endpoint.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        debug!(id, %endpoint, "Scheduler::submit: called");

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!(id, %endpoint, "Scheduler::submit: no runtime available");
                return FetchHandle::settled(id, endpoint, Err(FetchError::Unavailable(e.to_string())));
            }
        };

        let (request, handle) = QueuedRequest::new(id, endpoint.clone());
        let (depth, start_cycle) = {
            let mut state = self.inner.lock();
            state.queue.push_back(request);
            state.stats.total_submitted += 1;
            state.stats.peak_queue_depth = state.stats.peak_queue_depth.max(state.queue.len());

            let start_cycle = !state.processing;
            if start_cycle {
                state.processing = true;
                state.active_cycles += 1;
                state.stats.cycles_started += 1;
                state.stats.peak_active_cycles = state.stats.peak_active_cycles.max(state.active_cycles);
            }
            (state.queue.len(), start_cycle)
        };

        self.inner.emit(SchedulerEvent::Queued { id, endpoint, depth });

        if start_cycle {
            debug!(id, "Scheduler::submit: no active cycle, starting one");
            runtime.spawn(Arc::clone(&self.inner).run());
        }

        handle
    }

    /// Check whether a dispatch cycle is active
    pub fn is_processing(&self) -> bool {
        self.inner.lock().processing
    }

    /// Get current queue state
    pub fn queue_state(&self) -> QueueState {
        debug!("Scheduler::queue_state: called");
        let state = self.inner.lock();
        QueueState {
            pending: state.queue.len(),
            in_flight: state.in_flight,
            processing: state.processing,
            stats: state.stats.clone(),
        }
    }

    /// Get the scheduler statistics
    pub fn stats(&self) -> SchedulerStats {
        self.inner.lock().stats.clone()
    }

    /// Subscribe to scheduler events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.inner.events.subscribe()
    }
}

impl SchedulerInner {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SchedulerEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Dispatch cycle: drain the queue one batch at a time
    async fn run(self: Arc<Self>) {
        debug!("SchedulerInner::run: cycle started");
        loop {
            let batch: Vec<QueuedRequest> = {
                let mut state = self.lock();
                if state.queue.is_empty() {
                    state.processing = false;
                    state.active_cycles -= 1;
                    drop(state);
                    debug!("SchedulerInner::run: queue drained, cycle stopped");
                    self.emit(SchedulerEvent::Idle);
                    return;
                }

                let take = self.config.batch_size.max(1).min(state.queue.len());
                let batch: Vec<_> = state.queue.drain(..take).collect();
                state.in_flight += batch.len();
                state.stats.batches_dispatched += 1;
                batch
            };

            let ids: Vec<u64> = batch.iter().map(|r| r.id).collect();
            debug!(?ids, "SchedulerInner::run: dispatching batch");
            self.emit(SchedulerEvent::Dispatched { ids });

            let attempts = join_all(batch.into_iter().map(|request| self.attempt(request))).await;

            let mut requeue = Vec::new();
            let mut longest_retry_after: Option<Duration> = None;
            for attempt in attempts {
                if let Attempt::RateLimited { request, retry_after } = attempt {
                    longest_retry_after = longest_retry_after.max(retry_after);
                    requeue.push(request);
                }
            }

            let delay = next_delay(&self.config, !requeue.is_empty(), longest_retry_after);

            if !requeue.is_empty() {
                let mut state = self.lock();
                // Reverse so the batch's original order survives at the head
                for request in requeue.into_iter().rev() {
                    state.queue.push_front(request);
                }
            }

            debug!(?delay, "SchedulerInner::run: batch drained, pausing");
            self.emit(SchedulerEvent::Paused { delay });
            tokio::time::sleep(delay).await;
        }
    }

    /// Run one request with its own timeout and cancellation token
    async fn attempt(&self, mut request: QueuedRequest) -> Attempt {
        debug!(id = request.id, endpoint = %request.endpoint, "SchedulerInner::attempt: called");
        let cancel = request.rearm();
        let timeout = self.config.timeout();

        // A panicking transport settles its own request and leaves the cycle running
        let mut call = AssertUnwindSafe(self.transport.get(&request.endpoint, cancel.clone())).catch_unwind();
        let finished = tokio::select! {
            biased;
            result = &mut call => Some(result),
            _ = tokio::time::sleep(timeout) => None,
        };

        let classified = match finished {
            Some(Ok(result)) => classify(&request.endpoint, result, timeout),
            Some(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                error!(id = request.id, endpoint = %request.endpoint, %message, "Transport panicked");
                Classified::Done(Err(FetchError::Unavailable(format!("transport panicked: {}", message))))
            }
            None => {
                debug!(id = request.id, ?timeout, "SchedulerInner::attempt: timeout, cancelling");
                cancel.cancel();
                // One last poll lets the transport observe the abort before it is dropped
                let _ = (&mut call).now_or_never();
                classify(&request.endpoint, Err(TransportError::Aborted), timeout)
            }
        };
        drop(call);

        match classified {
            Classified::RateLimited(retry_after) => {
                request.rate_limit_hits += 1;
                let attempts = request.rate_limit_hits;
                {
                    let mut state = self.lock();
                    state.in_flight -= 1;
                    state.stats.total_rate_limited += 1;
                }

                if let Some(max) = self.config.max_rate_limit_retries
                    && attempts > max
                {
                    warn!(id = request.id, endpoint = %request.endpoint, attempts, "Rate limit retries exhausted");
                    self.finish(request, Err(FetchError::RateLimited { attempts }));
                    return Attempt::Settled;
                }

                warn!(id = request.id, endpoint = %request.endpoint, attempts, "Rate limit hit, re-queueing");
                self.emit(SchedulerEvent::RateLimited { id: request.id, attempts });
                Attempt::RateLimited { request, retry_after }
            }
            Classified::Done(result) => {
                self.lock().in_flight -= 1;
                if let Err(e) = &result {
                    warn!(id = request.id, endpoint = %request.endpoint, error = %e, "Fetch error");
                }
                self.finish(request, result);
                Attempt::Settled
            }
        }
    }

    /// Record stats and deliver the outcome
    fn finish(&self, request: QueuedRequest, result: FetchResult) {
        let id = request.id;
        let error = result.as_ref().err().map(FetchError::kind);
        debug!(
            id,
            wait_ms = request.submitted_at.elapsed().as_millis() as u64,
            attempts = request.rate_limit_hits + 1,
            "SchedulerInner::finish: settling"
        );
        {
            let mut state = self.lock();
            match error {
                None => state.stats.total_succeeded += 1,
                Some(kind) => {
                    state.stats.total_failed += 1;
                    if kind == ErrorKind::Timeout {
                        state.stats.total_timed_out += 1;
                    }
                }
            }
        }

        if !request.settle(result) {
            debug!(id, "SchedulerInner::finish: caller dropped its handle");
        }
        self.emit(SchedulerEvent::Settled { id, error });
    }
}

/// Delay before the next dispatch cycle
fn next_delay(config: &SchedulerConfig, rate_limited: bool, retry_after: Option<Duration>) -> Duration {
    if !rate_limited {
        return config.request_delay();
    }
    let backoff = config.rate_limit_delay();
    match retry_after {
        Some(server) if config.honor_retry_after && server > backoff => {
            info!(?server, "Honoring server Retry-After");
            server
        }
        _ => backoff,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Map a transport result onto the error taxonomy
fn classify(endpoint: &str, result: Result<TransportResponse, TransportError>, timeout: Duration) -> Classified {
    let response = match result {
        Ok(response) => response,
        Err(TransportError::Aborted) => return Classified::Done(Err(FetchError::Timeout(timeout))),
        Err(TransportError::Network(message)) => return Classified::Done(Err(FetchError::Network(message))),
    };

    if response.is_rate_limited() {
        return Classified::RateLimited(response.retry_after);
    }

    if !response.is_success() {
        return Classified::Done(Err(FetchError::Http {
            status: response.status,
            reason: response.reason,
            endpoint: endpoint.to_string(),
        }));
    }

    let envelope = match serde_json::from_slice::<Value>(&response.body) {
        Ok(value) => value,
        Err(e) => return Classified::Done(Err(e.into())),
    };

    let data = match envelope {
        Value::Object(mut fields) => fields.remove("data").unwrap_or(Value::Null),
        _ => Value::Null,
    };
    Classified::Done(Ok(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::mock::{MockTransport, Reply, Step};
    use serde_json::json;
    use tokio::time::Instant;

    fn scheduler(transport: &Arc<MockTransport>) -> Scheduler {
        Scheduler::new(SchedulerConfig::default(), transport.clone())
    }

    fn response(status: u16, body: &str) -> TransportResponse {
        TransportResponse {
            status,
            reason: reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("")
                .to_string(),
            retry_after: None,
            body: body.as_bytes().to_vec(),
        }
    }

    fn ms(d: Duration) -> u128 {
        d.as_millis()
    }

    #[test]
    fn test_classify_success_extracts_data() {
        let timeout = Duration::from_secs(15);
        match classify("/anime/1", Ok(response(200, r#"{"data":{"mal_id":1}}"#)), timeout) {
            Classified::Done(Ok(data)) => assert_eq!(data, json!({"mal_id": 1})),
            other => panic!("unexpected {:?}", other),
        }
        match classify("/anime/1", Ok(response(200, r#"{"pagination":{}}"#)), timeout) {
            Classified::Done(Ok(data)) => assert_eq!(data, Value::Null),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classify_errors() {
        let timeout = Duration::from_secs(15);

        match classify("/x", Err(TransportError::Aborted), timeout) {
            Classified::Done(Err(e)) => assert_eq!(e, FetchError::Timeout(timeout)),
            other => panic!("unexpected {:?}", other),
        }
        match classify("/x", Err(TransportError::Network("refused".into())), timeout) {
            Classified::Done(Err(e)) => assert_eq!(e.kind(), ErrorKind::Network),
            other => panic!("unexpected {:?}", other),
        }
        match classify("/x", Ok(response(503, "")), timeout) {
            Classified::Done(Err(e)) => {
                assert_eq!(e.kind(), ErrorKind::Http);
                assert_eq!(e.status(), Some(503));
                assert_eq!(e.to_string(), "HTTP 503 (Service Unavailable) for /x");
            }
            other => panic!("unexpected {:?}", other),
        }
        match classify("/x", Ok(response(200, "<html>")), timeout) {
            Classified::Done(Err(e)) => assert_eq!(e.kind(), ErrorKind::InvalidResponse),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            classify("/x", Ok(response(429, "")), timeout),
            Classified::RateLimited(None)
        ));
    }

    #[test]
    fn test_next_delay() {
        let config = SchedulerConfig::default();
        assert_eq!(next_delay(&config, false, None), Duration::from_millis(700));
        assert_eq!(next_delay(&config, true, None), Duration::from_secs(5));
        // Retry-After ignored unless enabled
        assert_eq!(next_delay(&config, true, Some(Duration::from_secs(30))), Duration::from_secs(5));

        let honoring = SchedulerConfig {
            honor_retry_after: true,
            ..Default::default()
        };
        assert_eq!(
            next_delay(&honoring, true, Some(Duration::from_secs(30))),
            Duration::from_secs(30)
        );
        assert_eq!(next_delay(&honoring, true, Some(Duration::from_secs(1))), Duration::from_secs(5));
    }

    #[test]
    fn test_submit_outside_runtime_settles_unavailable() {
        let transport = Arc::new(MockTransport::new());
        let scheduler = scheduler(&transport);

        let handle = scheduler.submit("/anime/1");
        let result = futures::executor::block_on(handle);
        assert!(matches!(result, Err(FetchError::Unavailable(_))));
        assert!(!scheduler.is_processing());
        assert!(transport.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifo_across_batches() {
        let transport = Arc::new(MockTransport::new());
        let scheduler = scheduler(&transport);

        let endpoints: Vec<String> = (1..=7).map(|i| format!("/anime/{}", i)).collect();
        let handles: Vec<_> = endpoints.iter().map(|e| scheduler.submit(e.clone())).collect();

        for (handle, endpoint) in handles.into_iter().zip(&endpoints) {
            assert_eq!(handle.await.unwrap(), json!(endpoint));
        }

        assert_eq!(transport.call_order(), endpoints);
        assert_eq!(scheduler.stats().batches_dispatched, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_size_caps_concurrency() {
        let transport = Arc::new(MockTransport::new());
        let scheduler = scheduler(&transport);

        let handles: Vec<_> = (0..10).map(|i| scheduler.submit(format!("/anime/{}", i))).collect();
        for result in join_all(handles).await {
            assert!(result.is_ok());
        }

        assert_eq!(transport.peak_in_flight(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inter_batch_delay() {
        let transport = Arc::new(MockTransport::new());
        let scheduler = scheduler(&transport);

        let handles: Vec<_> = (0..4).map(|i| scheduler.submit(format!("/anime/{}", i))).collect();
        join_all(handles).await;

        let calls = transport.calls();
        let gap = calls[3].at - calls[0].at;
        // 10ms mock latency + 700ms pacing
        assert!(ms(gap) >= 710, "gap was {:?}", gap);
        assert!(ms(gap) < 720, "gap was {:?}", gap);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_request_retried_first() {
        let transport = Arc::new(MockTransport::new());
        transport.script("/a", vec![Step::status(10, 429), Step::ok(10, json!("a"))]);
        let scheduler = scheduler(&transport);

        let a = scheduler.submit("/a");
        let b = scheduler.submit("/b");
        let c = scheduler.submit("/c");
        let d = scheduler.submit("/d");
        let e = scheduler.submit("/e");

        assert_eq!(b.await.unwrap(), json!("/b"));
        assert_eq!(c.await.unwrap(), json!("/c"));
        assert_eq!(a.await.unwrap(), json!("a"));
        d.await.unwrap();
        e.await.unwrap();

        assert_eq!(transport.call_order(), vec!["/a", "/b", "/c", "/a", "/d", "/e"]);
        assert_eq!(scheduler.stats().total_rate_limited, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_escalates_backoff() {
        let transport = Arc::new(MockTransport::new());
        transport.script("/a", vec![Step::status(10, 429)]);
        let scheduler = scheduler(&transport);

        let handles: Vec<_> = ["/a", "/b", "/c"].iter().map(|e| scheduler.submit(*e)).collect();
        join_all(handles).await;

        let calls = transport.calls();
        assert_eq!(calls.len(), 4);
        let gap = calls[3].at - calls[0].at;
        // Siblings succeeded, but one 429 forces the long backoff
        assert!(ms(gap) >= 5_010, "gap was {:?}", gap);
        assert!(ms(gap) < 5_100, "gap was {:?}", gap);
    }

    #[tokio::test(start_paused = true)]
    async fn test_multiple_rate_limited_keep_relative_order() {
        let transport = Arc::new(MockTransport::new());
        // /b answers before /a, but /a must still be retried first
        transport.script("/a", vec![Step::status(30, 429)]);
        transport.script("/b", vec![Step::status(10, 429)]);
        let scheduler = scheduler(&transport);

        let handles: Vec<_> = ["/a", "/b", "/c", "/d"].iter().map(|e| scheduler.submit(*e)).collect();
        join_all(handles).await;

        assert_eq!(transport.call_order(), vec!["/a", "/b", "/c", "/a", "/b", "/d"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_retry_cap() {
        let transport = Arc::new(MockTransport::new());
        transport.script("/a", vec![Step::status(10, 429), Step::status(10, 429)]);
        let scheduler = Scheduler::new(
            SchedulerConfig {
                max_rate_limit_retries: Some(1),
                ..Default::default()
            },
            transport.clone(),
        );

        let result = scheduler.submit("/a").await;
        assert_eq!(result, Err(FetchError::RateLimited { attempts: 2 }));
        assert_eq!(transport.call_order(), vec!["/a", "/a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_isolated_from_siblings() {
        let transport = Arc::new(MockTransport::new());
        transport.script("/1", vec![Step::ok(20, json!(1))]);
        transport.script("/2", vec![Step::hang()]);
        transport.script("/3", vec![Step::ok(40, json!(3))]);
        let scheduler = scheduler(&transport);

        let start = Instant::now();
        let h1 = scheduler.submit("/1");
        let h2 = scheduler.submit("/2");
        let h3 = scheduler.submit("/3");

        let t1 = tokio::spawn(async move { (h1.await, Instant::now()) });
        let t2 = tokio::spawn(async move { (h2.await, Instant::now()) });
        let t3 = tokio::spawn(async move { (h3.await, Instant::now()) });

        let (r1, at1) = t1.await.unwrap();
        let (r3, at3) = t3.await.unwrap();
        let (r2, at2) = t2.await.unwrap();

        assert_eq!(r1.unwrap(), json!(1));
        assert_eq!(r3.unwrap(), json!(3));
        assert!(ms(at1 - start) < 100);
        assert!(ms(at3 - start) < 100);

        assert_eq!(r2, Err(FetchError::Timeout(Duration::from_secs(15))));
        assert!(ms(at2 - start) >= 15_000);
        assert_eq!(transport.aborted(), vec!["/2".to_string()]);
        assert_eq!(scheduler.stats().total_timed_out, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_abort_batch() {
        let transport = Arc::new(MockTransport::new());
        transport.script("/down", vec![Step::status(5, 503)]);
        transport.script("/offline", vec![Step::network(5)]);
        transport.script(
            "/html",
            vec![Step {
                delay: Duration::from_millis(5),
                reply: Reply::Raw(200, "<html></html>"),
            }],
        );
        let scheduler = scheduler(&transport);

        let down = scheduler.submit("/down");
        let offline = scheduler.submit("/offline");
        let html = scheduler.submit("/html");
        let fine = scheduler.submit("/fine");

        assert_eq!(down.await.unwrap_err().status(), Some(503));
        assert_eq!(offline.await.unwrap_err().kind(), ErrorKind::Network);
        assert_eq!(html.await.unwrap_err().kind(), ErrorKind::InvalidResponse);
        assert_eq!(fine.await.unwrap(), json!("/fine"));

        let stats = scheduler.stats();
        assert_eq!(stats.total_failed, 3);
        assert_eq!(stats.total_succeeded, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_panic_settles_and_cycle_continues() {
        let transport = Arc::new(MockTransport::new());
        transport.script("/boom", vec![Step::panic(5)]);
        let scheduler = scheduler(&transport);

        let boom = scheduler.submit("/boom");
        let a = scheduler.submit("/a");
        let b = scheduler.submit("/b");
        let c = scheduler.submit("/c");

        match boom.await {
            Err(FetchError::Unavailable(message)) => assert!(message.contains("transport panicked")),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(a.await.unwrap(), json!("/a"));
        assert_eq!(b.await.unwrap(), json!("/b"));
        assert_eq!(c.await.unwrap(), json!("/c"));

        tokio::time::sleep(Duration::from_secs(1)).await;
        let state = scheduler.queue_state();
        assert!(!state.processing);
        assert_eq!(state.in_flight, 0);
        assert_eq!(state.stats.total_failed, 1);

        assert_eq!(scheduler.submit("/later").await.unwrap(), json!("/later"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_request_settles_once() {
        let transport = Arc::new(MockTransport::new());
        for i in 0..20 {
            let step = match i % 4 {
                0 => Step::ok(5, json!(i)),
                1 => Step::status(5, 404),
                2 => Step::network(5),
                _ => Step::status(5, 429),
            };
            transport.script(&format!("/r/{}", i), vec![step]);
        }
        let scheduler = scheduler(&transport);

        let handles: Vec<_> = (0..20).map(|i| scheduler.submit(format!("/r/{}", i))).collect();
        let results = join_all(handles).await;
        assert_eq!(results.len(), 20);

        let stats = scheduler.stats();
        assert_eq!(stats.total_submitted, 20);
        assert_eq!(stats.total_settled(), 20);
        // 429s were retried and then succeeded with the default reply
        assert_eq!(stats.total_rate_limited, 5);
        assert_eq!(stats.total_succeeded, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_cycle_under_burst() {
        let transport = Arc::new(MockTransport::new());
        let scheduler = scheduler(&transport);

        let mut handles = Vec::new();
        for i in 0..5 {
            handles.push(scheduler.submit(format!("/first/{}", i)));
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(scheduler.is_processing());
        for i in 0..5 {
            handles.push(scheduler.submit(format!("/second/{}", i)));
        }
        join_all(handles).await;

        let stats = scheduler.stats();
        assert_eq!(stats.cycles_started, 1);
        assert_eq!(stats.peak_active_cycles, 1);
        assert_eq!(transport.peak_in_flight(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restarts_after_drain() {
        let transport = Arc::new(MockTransport::new());
        let scheduler = scheduler(&transport);

        scheduler.submit("/one").await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let state = scheduler.queue_state();
        assert!(!state.processing);
        assert_eq!(state.pending, 0);
        assert_eq!(state.in_flight, 0);

        assert_eq!(scheduler.submit("/two").await.unwrap(), json!("/two"));
        assert_eq!(scheduler.stats().cycles_started, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_follow_lifecycle() {
        let transport = Arc::new(MockTransport::new());
        let scheduler = scheduler(&transport);
        let mut events = scheduler.subscribe();

        scheduler.submit("/one").await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }

        assert_eq!(
            seen,
            vec![
                SchedulerEvent::Queued {
                    id: 1,
                    endpoint: "/one".to_string(),
                    depth: 1
                },
                SchedulerEvent::Dispatched { ids: vec![1] },
                SchedulerEvent::Settled { id: 1, error: None },
                SchedulerEvent::Paused {
                    delay: Duration::from_millis(700)
                },
                SchedulerEvent::Idle,
            ]
        );
    }
}
