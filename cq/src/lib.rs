//! catalogqueue - rate-limit-aware client for a catalog REST API
//!
//! Every call to the upstream API goes through one [`Scheduler`], which
//! dispatches queued requests in small parallel batches, paces the batches,
//! puts rate-limited requests back at the head of the queue, and bounds each
//! request with its own timeout. Views consume it through [`ApiData`].
//!
//! # Modules
//!
//! - [`api`] - endpoints, transport seam, error taxonomy
//! - [`scheduler`] - the request queue and dispatch cycle
//! - [`fetch`] - per-view façade and caller-level policies
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod api;
pub mod cli;
pub mod config;
pub mod fetch;
pub mod scheduler;

// Re-export commonly used types
pub use api::{ErrorKind, FetchError, HttpTransport, Transport, TransportError, TransportResponse};
pub use config::{ApiConfig, Config};
pub use fetch::{
    ApiData, ErrorInfo, FetchState, RetryPolicy, fetch_all, fetch_all_with, search, search_with, submit_with,
    submit_with_retry,
};
pub use scheduler::{FetchHandle, FetchResult, QueueState, Scheduler, SchedulerConfig, SchedulerEvent, SchedulerStats};
