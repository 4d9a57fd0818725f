//! Data-fetch façade
//!
//! [`ApiData`] is the per-view adapter over the [`Scheduler`]: it tracks one
//! endpoint's payload, loading flag and classified error, and publishes each
//! change on a watch channel so a view can re-render.

mod collect;
mod retry;

pub use collect::{fetch_all, fetch_all_with, search, search_with};
pub use retry::{RetryPolicy, submit_with, submit_with_retry};

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;

use crate::api::{ErrorKind, FetchError};
use crate::scheduler::Scheduler;

/// Error as shown to a view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
    pub status: Option<u16>,
}

impl From<&FetchError> for ErrorInfo {
    fn from(e: &FetchError) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
            status: e.status(),
        }
    }
}

/// What a view renders
#[derive(Debug, Clone, PartialEq)]
pub struct FetchState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<ErrorInfo>,
}

impl<T> FetchState<T> {
    fn idle() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }
}

/// Tracks one endpoint's data through the scheduler
///
/// Payloads that do not deserialize into `T` surface as
/// [`ErrorKind::InvalidResponse`]. When fetches overlap, only the most
/// recently started one may update the state.
pub struct ApiData<T = Value> {
    scheduler: Scheduler,
    endpoint: String,
    state: watch::Sender<FetchState<T>>,
    generation: AtomicU64,
}

impl<T> ApiData<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Create a tracker; it starts loading unless the endpoint is empty
    pub fn new(scheduler: Scheduler, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        debug!(%endpoint, "ApiData::new: called");
        let initial = FetchState {
            loading: !endpoint.is_empty(),
            ..FetchState::idle()
        };
        let (state, _) = watch::channel(initial);
        Self {
            scheduler,
            endpoint,
            state,
            generation: AtomicU64::new(0),
        }
    }

    /// Endpoint currently tracked
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Snapshot of the current state
    pub fn state(&self) -> FetchState<T> {
        self.state.borrow().clone()
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.state.subscribe()
    }

    /// Initial fetch when a view mounts
    pub async fn load(&self) -> FetchState<T> {
        debug!(endpoint = %self.endpoint, "ApiData::load: called");
        self.refetch().await
    }

    /// Fetch the tracked endpoint again
    pub async fn refetch(&self) -> FetchState<T> {
        debug!(endpoint = %self.endpoint, "ApiData::refetch: called");
        if self.endpoint.is_empty() {
            debug!("ApiData::refetch: empty endpoint, nothing to fetch");
            self.state.send_modify(|s| s.loading = false);
            return self.state();
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });

        let result = self
            .scheduler
            .submit(self.endpoint.clone())
            .await
            .and_then(|value| serde_json::from_value::<T>(value).map_err(FetchError::from));

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "ApiData::refetch: superseded, dropping result");
            return self.state();
        }

        self.state.send_modify(|s| {
            match result {
                Ok(data) => {
                    debug!("ApiData::refetch: data received");
                    s.data = Some(data);
                }
                Err(e) => {
                    debug!(error = %e, "ApiData::refetch: fetch failed");
                    s.data = None;
                    s.error = Some(ErrorInfo::from(&e));
                }
            }
            s.loading = false;
        });
        self.state()
    }

    /// Track a different endpoint; fetches only when it changed
    pub async fn set_endpoint(&mut self, endpoint: impl Into<String>) -> FetchState<T> {
        let endpoint = endpoint.into();
        if endpoint == self.endpoint {
            debug!(%endpoint, "ApiData::set_endpoint: unchanged");
            return self.state();
        }
        debug!(from = %self.endpoint, to = %endpoint, "ApiData::set_endpoint: changed");
        self.endpoint = endpoint;
        self.refetch().await
    }

    /// Whether a retry action should be offered
    ///
    /// `online` is the connectivity hint when known; retry is hidden only
    /// when the client is known to be offline.
    pub fn can_retry(&self, online: Option<bool>) -> bool {
        self.state.borrow().error.is_some() && online != Some(false)
    }
}
