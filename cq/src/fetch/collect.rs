//! Multi-request helpers built on submit

use futures::future::join_all;
use serde_json::Value;
use tracing::debug;

use super::retry::{RetryPolicy, submit_with};
use crate::api::{FetchError, endpoints};
use crate::scheduler::Scheduler;

/// Fetch several endpoints, keeping whatever succeeded
///
/// Waits for every request to settle. Results keep submission order; failed
/// and null payloads are dropped. Fails only when nothing came back.
pub async fn fetch_all<I, S>(scheduler: &Scheduler, endpoints: I) -> Result<Vec<Value>, FetchError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    fetch_all_with(scheduler, endpoints, None, "results").await
}

/// [`fetch_all`] with an optional retry policy per endpoint
///
/// `what` names the items in the error raised when none load.
pub async fn fetch_all_with<I, S>(
    scheduler: &Scheduler,
    endpoints: I,
    retry: Option<&RetryPolicy>,
    what: &str,
) -> Result<Vec<Value>, FetchError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let endpoints: Vec<String> = endpoints.into_iter().map(Into::into).collect();
    debug!(count = endpoints.len(), retry = retry.is_some(), %what, "fetch_all_with: called");

    let results = join_all(endpoints.iter().map(|e| submit_with(scheduler, e, retry))).await;
    let total = results.len();
    let found: Vec<Value> = results
        .into_iter()
        .filter_map(|r| r.ok())
        .filter(|v| !v.is_null())
        .collect();

    debug!(total, found = found.len(), "fetch_all_with: settled");
    if found.is_empty() {
        return Err(FetchError::InvalidResponse(format!("No {} could be loaded", what)));
    }
    Ok(found)
}

/// Search titles by name
///
/// An empty query returns no results without touching the network.
pub async fn search(scheduler: &Scheduler, query: &str, limit: u32) -> Result<Vec<Value>, FetchError> {
    search_with(scheduler, query, limit, None).await
}

/// [`search`] with an optional retry policy
pub async fn search_with(
    scheduler: &Scheduler,
    query: &str,
    limit: u32,
    retry: Option<&RetryPolicy>,
) -> Result<Vec<Value>, FetchError> {
    let Some(endpoint) = endpoints::search(query, limit) else {
        debug!("search_with: empty query");
        return Ok(Vec::new());
    };

    match submit_with(scheduler, &endpoint, retry).await? {
        Value::Array(items) => Ok(items),
        _ => Err(FetchError::InvalidResponse("Invalid search response format".to_string())),
    }
}
