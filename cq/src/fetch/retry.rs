//! Caller-level retry with exponential backoff
//!
//! Lives outside the scheduler: the scheduler only retries rate limiting,
//! everything else is up to the caller.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::scheduler::{FetchResult, Scheduler};

/// Retry policy for transient failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff before the second attempt; doubles afterwards
    #[serde(rename = "initial-backoff-ms", default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    1_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// Backoff before the given retry (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry.saturating_sub(1));
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor))
    }
}

/// Submit an endpoint, resubmitting on retryable errors
pub async fn submit_with_retry(scheduler: &Scheduler, endpoint: &str, policy: &RetryPolicy) -> FetchResult {
    debug!(%endpoint, ?policy, "submit_with_retry: called");
    let attempts = policy.max_attempts.max(1);

    let mut attempt = 1;
    loop {
        match scheduler.submit(endpoint).await {
            Ok(data) => return Ok(data),
            Err(e) if e.is_retryable() && attempt < attempts => {
                let backoff = policy.backoff(attempt);
                warn!(%endpoint, attempt, backoff_ms = backoff.as_millis() as u64, error = %e, "retrying after transient error");
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => {
                debug!(%endpoint, attempt, error = %e, "submit_with_retry: giving up");
                return Err(e);
            }
        }
    }
}

/// Submit an endpoint, through the retry wrapper when a policy is given
pub async fn submit_with(scheduler: &Scheduler, endpoint: &str, retry: Option<&RetryPolicy>) -> FetchResult {
    match retry {
        Some(policy) => submit_with_retry(scheduler, endpoint, policy).await,
        None => scheduler.submit(endpoint).await,
    }
}
