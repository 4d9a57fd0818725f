//! Scheduler configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Max requests dispatched together in one cycle
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between batches in milliseconds
    #[serde(rename = "request-delay-ms", default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Pause after a batch that hit the rate limit, in milliseconds
    #[serde(rename = "rate-limit-delay-ms", default = "default_rate_limit_delay_ms")]
    pub rate_limit_delay_ms: u64,

    /// Per-request timeout in milliseconds
    #[serde(rename = "timeout-ms", default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Give up on a request after this many 429 responses (None = never)
    #[serde(rename = "max-rate-limit-retries", default)]
    pub max_rate_limit_retries: Option<u32>,

    /// Stretch the backoff to a longer Retry-After from the server
    #[serde(rename = "honor-retry-after", default)]
    pub honor_retry_after: bool,
}

fn default_batch_size() -> usize {
    3
}

fn default_request_delay_ms() -> u64 {
    700
}

fn default_rate_limit_delay_ms() -> u64 {
    5_000
}

fn default_timeout_ms() -> u64 {
    15_000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            request_delay_ms: 700,
            rate_limit_delay_ms: 5_000,
            timeout_ms: 15_000,
            max_rate_limit_retries: None,
            honor_retry_after: false,
        }
    }
}

impl SchedulerConfig {
    /// Get the inter-batch delay as a Duration
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// Get the rate limit backoff as a Duration
    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }

    /// Get the per-request timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
