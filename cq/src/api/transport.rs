//! Transport trait definition

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Raw response from the upstream API
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub reason: String,
    pub retry_after: Option<Duration>,
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Check for a 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check for a 429 status
    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }
}

/// Failures below the HTTP layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Network(String),

    #[error("request aborted")]
    Aborted,
}

/// Issues GET requests for endpoints relative to a fixed base URL
///
/// Implementations must watch `cancel` and return [`TransportError::Aborted`]
/// once it fires. The scheduler owns timeouts; transports should not add
/// their own.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, endpoint: &str, cancel: CancellationToken) -> Result<TransportResponse, TransportError>;
}
