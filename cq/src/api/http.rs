//! reqwest-backed transport for the catalog API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, RETRY_AFTER};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::transport::{Transport, TransportError, TransportResponse};
use crate::config::ApiConfig;

/// HTTP transport issuing `GET {base_url}{endpoint}`
pub struct HttpTransport {
    base_url: String,
    http: Client,
}

impl HttpTransport {
    /// Create a new transport from API configuration
    pub fn from_config(config: &ApiConfig) -> Result<Self, reqwest::Error> {
        debug!(?config, "HttpTransport::from_config: called");
        let http = Client::builder().user_agent(config.user_agent.clone()).build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Full URL for an endpoint
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn send(&self, url: &str) -> Result<TransportResponse, TransportError> {
        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                debug!(%url, error = %e, "HttpTransport::send: request failed");
                TransportError::Network(e.to_string())
            })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        debug!(%url, status = %status, body_len = body.len(), "HttpTransport::send: response received");
        Ok(TransportResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
            retry_after,
            body: body.to_vec(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, endpoint: &str, cancel: CancellationToken) -> Result<TransportResponse, TransportError> {
        let url = self.url(endpoint);
        debug!(%url, "HttpTransport::get: called");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(%url, "HttpTransport::get: cancelled");
                Err(TransportError::Aborted)
            }
            result = self.send(&url) => result,
        }
    }
}
