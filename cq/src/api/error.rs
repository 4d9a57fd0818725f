//! Classified fetch errors

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors a submitted request can settle with
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Request timeout. Please try again")]
    Timeout(Duration),

    #[error("Network error. Please check your connection")]
    Network(String),

    #[error("HTTP {status} ({reason}) for {endpoint}")]
    Http { status: u16, reason: String, endpoint: String },

    #[error("Still rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Scheduler unavailable: {0}")]
    Unavailable(String),
}

/// The kind of a [`FetchError`], without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Timeout,
    Network,
    Http,
    RateLimited,
    InvalidResponse,
    Unavailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::Network => "network",
            ErrorKind::Http => "http",
            ErrorKind::RateLimited => "rate-limited",
            ErrorKind::InvalidResponse => "invalid-response",
            ErrorKind::Unavailable => "unavailable",
        };
        f.write_str(s)
    }
}

impl FetchError {
    /// Get the kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Timeout(_) => ErrorKind::Timeout,
            FetchError::Network(_) => ErrorKind::Network,
            FetchError::Http { .. } => ErrorKind::Http,
            FetchError::RateLimited { .. } => ErrorKind::RateLimited,
            FetchError::InvalidResponse(_) => ErrorKind::InvalidResponse,
            FetchError::Unavailable(_) => ErrorKind::Unavailable,
        }
    }

    /// Check if a caller-level retry makes sense for this error
    ///
    /// The scheduler itself never retries these; only rate limiting is
    /// retried internally.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout(_) => true,
            FetchError::Network(_) => true,
            FetchError::Http { status, .. } => *status >= 500,
            FetchError::RateLimited { .. } => false,
            FetchError::InvalidResponse(_) => false,
            FetchError::Unavailable(_) => false,
        }
    }

    /// Get the HTTP status if this is an HTTP error
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::InvalidResponse(e.to_string())
    }
}
