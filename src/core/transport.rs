//! Network transport used to reach addons.
//!
//! The engine only needs `GET url -> bytes`. The trait keeps the HTTP stack
//! swappable so the dispatcher can be driven by in-memory transports in
//! tests.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Result type for transport calls.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors from a single network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The call did not finish within its timeout.
    #[error("Request to {0} timed out")]
    Timeout(String),

    /// Connection, TLS or body read failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
}

impl TransportError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Network(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
        }
    }
}

/// A collaborator able to fetch a URL.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the body of `url`.
    async fn get(&self, url: &str) -> TransportResult<Vec<u8>>;
}

/// reqwest-backed transport with a per-call timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport with the given per-call timeout.
    pub fn new(timeout: Duration, user_agent: &str) -> TransportResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn map_error(url: &str, err: &reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(url.to_string())
        } else if let Some(status) = err.status() {
            TransportError::Status { url: url.to_string(), status: status.as_u16() }
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> TransportResult<Vec<u8>> {
        tracing::trace!(url, "GET");

        let response = self.client.get(url).send().await.map_err(|e| Self::map_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status { url: url.to_string(), status: status.as_u16() });
        }

        let bytes = response.bytes().await.map_err(|e| Self::map_error(url, &e))?;
        Ok(bytes.to_vec())
    }
}
