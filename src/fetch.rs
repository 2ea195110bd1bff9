//! HTTP fetch capability for the releases endpoint.
//!
//! The orchestrator only needs "URL in, bytes out" with a deadline, so
//! that seam is a trait and the production implementation stays thin.
//! Tests substitute their own fetcher or point [`HttpFetcher`] at a mock
//! server.

use crate::error::{Result, UpdateError};
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = concat!("nudge/", env!("CARGO_PKG_VERSION"));

/// Capability to retrieve a releases payload.
#[async_trait]
pub trait ReleaseFetcher: Send + Sync {
    /// Fetch the response body at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Timeout`] when the deadline elapses and
    /// [`UpdateError::Network`] for every other transport or HTTP-status
    /// failure.
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>>;
}

/// Production fetcher over `reqwest`.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher whose requests fail after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error when the TLS backend cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| UpdateError::Network(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ReleaseFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url.clone())
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(map_transport_error)?;

        let response = response
            .error_for_status()
            .map_err(|e| UpdateError::Network(e.to_string()))?;

        let bytes = response.bytes().await.map_err(map_transport_error)?;
        Ok(bytes.to_vec())
    }
}

fn map_transport_error(e: reqwest::Error) -> UpdateError {
    if e.is_timeout() {
        UpdateError::Timeout
    } else {
        UpdateError::Network(e.to_string())
    }
}
