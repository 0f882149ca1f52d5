//! HTTP client wrapper for probe fetches.
//!
//! One client is created per run and reused for every probe, taking
//! advantage of connection pooling. Documents are fetched as text; asset
//! payloads are streamed chunk-by-chunk into memory before being handed to
//! storage, so a connection dropped mid-body surfaces as a fetch error
//! rather than a truncated file.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use tracing::{debug, instrument};

use super::error::FetchError;

/// Connect timeout for probe requests, in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Read timeout for probe requests, in seconds. Documents and page-scan
/// assets are small; anything slower than this is treated as a miss.
const READ_TIMEOUT_SECS: u64 = 30;

/// Browser User-Agent sent with every probe.
///
/// The origin serves the same markup to browsers and tools, but responds to
/// an empty User-Agent with interstitial pages that carry no asset marker.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// HTTP client for probe and asset fetches.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with default timeouts.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a new HTTP client with explicit timeout values.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// timeout configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new_with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Fetches a document and returns its body text.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on network failure, timeout, or a non-2xx
    /// status. The caller decides whether that is a miss or a fault.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch_document(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(url, status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))
    }

    /// Fetches an asset payload as raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on network failure, timeout, a non-2xx status,
    /// or a stream interrupted mid-body.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch_asset(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(url, status.as_u16()));
        }

        let mut stream = response.bytes_stream();
        let mut payload = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::from_reqwest(url, e))?;
            payload.extend_from_slice(&chunk);
        }

        debug!(bytes = payload.len(), "asset fetched");
        Ok(payload)
    }
}
