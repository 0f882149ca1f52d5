//! Error types for the probe module.
//!
//! Network-level failures are values the scan strategy absorbs (they become
//! transient misses); only persistence failures are real errors, because
//! silently losing a confirmed hit would violate the ledger's durability
//! contract.

use thiserror::Error;

use crate::ledger::LedgerError;
use crate::storage::StorageError;

/// Errors from a single network fetch.
///
/// All variants are recoverable from the scan's point of view: the prober
/// downgrades them to a transient miss and the scan pattern itself decides
/// whether the identifier is ever revisited.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, TLS, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },
}

impl FetchError {
    /// Creates a network error from a reqwest error, classifying timeouts.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }
}

/// Fatal errors from one probe.
///
/// A probe that hits this error found remote content but could not durably
/// record it; the hit is reported as failed and must reach the operator
/// rather than being downgraded to a miss.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The ledger rejected the confirmed record.
    #[error("ledger write failed: {0}")]
    Ledger(#[from] LedgerError),

    /// The asset payload could not be stored.
    #[error("asset storage failed: {0}")]
    Storage(#[from] StorageError),
}
