//! Single-identifier probing.
//!
//! A probe is one attempt to resolve an identifier to content: the
//! already-done check, the rate-limited document fetch, extraction, the
//! asset fetch, the storage write, and the ledger write. Every
//! per-identifier failure is converted to a [`ProbeOutcome`] value at this
//! boundary; nothing about a single probe's failure propagates as a
//! program-aborting fault except a persistence failure, which would
//! silently lose a confirmed hit if downgraded.

pub mod client;
pub mod error;
pub mod extract;
pub mod rate_limiter;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::UrlTemplate;
use crate::ledger::{ContentRecord, Ledger, now_timestamp};
use crate::storage::{AssetStore, asset_filename};

pub use client::HttpClient;
pub use error::{FetchError, ProbeError};
pub use extract::{Extraction, Extractor, HtmlExtractor};
pub use rate_limiter::RateLimiter;

/// Why a probe did not produce content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    /// The document fetched but carried no asset marker: the normal outcome
    /// for an invalid identifier.
    NotFound,
    /// The document carried an asset reference that could not be used.
    MalformedResponse,
    /// Network failure, timeout, or error status. Retries are expressed as
    /// later revisits by the scan pattern, never as inline retry loops.
    Transient,
}

impl std::fmt::Display for MissReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not-found"),
            Self::MalformedResponse => write!(f, "malformed-response"),
            Self::Transient => write!(f, "transient-error"),
        }
    }
}

/// Tagged result of probing one identifier.
#[derive(Debug, Clone)]
pub enum ProbeOutcome {
    /// The identifier resolved to content, now durably recorded.
    Hit(ContentRecord),
    /// No content for this identifier.
    Miss(MissReason),
    /// Confirmed in a previous run; skipped with zero network calls.
    AlreadyKnown,
}

impl ProbeOutcome {
    /// Returns true for [`ProbeOutcome::Hit`].
    #[must_use]
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }
}

/// Probe capability, object-safe so scanners can be driven by scripted
/// outcomes in tests.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probes one identifier within a page context.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] only for persistence failures; every network
    /// or structural failure is a [`ProbeOutcome::Miss`] value.
    async fn probe(&self, page: u32, id: u64) -> Result<ProbeOutcome, ProbeError>;
}

/// Production prober: HTTP fetch, HTML extraction, filesystem storage,
/// ledger bookkeeping.
pub struct HttpProber {
    client: HttpClient,
    extractor: Arc<dyn Extractor>,
    store: Arc<dyn AssetStore>,
    ledger: Arc<Ledger>,
    rate_limiter: Arc<RateLimiter>,
    template: UrlTemplate,
    date: String,
}

impl HttpProber {
    /// Assembles a prober from its collaborators.
    #[must_use]
    pub fn new(
        client: HttpClient,
        extractor: Arc<dyn Extractor>,
        store: Arc<dyn AssetStore>,
        ledger: Arc<Ledger>,
        rate_limiter: Arc<RateLimiter>,
        template: UrlTemplate,
        date: impl Into<String>,
    ) -> Self {
        Self {
            client,
            extractor,
            store,
            ledger,
            rate_limiter,
            template,
            date: date.into(),
        }
    }

    /// Canonical document URL for an identifier in this run's context.
    #[must_use]
    pub fn url_for(&self, page: u32, id: u64) -> String {
        self.template.render(&self.date, page, id)
    }

    /// Resolves the extracted asset reference against the document URL.
    fn resolve_asset_url(document_url: &str, asset_ref: &str) -> Option<String> {
        match Url::parse(asset_ref) {
            Ok(absolute) => Some(absolute.into()),
            Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(document_url)
                .ok()?
                .join(asset_ref)
                .ok()
                .map(Url::into),
            Err(_) => None,
        }
    }
}

#[async_trait]
impl Prober for HttpProber {
    #[instrument(skip(self), fields(page, id))]
    async fn probe(&self, page: u32, id: u64) -> Result<ProbeOutcome, ProbeError> {
        let url = self.url_for(page, id);

        if self.ledger.is_known(&url).await {
            debug!(id, "identifier already confirmed, skipping");
            return Ok(ProbeOutcome::AlreadyKnown);
        }

        self.rate_limiter.acquire(&url).await;

        let document = match self.client.fetch_document(&url).await {
            Ok(body) => body,
            Err(e) => {
                debug!(id, error = %e, "document fetch failed");
                return Ok(ProbeOutcome::Miss(MissReason::Transient));
            }
        };

        let extraction = self.extractor.extract(&document);
        let Some(asset_ref) = extraction.asset_url else {
            return Ok(ProbeOutcome::Miss(MissReason::NotFound));
        };

        let Some(asset_url) = Self::resolve_asset_url(&url, &asset_ref) else {
            warn!(id, asset_ref = %asset_ref, "unusable asset reference");
            return Ok(ProbeOutcome::Miss(MissReason::MalformedResponse));
        };

        self.rate_limiter.acquire(&asset_url).await;

        let payload = match self.client.fetch_asset(&asset_url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(id, error = %e, "asset fetch failed");
                return Ok(ProbeOutcome::Miss(MissReason::Transient));
            }
        };

        let rel_path = Path::new(&self.date).join(asset_filename(page, id, &asset_url));
        let stored_at = self.store.write(&rel_path, &payload).await?;

        let record = ContentRecord {
            id,
            page,
            url,
            asset_url,
            title: extraction.title,
            body: extraction.body,
            captured_at: now_timestamp(),
            stored_at,
        };
        self.ledger.record_hit(&record).await?;

        info!(id, page, "hit confirmed");
        Ok(ProbeOutcome::Hit(record))
    }
}
