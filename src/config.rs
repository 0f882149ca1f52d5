//! Run configuration: URL template, page inputs, and scan policies.
//!
//! The identifier-to-URL mapping is an injected template rather than a
//! constant, so the discovery engine stays reusable across sites. A template
//! contains `{date}`, `{page}`, and `{id}` placeholders and must at minimum
//! reference `{id}`.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

/// Default minimum spacing between outbound probes, in milliseconds.
pub const DEFAULT_PROBE_SPACING_MS: u64 = 500;

/// Default initial coarse-walk step size.
pub const DEFAULT_INITIAL_STEP: u64 = 99;

/// Default consecutive-miss threshold for cluster expansion.
pub const DEFAULT_MISS_THRESHOLD: u32 = 10;

/// Default ceiling on consecutive transient errors before a page scan aborts.
pub const DEFAULT_FAILURE_CEILING: u32 = 10;

/// Pattern matching a trailing run of digits at the end of a seed URL.
#[allow(clippy::expect_used)]
static TRAILING_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d+)/?$").expect("trailing-id regex is valid"));

/// Errors raised while building or validating a run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The URL template is missing the mandatory `{id}` placeholder.
    #[error("URL template must contain an {{id}} placeholder: {template}")]
    MissingIdPlaceholder {
        /// The offending template string.
        template: String,
    },

    /// The identifier range is inverted.
    #[error("invalid identifier range: start {start} exceeds end {end}")]
    InvalidRange {
        /// Lower bound supplied.
        start: u64,
        /// Upper bound supplied.
        end: u64,
    },

    /// A seed URL carries no trailing integer identifier.
    #[error("seed URL for page {page} has no trailing identifier: {url}")]
    UnparseableSeed {
        /// Page number the seed was declared for.
        page: u32,
        /// The seed URL as supplied.
        url: String,
    },
}

/// Template mapping a (date, page, identifier) context to a document URL.
///
/// Placeholders: `{date}`, `{page}`, `{id}`. Only `{id}` is mandatory;
/// a site whose URLs carry no date or page component simply omits those.
///
/// # Example
///
/// ```
/// use harvester_core::config::UrlTemplate;
///
/// let tpl = UrlTemplate::new("https://example.com/view/{date}/{page}/{id}").unwrap();
/// assert_eq!(
///     tpl.render("01-02-2026", 3, 348012),
///     "https://example.com/view/01-02-2026/3/348012"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct UrlTemplate {
    template: String,
}

impl UrlTemplate {
    /// Validates and wraps a template string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingIdPlaceholder`] when the template has
    /// no `{id}` placeholder, since such a template would probe one URL for
    /// every identifier.
    pub fn new(template: impl Into<String>) -> Result<Self, ConfigError> {
        let template = template.into();
        if !template.contains("{id}") {
            return Err(ConfigError::MissingIdPlaceholder { template });
        }
        Ok(Self { template })
    }

    /// Renders the canonical document URL for one identifier.
    #[must_use]
    pub fn render(&self, date: &str, page: u32, id: u64) -> String {
        self.template
            .replace("{date}", date)
            .replace("{page}", &page.to_string())
            .replace("{id}", &id.to_string())
    }

    /// Returns the raw template string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.template
    }
}

/// How the coarse walk chooses its first step size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialStep {
    /// A fixed step, independent of range size.
    Fixed(u64),
    /// Range size divided by `divisor`, floored at 1.
    Proportional {
        /// Divisor applied to the inclusive range size.
        divisor: u64,
    },
}

impl InitialStep {
    /// Computes the starting step for an inclusive `[start, end]` range.
    ///
    /// Never returns 0; a degenerate configuration collapses to a step of 1,
    /// which is a plain linear walk.
    #[must_use]
    pub fn for_range(&self, start: u64, end: u64) -> u64 {
        match *self {
            Self::Fixed(step) => step.max(1),
            Self::Proportional { divisor } => {
                let span = end.saturating_sub(start).saturating_add(1);
                (span / divisor.max(1)).max(1)
            }
        }
    }
}

impl Default for InitialStep {
    fn default() -> Self {
        Self::Fixed(DEFAULT_INITIAL_STEP)
    }
}

/// What the scanner does after a pass that produced at least one hit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PassPolicy {
    /// Stop scanning: the productive pass plus cluster expansion is taken
    /// as having harvested the page.
    #[default]
    StopAfterProductivePass,
    /// Keep halving the step and re-walking until the step-1 pass completes,
    /// regardless of hits.
    ContinueHalving,
}

/// Tunable knobs for one page scan.
#[derive(Debug, Clone)]
pub struct ScanPolicy {
    /// Starting coarse-walk step size.
    pub initial_step: InitialStep,
    /// Behavior after a hit-bearing pass.
    pub pass_policy: PassPolicy,
    /// Consecutive misses that end a cluster expansion. Identical in both
    /// directions so neither side of a cluster is favored.
    pub miss_threshold: u32,
    /// Consecutive transient errors that abort the page scan entirely.
    /// `None` disables the ceiling.
    pub failure_ceiling: Option<u32>,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            initial_step: InitialStep::default(),
            pass_policy: PassPolicy::default(),
            miss_threshold: DEFAULT_MISS_THRESHOLD,
            failure_ceiling: Some(DEFAULT_FAILURE_CEILING),
        }
    }
}

/// One page to scan, with an optional operator-supplied seed URL.
///
/// A seed URL is any document URL on the page; its trailing integer is the
/// identifier the scan starts expanding from. A page declared without a seed
/// is walked from the range bounds alone.
#[derive(Debug, Clone)]
pub struct PageSpec {
    /// Page number, as it appears in rendered URLs.
    pub page: u32,
    /// Optional seed URL for this page.
    pub seed_url: Option<String>,
}

impl PageSpec {
    /// Creates a page spec with no seed.
    #[must_use]
    pub fn bare(page: u32) -> Self {
        Self {
            page,
            seed_url: None,
        }
    }

    /// Creates a page spec seeded from an operator-supplied URL.
    #[must_use]
    pub fn seeded(page: u32, seed_url: impl Into<String>) -> Self {
        Self {
            page,
            seed_url: Some(seed_url.into()),
        }
    }

    /// Parses the seed identifier from the seed URL, if one was declared.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnparseableSeed`] when a seed URL is present
    /// but carries no trailing integer. The caller treats this as a per-page
    /// warning, not a run abort.
    pub fn seed_id(&self) -> Result<Option<u64>, ConfigError> {
        let Some(url) = &self.seed_url else {
            return Ok(None);
        };
        match extract_trailing_id(url) {
            Some(id) => {
                debug!(page = self.page, id, "parsed seed identifier");
                Ok(Some(id))
            }
            None => Err(ConfigError::UnparseableSeed {
                page: self.page,
                url: url.clone(),
            }),
        }
    }
}

/// Extracts the trailing integer identifier from a document URL.
///
/// # Examples
///
/// ```
/// use harvester_core::config::extract_trailing_id;
///
/// assert_eq!(extract_trailing_id("https://x.test/view/1/348012"), Some(348012));
/// assert_eq!(extract_trailing_id("https://x.test/view/1/348012/"), Some(348012));
/// assert_eq!(extract_trailing_id("https://x.test/about"), None);
/// ```
#[must_use]
pub fn extract_trailing_id(url: &str) -> Option<u64> {
    TRAILING_ID_PATTERN
        .captures(url.trim_end())
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Complete configuration for one discovery run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Run date, formatted as it appears in rendered URLs.
    pub date: String,
    /// Document URL template.
    pub template: UrlTemplate,
    /// Inclusive lower bound of the identifier range.
    pub start: u64,
    /// Inclusive upper bound of the identifier range.
    pub end: u64,
    /// Pages to scan, in order.
    pub pages: Vec<PageSpec>,
    /// Scan policy shared by all pages.
    pub policy: ScanPolicy,
    /// How many pages may scan concurrently.
    pub page_concurrency: usize,
}

impl RunConfig {
    /// Builds a run configuration, validating the identifier range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRange`] when `start > end`.
    pub fn new(
        date: impl Into<String>,
        template: UrlTemplate,
        start: u64,
        end: u64,
        pages: Vec<PageSpec>,
    ) -> Result<Self, ConfigError> {
        if start > end {
            return Err(ConfigError::InvalidRange { start, end });
        }
        Ok(Self {
            date: date.into(),
            template,
            start,
            end,
            pages,
            policy: ScanPolicy::default(),
            page_concurrency: 1,
        })
    }

    /// Replaces the default scan policy.
    #[must_use]
    pub fn with_policy(mut self, policy: ScanPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets how many pages may scan concurrently.
    #[must_use]
    pub fn with_page_concurrency(mut self, permits: usize) -> Self {
        self.page_concurrency = permits.max(1);
        self
    }

    /// Inclusive size of the identifier range.
    #[must_use]
    pub fn range_size(&self) -> u64 {
        self.end - self.start + 1
    }
}
