//! Minimum spacing between outbound probes.
//!
//! Every probe, whether part of the coarse walk or a cluster expansion,
//! passes through one shared [`RateLimiter`] before touching the network.
//! Spacing is tracked per origin, so the aggregate request rate to the
//! remote stays bounded no matter how many pages scan concurrently. This is
//! the sole suspension point in the discovery engine, and it applies
//! uniformly: coarse-walk probes and neighbor probes have equal priority.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use harvester_core::probe::RateLimiter;
//!
//! # async fn example() {
//! let limiter = Arc::new(RateLimiter::new(Duration::from_millis(500)));
//!
//! // First probe proceeds immediately
//! limiter.acquire("https://example.com/view/1/1000").await;
//!
//! // Second probe to the same origin waits out the spacing
//! limiter.acquire("https://example.com/view/1/1001").await;
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Warning threshold for cumulative delay per origin (30 seconds).
const CUMULATIVE_DELAY_WARNING_THRESHOLD: Duration = Duration::from_secs(30);

/// Per-origin probe spacing enforcer.
///
/// Designed to be wrapped in `Arc` and shared by every concurrently scanning
/// page. `DashMap` gives lock-free access to per-origin state; the inner
/// `tokio::sync::Mutex` makes the check-and-update of the last-probe time
/// atomic without holding a map shard lock across an await.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum spacing between probes to the same origin.
    spacing: Duration,

    /// Whether spacing is disabled (spacing of zero).
    disabled: bool,

    /// Per-origin state. Arc so the state can be cloned out and the map
    /// lock released before awaiting on the inner mutex.
    origins: DashMap<String, Arc<OriginState>>,
}

/// State tracked for each origin.
#[derive(Debug)]
struct OriginState {
    /// Time of the last probe to this origin. `None` until the first probe,
    /// which proceeds without delay.
    last_probe: Mutex<Option<Instant>>,

    /// Cumulative delay applied to this origin, in milliseconds.
    cumulative_delay_ms: AtomicU64,
}

impl OriginState {
    fn new() -> Self {
        Self {
            last_probe: Mutex::new(None),
            cumulative_delay_ms: AtomicU64::new(0),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn add_cumulative_delay(&self, delay: Duration) -> Duration {
        let delay_ms = delay.as_millis() as u64;
        let new_total = self
            .cumulative_delay_ms
            .fetch_add(delay_ms, Ordering::SeqCst)
            + delay_ms;
        Duration::from_millis(new_total)
    }
}

impl RateLimiter {
    /// Creates a rate limiter enforcing the given minimum spacing.
    #[must_use]
    #[instrument(skip_all, fields(spacing_ms = spacing.as_millis()))]
    pub fn new(spacing: Duration) -> Self {
        debug!("creating rate limiter");
        Self {
            spacing,
            disabled: spacing.is_zero(),
            origins: DashMap::new(),
        }
    }

    /// Creates a disabled rate limiter that applies no spacing.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Returns whether spacing is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Returns the configured minimum spacing.
    #[must_use]
    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Acquires permission to probe the given URL's origin, sleeping as
    /// needed to honor the spacing. The first probe to an origin proceeds
    /// immediately.
    #[instrument(skip(self), fields(origin))]
    pub async fn acquire(&self, url: &str) {
        if self.disabled {
            return;
        }

        let origin = extract_origin(url);
        tracing::Span::current().record("origin", &origin);

        let state = self
            .origins
            .entry(origin.clone())
            .or_insert_with(|| Arc::new(OriginState::new()))
            .clone();

        // Map shard lock released above; only the origin mutex spans the await.
        let mut last_probe_guard = state.last_probe.lock().await;

        if let Some(last_probe) = *last_probe_guard {
            let elapsed = last_probe.elapsed();

            if elapsed < self.spacing {
                let delay = self.spacing.saturating_sub(elapsed);
                let cumulative = state.add_cumulative_delay(delay);

                debug!(
                    origin = %origin,
                    delay_ms = delay.as_millis(),
                    cumulative_ms = cumulative.as_millis(),
                    "applying probe spacing"
                );

                if cumulative >= CUMULATIVE_DELAY_WARNING_THRESHOLD {
                    warn!(
                        origin = %origin,
                        cumulative_delay_secs = cumulative.as_secs(),
                        "probes are spending significant time rate limited - consider a narrower range"
                    );
                }

                tokio::time::sleep(delay).await;
            }
        } else {
            debug!(origin = %origin, "first probe to origin - no delay");
        }

        *last_probe_guard = Some(Instant::now());
    }
}

/// Extracts the origin host from a URL.
///
/// Returns "unknown" for malformed URLs so every probe is still spaced even
/// when the URL cannot be parsed.
#[must_use]
pub fn extract_origin(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_records_spacing() {
        let limiter = RateLimiter::new(Duration::from_millis(500));
        assert_eq!(limiter.spacing(), Duration::from_millis(500));
        assert!(!limiter.is_disabled());
    }

    #[test]
    fn test_zero_spacing_is_disabled() {
        let limiter = RateLimiter::new(Duration::ZERO);
        assert!(limiter.is_disabled());
        assert!(RateLimiter::disabled().is_disabled());
    }

    #[tokio::test]
    async fn test_disabled_applies_no_delay() {
        tokio::time::pause();

        let limiter = RateLimiter::disabled();
        let start = Instant::now();

        limiter.acquire("https://example.com/view/1/1").await;
        limiter.acquire("https://example.com/view/1/2").await;
        limiter.acquire("https://example.com/view/1/3").await;

        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_first_probe_immediate() {
        tokio::time::pause();

        let limiter = RateLimiter::new(Duration::from_millis(500));
        let start = Instant::now();

        limiter.acquire("https://example.com/view/1/1000").await;

        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_subsequent_probes_spaced() {
        tokio::time::pause();

        let limiter = RateLimiter::new(Duration::from_millis(500));
        let start = Instant::now();

        limiter.acquire("https://example.com/view/1/1000").await;
        limiter.acquire("https://example.com/view/1/1001").await;
        assert!(start.elapsed() >= Duration::from_millis(500));

        limiter.acquire("https://example.com/view/1/1002").await;
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_origins_tracked_independently() {
        tokio::time::pause();

        let limiter = RateLimiter::new(Duration::from_millis(500));

        limiter.acquire("https://a.test/view/1/1").await;

        let start = Instant::now();
        limiter.acquire("https://b.test/view/1/1").await;
        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[test]
    fn test_extract_origin_lowercases_host() {
        assert_eq!(extract_origin("https://Example.COM/Path"), "example.com");
    }

    #[test]
    fn test_extract_origin_malformed_is_unknown() {
        assert_eq!(extract_origin("not a url"), "unknown");
    }
}
