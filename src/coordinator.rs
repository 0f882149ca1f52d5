//! Drives one discovery run across its configured pages.
//!
//! Pages address disjoint page numbers in the URL space, so they are
//! independent once started and may scan concurrently. A semaphore caps the
//! parallelism; the shared ledger serializes its own writes and one shared
//! rate limiter (inside the prober) bounds the aggregate request rate, so
//! raising the permit count never weakens either invariant.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use crate::config::RunConfig;
use crate::ledger::{Ledger, LedgerSnapshot};
use crate::probe::Prober;
use crate::progress::{ProgressEvent, ProgressSender};
use crate::scanner::{AdaptiveScanner, PageScanReport, ScanError};

/// Errors that end a run without a report.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// A page task panicked or was aborted out from under the run.
    #[error("page task failed to complete: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A page skipped before scanning.
#[derive(Debug, Clone)]
pub struct SkippedPage {
    /// The page number.
    pub page: u32,
    /// Why it was skipped.
    pub reason: String,
}

/// A page whose scan aborted.
#[derive(Debug, Clone)]
pub struct FailedPage {
    /// The page number.
    pub page: u32,
    /// The abort cause.
    pub error: String,
}

/// Aggregate outcome of one run.
#[derive(Debug)]
pub struct RunReport {
    /// Completed page reports, ordered by page number.
    pub pages: Vec<PageScanReport>,
    /// Pages skipped for unusable starting input.
    pub skipped: Vec<SkippedPage>,
    /// Pages whose scans aborted.
    pub failed: Vec<FailedPage>,
    /// Whether the run was cut short by cancellation.
    pub cancelled: bool,
    /// Ledger view at run end.
    pub snapshot: LedgerSnapshot,
}

impl RunReport {
    /// Total records confirmed across all completed pages this run.
    #[must_use]
    pub fn total_found(&self) -> usize {
        self.pages.iter().map(|p| p.records.len()).sum()
    }
}

/// Orchestrates scanners over the configured pages and aggregates results.
pub struct RunCoordinator {
    config: RunConfig,
    prober: Arc<dyn Prober>,
    ledger: Arc<Ledger>,
    progress: ProgressSender,
    cancel: Arc<AtomicBool>,
}

impl RunCoordinator {
    /// Creates a coordinator for one run.
    #[must_use]
    pub fn new(config: RunConfig, prober: Arc<dyn Prober>, ledger: Arc<Ledger>) -> Self {
        Self {
            config,
            prober,
            ledger,
            progress: ProgressSender::disabled(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Attaches a progress-event sender.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = progress;
        self
    }

    /// The run's cancellation flag; setting it stops every page between
    /// probes. The ledger stays valid and resumable regardless of when.
    #[must_use]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Runs every configured page to completion and aggregates the results.
    ///
    /// A page with unusable starting input is skipped with a recorded
    /// warning; a page whose scan aborts is recorded as failed. Neither
    /// stops the other pages.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError`] only when a page task fails to complete
    /// at all (panic or external abort).
    #[instrument(skip(self), fields(pages = self.config.pages.len()))]
    pub async fn run(&self) -> Result<RunReport, CoordinatorError> {
        let semaphore = Arc::new(Semaphore::new(self.config.page_concurrency));
        let mut handles = Vec::new();
        let mut skipped = Vec::new();

        for spec in &self.config.pages {
            let seed = match spec.seed_id() {
                Ok(seed) => seed,
                Err(e) => {
                    warn!(page = spec.page, error = %e, "skipping page");
                    self.progress.send(ProgressEvent::PageSkipped {
                        page: spec.page,
                        reason: e.to_string(),
                    });
                    skipped.push(SkippedPage {
                        page: spec.page,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let scanner = AdaptiveScanner::new(
                Arc::clone(&self.prober),
                self.config.start,
                self.config.end,
                self.config.policy.clone(),
            )
            .with_progress(self.progress.clone())
            .with_cancel(Arc::clone(&self.cancel));

            let semaphore = Arc::clone(&semaphore);
            let page = spec.page;
            handles.push(tokio::spawn(async move {
                // The semaphore only closes when the run is torn down, at
                // which point stopping reads as a cancellation.
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (page, Err(ScanError::Cancelled));
                };
                (page, scanner.scan_page(page, seed).await)
            }));
        }

        let mut pages = Vec::new();
        let mut failed = Vec::new();
        let mut cancelled = false;

        for handle in handles {
            let (page, result) = handle.await?;
            match result {
                Ok(report) => pages.push(report),
                Err(e) => {
                    if matches!(e, ScanError::Cancelled) {
                        cancelled = true;
                    } else {
                        warn!(page, error = %e, "page scan aborted");
                    }
                    self.progress.send(ProgressEvent::PageFailed {
                        page,
                        error: e.to_string(),
                    });
                    failed.push(FailedPage {
                        page,
                        error: e.to_string(),
                    });
                }
            }
        }

        pages.sort_by_key(|p| p.page);
        let snapshot = self.ledger.snapshot().await;
        let report = RunReport {
            pages,
            skipped,
            failed,
            cancelled,
            snapshot,
        };

        info!(
            pages_completed = report.pages.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            total_found = report.total_found(),
            "run complete"
        );
        self.progress.send(ProgressEvent::RunCompleted {
            pages_completed: report.pages.len(),
            total_found: report.total_found(),
        });

        Ok(report)
    }
}
