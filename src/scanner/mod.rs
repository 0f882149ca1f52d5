//! Adaptive exploration of a sparse identifier range.
//!
//! Two cooperating strategies live here:
//! - [`AdaptiveScanner`] walks the range with a shrinking step size,
//!   locating dense regions cheaply.
//! - [`ClusterExpander`] harvests a located region by walking outward from
//!   a confirmed hit until the neighborhood goes quiet.
//!
//! Both issue probes through the same per-page bookkeeping so no identifier
//! is ever probed twice in a run and the transient-failure ceiling applies
//! uniformly.

pub mod adaptive;
pub mod cluster;
pub mod cursor;

use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::warn;

use crate::probe::{MissReason, ProbeError, ProbeOutcome, Prober};
use crate::progress::{ProgressEvent, ProgressSender};

pub use adaptive::{AdaptiveScanner, PageScanReport};
pub use cluster::ClusterExpander;
pub use cursor::ScanCursor;

/// Errors that abort a page scan.
///
/// Everything else a probe can produce is absorbed by the scan strategy.
#[derive(Debug, Error)]
pub enum ScanError {
    /// A probe failed fatally (persistence), so continuing would silently
    /// drop confirmed content.
    #[error("page {page} probe failed: {source}")]
    Probe {
        /// The page being scanned.
        page: u32,
        /// The underlying probe fault.
        #[source]
        source: ProbeError,
    },

    /// The consecutive transient-error ceiling was reached; the origin is
    /// treated as unreachable for this page.
    #[error("page {page} aborted after {consecutive} consecutive transient failures")]
    TransientCeiling {
        /// The page being scanned.
        page: u32,
        /// The consecutive count at abort time.
        consecutive: u32,
    },

    /// The run was cancelled between probes.
    #[error("scan cancelled")]
    Cancelled,
}

/// Per-page probe issuing: dedup bookkeeping, transient ceiling, progress
/// events, and cancellation, shared by the coarse walk and the expander.
pub(crate) struct ProbeLoop<'a> {
    pub prober: &'a dyn Prober,
    pub page: u32,
    pub failure_ceiling: Option<u32>,
    pub progress: &'a ProgressSender,
    pub cancel: &'a AtomicBool,
}

impl ProbeLoop<'_> {
    /// Issues one probe, updating the cursor and enforcing the ceiling.
    ///
    /// The caller is responsible for range and visited checks; this method
    /// assumes `id` is a fresh, in-range candidate.
    pub(crate) async fn issue(
        &self,
        cursor: &mut ScanCursor,
        id: u64,
    ) -> Result<ProbeOutcome, ScanError> {
        if self.cancel.load(Ordering::SeqCst) {
            return Err(ScanError::Cancelled);
        }

        let outcome = self
            .prober
            .probe(self.page, id)
            .await
            .map_err(|source| ScanError::Probe {
                page: self.page,
                source,
            })?;

        cursor.mark_visited(id);
        cursor.note_probe();
        self.progress.send(ProgressEvent::Probed {
            page: self.page,
            id,
            searched: cursor.searched_count(),
        });

        match &outcome {
            ProbeOutcome::Hit(record) => {
                cursor.reset_transient();
                self.progress.send(ProgressEvent::HitConfirmed {
                    page: self.page,
                    id: record.id,
                });
            }
            ProbeOutcome::Miss(MissReason::Transient) => {
                let consecutive = cursor.note_transient();
                if let Some(ceiling) = self.failure_ceiling
                    && consecutive >= ceiling
                {
                    warn!(
                        page = self.page,
                        consecutive, "transient-failure ceiling reached, aborting page scan"
                    );
                    return Err(ScanError::TransientCeiling {
                        page: self.page,
                        consecutive,
                    });
                }
            }
            // A structural miss is a completed round trip; the origin is up.
            ProbeOutcome::Miss(_) => cursor.reset_transient(),
            // No network call happened, so no evidence either way.
            ProbeOutcome::AlreadyKnown => {}
        }

        Ok(outcome)
    }
}
