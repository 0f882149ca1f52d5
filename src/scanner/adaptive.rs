//! Coarse range walk with a shrinking step size.
//!
//! The walk starts coarse: with valid identifiers clustered, a stride of
//! ninety-odd positions finds a cluster with a handful of probes when one
//! exists. Every fully unproductive pass halves the stride and re-walks
//! from the start, skipping visited positions through the cursor's set, so
//! the scan degrades gracefully toward an exhaustive step-1 sweep over a
//! page with no clusters at all.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tracing::{debug, info, instrument};

use super::{ClusterExpander, ProbeLoop, ScanCursor, ScanError};
use crate::config::{PassPolicy, ScanPolicy};
use crate::ledger::ContentRecord;
use crate::probe::{ProbeOutcome, Prober};
use crate::progress::{ProgressEvent, ProgressSender};

/// Result of scanning one page to exhaustion.
#[derive(Debug)]
pub struct PageScanReport {
    /// The page scanned.
    pub page: u32,
    /// Confirmed records found this run, ordered by identifier.
    pub records: Vec<ContentRecord>,
    /// Distinct identifiers visited.
    pub ids_searched: u64,
    /// Probes issued, including ledger-answered ones.
    pub probes_issued: u64,
    /// Coarse-walk passes performed.
    pub passes: u32,
}

/// Top-level strategy for exploring one page's identifier range.
pub struct AdaptiveScanner {
    prober: Arc<dyn Prober>,
    policy: ScanPolicy,
    start: u64,
    end: u64,
    progress: ProgressSender,
    cancel: Arc<AtomicBool>,
}

impl AdaptiveScanner {
    /// Creates a scanner over the inclusive `[start, end]` range.
    #[must_use]
    pub fn new(prober: Arc<dyn Prober>, start: u64, end: u64, policy: ScanPolicy) -> Self {
        Self {
            prober,
            policy,
            start,
            end,
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

    /// Attaches a cancellation flag, checked between probes.
    #[must_use]
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Scans one page to exhaustion.
    ///
    /// An optional seed identifier (parsed from an operator-supplied URL)
    /// is probed before the coarse walk begins, so a known-good starting
    /// point gets its cluster harvested immediately; its hits count toward
    /// the first pass.
    ///
    /// Termination: the step strictly shrinks on unproductive passes and a
    /// step-1 pass visits every remaining identifier at most once, so the
    /// walk always reaches exhaustion in finite probes. Under
    /// [`PassPolicy::StopAfterProductivePass`] a hit-bearing pass ends the
    /// scan as soon as its clusters are harvested.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError`] on persistence failure, on breaching the
    /// consecutive transient-error ceiling, or on cancellation. The ledger
    /// remains a valid, resumable snapshot in all three cases.
    #[instrument(skip(self), fields(page, start = self.start, end = self.end))]
    pub async fn scan_page(
        &self,
        page: u32,
        seed: Option<u64>,
    ) -> Result<PageScanReport, ScanError> {
        let initial_step = self.policy.initial_step.for_range(self.start, self.end);
        let mut cursor = ScanCursor::new(self.start, self.end, initial_step);
        let probes = ProbeLoop {
            prober: self.prober.as_ref(),
            page,
            failure_ceiling: self.policy.failure_ceiling,
            progress: &self.progress,
            cancel: &self.cancel,
        };
        let expander = ClusterExpander::new(self.policy.miss_threshold);
        let mut records: Vec<ContentRecord> = Vec::new();

        self.progress.send(ProgressEvent::PageStarted {
            page,
            range_size: self.end - self.start + 1,
        });

        let mut seeded_hits = 0usize;
        if let Some(seed_id) = seed {
            if cursor.in_range(seed_id) {
                debug!(page, seed_id, "probing seed before coarse walk");
                if let ProbeOutcome::Hit(record) = probes.issue(&mut cursor, seed_id).await? {
                    let cluster = expander.expand(&probes, &mut cursor, &record).await?;
                    seeded_hits = cluster.len();
                    records.extend(cluster);
                }
            } else {
                debug!(page, seed_id, "seed outside declared range, ignoring");
            }
        }

        let mut passes = 0u32;
        loop {
            passes += 1;
            let step = cursor.step();
            self.progress.send(ProgressEvent::PassStarted { page, step });
            debug!(page, step, pass = passes, "starting coarse pass");

            let mut pass_hits = if passes == 1 { seeded_hits } else { 0 };

            let mut current = self.start;
            loop {
                if !cursor.is_visited(current) {
                    if let ProbeOutcome::Hit(record) = probes.issue(&mut cursor, current).await? {
                        // Harvest the cluster before moving on so a dense
                        // region is fully swept while we are inside it.
                        let cluster = expander.expand(&probes, &mut cursor, &record).await?;
                        pass_hits += cluster.len();
                        records.extend(cluster);
                    }
                }

                match current.checked_add(step) {
                    Some(next) if next <= self.end => current = next,
                    _ => break,
                }
            }

            if pass_hits == 0 {
                if step == 1 {
                    debug!(page, "exhaustive pass complete with no hits");
                    break;
                }
                let new_step = cursor.halve_step();
                debug!(page, new_step, "unproductive pass, halving step");
            } else {
                match self.policy.pass_policy {
                    PassPolicy::StopAfterProductivePass => {
                        debug!(page, pass_hits, "productive pass, stopping scan");
                        break;
                    }
                    PassPolicy::ContinueHalving => {
                        if step == 1 {
                            break;
                        }
                        cursor.halve_step();
                    }
                }
            }
        }

        records.sort_by_key(|r| r.id);
        let report = PageScanReport {
            page,
            records,
            ids_searched: cursor.searched_count(),
            probes_issued: cursor.probes_issued(),
            passes,
        };

        info!(
            page,
            found = report.records.len(),
            searched = report.ids_searched,
            passes = report.passes,
            "page scan complete"
        );
        self.progress.send(ProgressEvent::PageCompleted {
            page,
            found: report.records.len(),
            searched: report.ids_searched,
        });

        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::config::InitialStep;
    use crate::scanner::testing::ScriptedProber;

    fn policy(initial: u64) -> ScanPolicy {
        ScanPolicy {
            initial_step: InitialStep::Fixed(initial),
            ..ScanPolicy::default()
        }
    }

    fn ids(report: &PageScanReport) -> Vec<u64> {
        report.records.iter().map(|r| r.id).collect()
    }

    #[tokio::test]
    async fn test_single_hit_is_found_and_expanded() {
        // Range [1000, 1010], only 1005 valid, initial step 5: the walk
        // visits 1000 then 1005, and expansion covers the rest.
        let prober = Arc::new(ScriptedProber::new(&[1005]));
        let scanner = AdaptiveScanner::new(prober.clone(), 1000, 1010, policy(5));

        let report = scanner.scan_page(1, None).await.unwrap();

        assert_eq!(ids(&report), vec![1005]);
        assert_eq!(report.ids_searched, 11, "expansion sweeps the whole range");
        assert_eq!(report.passes, 1);
        assert_eq!(prober.calls()[..2], [1000, 1005]);
    }

    #[tokio::test]
    async fn test_empty_range_visits_every_id_exactly_once() {
        let prober = Arc::new(ScriptedProber::new(&[]));
        let scanner = AdaptiveScanner::new(prober.clone(), 2000, 2010, policy(5));

        let report = scanner.scan_page(1, None).await.unwrap();

        assert!(report.records.is_empty());
        assert_eq!(report.ids_searched, 11);

        let calls = prober.calls();
        assert_eq!(calls.len(), 11, "no identifier probed twice");
        let mut unique = calls.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), 11);
        assert_eq!(report.passes, 3, "steps 5, 2, 1");
    }

    #[tokio::test]
    async fn test_step_never_probes_outside_range() {
        let prober = Arc::new(ScriptedProber::new(&[1005]));
        let scanner = AdaptiveScanner::new(prober.clone(), 1000, 1010, policy(99));

        scanner.scan_page(1, None).await.unwrap();

        for id in prober.calls() {
            assert!((1000..=1010).contains(&id), "probed out-of-range id {id}");
        }
    }

    #[tokio::test]
    async fn test_continue_halving_policy_runs_to_step_one() {
        let prober = Arc::new(ScriptedProber::new(&[1005]));
        let scan_policy = ScanPolicy {
            initial_step: InitialStep::Fixed(5),
            pass_policy: PassPolicy::ContinueHalving,
            ..ScanPolicy::default()
        };
        let scanner = AdaptiveScanner::new(prober.clone(), 1000, 1010, scan_policy);

        let report = scanner.scan_page(1, None).await.unwrap();

        assert_eq!(ids(&report), vec![1005]);
        assert_eq!(report.passes, 3, "halving continues past the productive pass");
        // The visited-set guard still keeps total probes at the range size.
        assert_eq!(prober.calls().len(), 11);
    }

    #[tokio::test]
    async fn test_previously_confirmed_id_does_not_trigger_expansion() {
        // 1005 confirmed in an earlier run: this run must neither re-fetch
        // it nor treat it as a fresh cluster seed.
        let prober = Arc::new(ScriptedProber::new(&[]).with_known(&[1005]));
        let scanner = AdaptiveScanner::new(prober.clone(), 1000, 1010, policy(5));

        let report = scanner.scan_page(1, None).await.unwrap();

        assert!(report.records.is_empty());
        let occurrences = prober.calls().iter().filter(|&&id| id == 1005).count();
        assert_eq!(occurrences, 1, "known id consulted exactly once");
    }

    #[tokio::test]
    async fn test_transient_ceiling_aborts_page() {
        let all: Vec<u64> = (0..=100).collect();
        let prober = Arc::new(ScriptedProber::new(&[]).with_transient(&all));
        let scan_policy = ScanPolicy {
            initial_step: InitialStep::Fixed(1),
            failure_ceiling: Some(3),
            ..ScanPolicy::default()
        };
        let scanner = AdaptiveScanner::new(prober.clone(), 0, 100, scan_policy);

        let result = scanner.scan_page(1, None).await;

        assert!(matches!(
            result,
            Err(ScanError::TransientCeiling {
                page: 1,
                consecutive: 3
            })
        ));
        assert_eq!(prober.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_disabled_ceiling_treats_transients_as_misses() {
        let all: Vec<u64> = (50..=60).collect();
        let prober = Arc::new(ScriptedProber::new(&[]).with_transient(&all));
        let scan_policy = ScanPolicy {
            initial_step: InitialStep::Fixed(4),
            failure_ceiling: None,
            ..ScanPolicy::default()
        };
        let scanner = AdaptiveScanner::new(prober.clone(), 50, 60, scan_policy);

        let report = scanner.scan_page(1, None).await.unwrap();

        assert!(report.records.is_empty());
        assert_eq!(report.ids_searched, 11, "transients progress like misses");
    }

    #[tokio::test]
    async fn test_seed_hint_probed_first_and_expanded() {
        let prober = Arc::new(ScriptedProber::new(&[1005, 1006]));
        let scanner = AdaptiveScanner::new(prober.clone(), 1000, 1010, policy(5));

        let report = scanner.scan_page(1, Some(1005)).await.unwrap();

        assert_eq!(ids(&report), vec![1005, 1006]);
        assert_eq!(prober.calls()[0], 1005, "seed goes first");
        assert_eq!(report.passes, 1, "seed hits count toward the first pass");
    }

    #[tokio::test]
    async fn test_seed_outside_range_is_ignored() {
        let prober = Arc::new(ScriptedProber::new(&[]));
        let scanner = AdaptiveScanner::new(prober.clone(), 1000, 1010, policy(5));

        let report = scanner.scan_page(1, Some(99_999)).await.unwrap();

        assert!(!prober.calls().contains(&99_999));
        assert_eq!(report.ids_searched, 11);
    }

    #[tokio::test]
    async fn test_cancellation_stops_before_next_probe() {
        let prober = Arc::new(ScriptedProber::new(&[]));
        let cancel = Arc::new(AtomicBool::new(false));
        let scanner = AdaptiveScanner::new(prober.clone(), 0, 1000, policy(1))
            .with_cancel(cancel.clone());

        cancel.store(true, Ordering::SeqCst);
        let result = scanner.scan_page(1, None).await;

        assert!(matches!(result, Err(ScanError::Cancelled)));
        assert!(prober.calls().is_empty());
    }

    #[tokio::test]
    async fn test_progress_events_cover_page_lifecycle() {
        let prober = Arc::new(ScriptedProber::new(&[1005]));
        let (sender, mut rx) = ProgressSender::channel();
        let scanner =
            AdaptiveScanner::new(prober, 1000, 1010, policy(5)).with_progress(sender);

        scanner.scan_page(1, None).await.unwrap();

        let mut saw_started = false;
        let mut saw_hit = false;
        let mut saw_completed = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                ProgressEvent::PageStarted { page: 1, .. } => saw_started = true,
                ProgressEvent::HitConfirmed { id: 1005, .. } => saw_hit = true,
                ProgressEvent::PageCompleted { found: 1, .. } => saw_completed = true,
                _ => {}
            }
        }
        assert!(saw_started && saw_hit && saw_completed);
    }
}
