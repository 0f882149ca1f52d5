//! Neighborhood expansion around a confirmed hit.
//!
//! Valid identifiers appear in runs: consecutive content items on one page
//! occupy consecutive identifiers, give or take gaps. Once the coarse walk
//! finds one, walking outward from it is far cheaper than waiting for the
//! walk to stumble over the rest.

use tracing::{debug, instrument};

use super::{ProbeLoop, ScanCursor, ScanError};
use crate::ledger::ContentRecord;
use crate::probe::ProbeOutcome;

/// Outward walk from a seed hit until the neighborhood goes quiet.
#[derive(Debug, Clone, Copy)]
pub struct ClusterExpander {
    miss_threshold: u32,
}

impl ClusterExpander {
    /// Creates an expander that stops after `miss_threshold` consecutive
    /// misses. The threshold bounds the worst-case cost of chasing a cluster
    /// boundary and applies identically in both directions, so neither side
    /// of a cluster is favored.
    #[must_use]
    pub fn new(miss_threshold: u32) -> Self {
        Self {
            miss_threshold: miss_threshold.max(1),
        }
    }

    /// Probes outward from `seed` at offsets 1, 2, 3, ... trying `seed +
    /// offset` then `seed - offset` at each, both directions regardless of
    /// which one hits. Out-of-range and already-visited identifiers are
    /// skipped without touching the miss counter; a hit resets it; an
    /// identifier the ledger already confirmed is neutral, being no evidence
    /// about the cluster's shape at this offset.
    ///
    /// Returns every record confirmed, seed included, ordered by identifier.
    ///
    /// # Errors
    ///
    /// Propagates [`ScanError`] from the probe loop (persistence failure,
    /// transient ceiling, cancellation).
    #[instrument(skip(self, probes, cursor, seed), fields(page = probes.page, seed = seed.id))]
    pub(crate) async fn expand(
        &self,
        probes: &ProbeLoop<'_>,
        cursor: &mut ScanCursor,
        seed: &ContentRecord,
    ) -> Result<Vec<ContentRecord>, ScanError> {
        let mut found = vec![seed.clone()];
        let mut consecutive_misses = 0u32;
        let mut offset = 1u64;

        'walk: loop {
            let above = seed.id.checked_add(offset);
            let below = seed.id.checked_sub(offset);

            let above_live = above.is_some_and(|id| cursor.in_range(id));
            let below_live = below.is_some_and(|id| cursor.in_range(id));
            if !above_live && !below_live {
                debug!(offset, "both directions out of range, expansion done");
                break;
            }

            for candidate in [above, below] {
                let Some(id) = candidate else { continue };
                if !cursor.in_range(id) || cursor.is_visited(id) {
                    continue;
                }

                match probes.issue(cursor, id).await? {
                    ProbeOutcome::Hit(record) => {
                        consecutive_misses = 0;
                        found.push(record);
                    }
                    ProbeOutcome::Miss(_) => {
                        consecutive_misses += 1;
                        if consecutive_misses >= self.miss_threshold {
                            debug!(
                                offset,
                                misses = consecutive_misses,
                                "neighborhood quiet, expansion done"
                            );
                            break 'walk;
                        }
                    }
                    ProbeOutcome::AlreadyKnown => {}
                }
            }

            offset += 1;
        }

        found.sort_by_key(|r| r.id);
        debug!(found = found.len(), "cluster harvested");
        Ok(found)
    }
}
