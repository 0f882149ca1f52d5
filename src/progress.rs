//! Structured progress-event stream.
//!
//! The discovery engine produces events; whatever presentation layer exists
//! consumes them. The engine never touches a terminal, a widget, or a
//! global counter, so the same run can drive a progress bar, a log file, or
//! nothing at all.

use tokio::sync::mpsc;

/// One progress event from a running scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A page scan began.
    PageStarted {
        /// Page number.
        page: u32,
        /// Inclusive size of the identifier range.
        range_size: u64,
    },
    /// A coarse-walk pass began at a step size.
    PassStarted {
        /// Page number.
        page: u32,
        /// Step size for this pass.
        step: u64,
    },
    /// One identifier was probed (any outcome).
    Probed {
        /// Page number.
        page: u32,
        /// The identifier probed.
        id: u64,
        /// Identifiers visited so far this page, for a progress fraction
        /// against `range_size`.
        searched: u64,
    },
    /// A probe confirmed content.
    HitConfirmed {
        /// Page number.
        page: u32,
        /// The confirmed identifier.
        id: u64,
    },
    /// A page scan finished.
    PageCompleted {
        /// Page number.
        page: u32,
        /// Confirmed records found this run.
        found: usize,
        /// Identifiers visited.
        searched: u64,
    },
    /// A page was skipped before scanning (bad starting input).
    PageSkipped {
        /// Page number.
        page: u32,
        /// Human-readable reason.
        reason: String,
    },
    /// A page scan aborted with an error.
    PageFailed {
        /// Page number.
        page: u32,
        /// Human-readable error.
        error: String,
    },
    /// The whole run finished.
    RunCompleted {
        /// Pages that completed a scan.
        pages_completed: usize,
        /// Total confirmed records across all pages this run.
        total_found: usize,
    },
}

/// Cloneable, best-effort sender side of the event stream.
///
/// A disabled sender drops every event, so library code can emit
/// unconditionally. A closed receiver is likewise not an error: progress is
/// advisory and never affects scan semantics.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl ProgressSender {
    /// Creates a connected sender/receiver pair.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Creates a sender that drops every event.
    #[must_use]
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Emits one event, ignoring a missing or closed receiver.
    pub fn send(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
