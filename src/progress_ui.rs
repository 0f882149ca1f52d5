//! Progress UI (indicatif bar) for discovery runs.
//!
//! Consumes the engine's progress-event stream; the engine itself never
//! touches the terminal.

use std::collections::HashMap;
use std::time::Duration;

use harvester_core::ProgressEvent;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::UnboundedReceiver;

/// Spawns the progress UI when requested.
///
/// Returns the handle so the caller can await it after the run; the task
/// ends on its own when the sender side is dropped. When `use_bar` is
/// false the receiver is still drained so the channel never backs up.
pub(crate) fn spawn_progress_ui(
    use_bar: bool,
    mut rx: UnboundedReceiver<ProgressEvent>,
) -> tokio::task::JoinHandle<()> {
    if !use_bar {
        return tokio::spawn(async move { while rx.recv().await.is_some() {} });
    }
    tokio::spawn(async move {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} ids {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.enable_steady_tick(Duration::from_millis(100));

        // Per-page searched counts; the bar shows the sum across all pages
        // so concurrent pages render as one aggregate fraction.
        let mut searched: HashMap<u32, u64> = HashMap::new();
        let mut found = 0usize;

        while let Some(event) = rx.recv().await {
            match event {
                ProgressEvent::PageStarted { page, range_size } => {
                    bar.inc_length(range_size);
                    bar.set_message(format!("page {page} started"));
                }
                ProgressEvent::PassStarted { page, step } => {
                    bar.set_message(format!("page {page} @ step {step}, {found} found"));
                }
                ProgressEvent::Probed { page, searched: n, .. } => {
                    searched.insert(page, n);
                    bar.set_position(searched.values().sum());
                }
                ProgressEvent::HitConfirmed { page, id } => {
                    found += 1;
                    bar.set_message(format!("page {page} hit {id}, {found} found"));
                }
                ProgressEvent::PageCompleted { page, found: n, .. } => {
                    bar.set_message(format!("page {page} done ({n} found)"));
                }
                ProgressEvent::PageSkipped { page, .. } => {
                    bar.set_message(format!("page {page} skipped"));
                }
                ProgressEvent::PageFailed { page, .. } => {
                    bar.set_message(format!("page {page} failed"));
                }
                ProgressEvent::RunCompleted { total_found, .. } => {
                    bar.finish_with_message(format!("run complete, {total_found} found"));
                }
            }
        }
        if !bar.is_finished() {
            bar.abandon();
        }
    })
}
