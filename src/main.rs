//! CLI entry point for the harvester tool.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use harvester_core::{
    FsAssetStore, HttpClient, HttpProber, InitialStep, Ledger, PageSpec, PassPolicy,
    ProgressSender, RateLimiter, RunConfig, RunCoordinator, ScanPolicy, UrlTemplate,
};
use harvester_core::probe::HtmlExtractor;
use tracing::{debug, info, warn};

mod cli;
mod progress_ui;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");
    info!("Harvester starting");

    let template = UrlTemplate::new(&args.template).context("invalid URL template")?;

    // Attach seed URLs to their pages; a seed for a page outside the run is
    // operator error worth flagging, not aborting.
    let mut seeds: HashMap<u32, String> = args.seeds.iter().cloned().collect();
    let pages: Vec<PageSpec> = (1..=args.pages)
        .map(|page| match seeds.remove(&page) {
            Some(url) => PageSpec::seeded(page, url),
            None => PageSpec::bare(page),
        })
        .collect();
    for page in seeds.keys() {
        warn!(page, pages = args.pages, "seed given for a page outside the run, ignoring");
    }

    let initial_step = match args.step_divisor {
        Some(divisor) => InitialStep::Proportional { divisor },
        None => InitialStep::Fixed(args.initial_step),
    };
    let policy = ScanPolicy {
        initial_step,
        pass_policy: if args.keep_halving {
            PassPolicy::ContinueHalving
        } else {
            PassPolicy::StopAfterProductivePass
        },
        miss_threshold: args.miss_threshold,
        failure_ceiling: (args.failure_ceiling > 0).then_some(args.failure_ceiling),
    };

    let config = RunConfig::new(&args.date, template.clone(), args.start, args.end, pages)
        .context("invalid run configuration")?
        .with_policy(policy)
        .with_page_concurrency(usize::from(args.concurrency));

    // Ledger documents live in the context (date) directory next to the
    // assets, so one directory holds everything an archive exporter needs.
    let context_dir = args.output.join(&args.date);
    let ledger = Arc::new(
        Ledger::open(&context_dir)
            .await
            .with_context(|| format!("failed to open ledger in {}", context_dir.display()))?,
    );

    let rate_limiter = if args.rate_limit == 0 {
        debug!("rate limiting disabled");
        Arc::new(RateLimiter::disabled())
    } else {
        debug!(rate_limit_ms = args.rate_limit, "rate limiting enabled");
        Arc::new(RateLimiter::new(Duration::from_millis(args.rate_limit)))
    };

    let prober = Arc::new(HttpProber::new(
        HttpClient::new(),
        Arc::new(HtmlExtractor::new()),
        Arc::new(FsAssetStore::new(&args.output)),
        Arc::clone(&ledger),
        rate_limiter,
        template,
        &args.date,
    ));

    let (progress, rx) = ProgressSender::channel();
    let use_bar = !args.no_progress && !args.quiet;
    let ui = progress_ui::spawn_progress_ui(use_bar, rx);

    let coordinator = RunCoordinator::new(config, prober, ledger).with_progress(progress);

    // Ctrl-C stops the run between probes; the ledger stays resumable.
    let cancel = coordinator.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current probe");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let report = coordinator.run().await?;

    // The UI task ends once every sender is gone; the coordinator holds the
    // last one.
    drop(coordinator);
    ui.await.ok();

    for page in &report.skipped {
        warn!(page = page.page, reason = %page.reason, "page skipped");
    }
    for page in &report.failed {
        warn!(page = page.page, error = %page.error, "page scan aborted");
    }

    info!(
        pages_completed = report.pages.len(),
        found_this_run = report.total_found(),
        total_confirmed = report.snapshot.stats.total_downloaded,
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        output = %context_dir.display(),
        "Harvest complete"
    );

    if report.cancelled {
        bail!("run cancelled; ledger in {} is resumable", context_dir.display());
    }
    if report.pages.is_empty() && !report.failed.is_empty() {
        bail!("no page completed a scan");
    }

    Ok(())
}
