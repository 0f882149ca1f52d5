//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use harvester_core::config::{
    DEFAULT_FAILURE_CEILING, DEFAULT_INITIAL_STEP, DEFAULT_MISS_THRESHOLD,
    DEFAULT_PROBE_SPACING_MS,
};

/// Discover and retrieve content items by probing a sparse identifier range.
///
/// Harvester walks a declared `[start, end]` identifier range with a
/// shrinking step size, expands around every confirmed hit, and records
/// results in an idempotent on-disk ledger so re-runs never repeat work.
#[derive(Parser, Debug)]
#[command(name = "harvester")]
#[command(author, version, about)]
pub struct Args {
    /// Run date as it appears in document URLs (DD-MM-YYYY)
    #[arg(short, long)]
    pub date: String,

    /// Document URL template with {date}, {page}, and {id} placeholders
    #[arg(short, long)]
    pub template: String,

    /// Inclusive lower bound of the identifier range
    #[arg(long)]
    pub start: u64,

    /// Inclusive upper bound of the identifier range
    #[arg(long)]
    pub end: u64,

    /// Number of pages to scan (1..=50)
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=50))]
    pub pages: u32,

    /// Seed URL for a page, as PAGE=URL (repeatable; trailing integer in URL
    /// is the starting identifier)
    #[arg(short = 's', long = "seed", value_name = "PAGE=URL", value_parser = parse_seed)]
    pub seeds: Vec<(u32, String)>,

    /// Output directory for assets and ledger documents
    #[arg(short, long, default_value = "output")]
    pub output: PathBuf,

    /// Initial coarse-walk step size
    #[arg(long, default_value_t = DEFAULT_INITIAL_STEP, value_parser = clap::value_parser!(u64).range(1..))]
    pub initial_step: u64,

    /// Derive the initial step from the range size instead (range / DIVISOR)
    #[arg(long, value_name = "DIVISOR", conflicts_with = "initial_step", value_parser = clap::value_parser!(u64).range(1..))]
    pub step_divisor: Option<u64>,

    /// Keep halving the step after a productive pass instead of stopping
    #[arg(long)]
    pub keep_halving: bool,

    /// Consecutive misses that end a cluster expansion (1-100)
    #[arg(long, default_value_t = DEFAULT_MISS_THRESHOLD, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub miss_threshold: u32,

    /// Consecutive transient errors that abort a page scan (0 to disable)
    #[arg(long, default_value_t = DEFAULT_FAILURE_CEILING, value_parser = clap::value_parser!(u32).range(0..=1000))]
    pub failure_ceiling: u32,

    /// Minimum delay between probes to the same origin in milliseconds
    /// (0 to disable, max 60000)
    #[arg(short = 'l', long, default_value_t = DEFAULT_PROBE_SPACING_MS, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub rate_limit: u64,

    /// Maximum pages scanning concurrently (1-16)
    #[arg(short = 'c', long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=16))]
    pub concurrency: u8,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Parses a PAGE=URL seed pair.
fn parse_seed(raw: &str) -> Result<(u32, String), String> {
    let (page, url) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected PAGE=URL, got '{raw}'"))?;
    let page: u32 = page
        .trim()
        .parse()
        .map_err(|_| format!("'{page}' is not a page number"))?;
    if url.trim().is_empty() {
        return Err(format!("seed for page {page} has an empty URL"));
    }
    Ok((page, url.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 9] = [
        "harvester",
        "-d",
        "01-01-2026",
        "-t",
        "https://e.test/view/{date}/{page}/{id}",
        "--start",
        "348000",
        "--end",
        "348999",
    ];

    fn parse(extra: &[&str]) -> Result<Args, clap::Error> {
        let mut argv: Vec<&str> = REQUIRED.to_vec();
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv)
    }

    #[test]
    fn test_cli_required_args_parse_with_defaults() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.date, "01-01-2026");
        assert_eq!(args.start, 348000);
        assert_eq!(args.end, 348999);
        assert_eq!(args.pages, 1);
        assert_eq!(args.initial_step, 99);
        assert_eq!(args.miss_threshold, 10);
        assert_eq!(args.failure_ceiling, 10);
        assert_eq!(args.rate_limit, 500);
        assert_eq!(args.concurrency, 1);
        assert!(!args.keep_halving);
        assert!(args.seeds.is_empty());
    }

    #[test]
    fn test_cli_missing_required_args_rejected() {
        let result = Args::try_parse_from(["harvester"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn test_cli_seed_pair_parses() {
        let args = parse(&["-s", "1=https://e.test/view/1/348500"]).unwrap();
        assert_eq!(args.seeds, vec![(1, "https://e.test/view/1/348500".into())]);
    }

    #[test]
    fn test_cli_seed_repeatable() {
        let args = parse(&["-s", "1=https://a.test/1/10", "-s", "2=https://a.test/2/20"]).unwrap();
        assert_eq!(args.seeds.len(), 2);
        assert_eq!(args.seeds[1].0, 2);
    }

    #[test]
    fn test_cli_seed_without_equals_rejected() {
        let result = parse(&["-s", "https://e.test/view/1/348500"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_seed_non_numeric_page_rejected() {
        let result = parse(&["-s", "one=https://e.test/view/1/348500"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_step_divisor_conflicts_with_initial_step() {
        let result = parse(&["--initial-step", "50", "--step-divisor", "10"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_step_divisor_alone_accepted() {
        let args = parse(&["--step-divisor", "10"]).unwrap();
        assert_eq!(args.step_divisor, Some(10));
    }

    #[test]
    fn test_cli_zero_initial_step_rejected() {
        let result = parse(&["--initial-step", "0"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_failure_ceiling_zero_allowed() {
        // 0 disables the ceiling rather than aborting on the first transient
        let args = parse(&["--failure-ceiling", "0"]).unwrap();
        assert_eq!(args.failure_ceiling, 0);
    }

    #[test]
    fn test_cli_rate_limit_zero_disables() {
        let args = parse(&["-l", "0"]).unwrap();
        assert_eq!(args.rate_limit, 0);
    }

    #[test]
    fn test_cli_rate_limit_over_max_rejected() {
        let result = parse(&["-l", "60001"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_concurrency_bounds() {
        assert_eq!(parse(&["-c", "16"]).unwrap().concurrency, 16);
        assert!(parse(&["-c", "0"]).is_err());
        assert!(parse(&["-c", "17"]).is_err());
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        assert_eq!(parse(&["-v"]).unwrap().verbose, 1);
        assert_eq!(parse(&["-vv"]).unwrap().verbose, 2);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        // --help causes early exit, so we check it returns an error with Help kind
        let result = Args::try_parse_from(["harvester", "--help"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let result = parse(&["--invalid-flag"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }
}
