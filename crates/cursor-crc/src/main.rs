//! cursor-crc: hardware cursor boundary test, entry point.
//!
//! Drives a cursor plane to positions straddling every edge and corner of
//! each connected output and checks the per-frame CRC against a reference
//! captured with the cursor disabled.  The display is the in-process
//! simulated controller described by the config file.
//!
//! # Usage
//!
//! ```text
//! cursor-crc [OPTIONS]
//!
//! Options:
//!   --config <PATH>         TOML config file [env: CURSOR_CRC_CONFIG]
//!   --list-subtests         Print registered subtest names and exit
//!   --run-subtest <GLOB>    Run only matching subtests (repeatable)
//!   --results <PATH>        Write a JSON results report
//! ```
//!
//! # Exit status
//!
//! | Code | Meaning                                        |
//! |------|------------------------------------------------|
//! | 0    | at least one subtest passed, none failed       |
//! | 1    | a subtest failed, or a precondition failed     |
//! | 77   | every selected subtest was skipped             |
//! | 79   | `--run-subtest` matched no registered subtest  |

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cursor_core::SubtestFilter;
use cursor_crc::application::run_subtests::{CursorCrcRunner, RunSummary, SubtestOutcome};
use cursor_crc::infrastructure::config::{load_config, CONFIG_ENV};
use cursor_crc::infrastructure::results::{write_results, ResultsDocument};
use cursor_crc::infrastructure::sim::SimulatedDisplay;

/// Exit status for a subtest filter that selects nothing.
const EXIT_INVALID_SUBTEST: u8 = 79;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Cursor plane CRC boundary test.
#[derive(Debug, Parser)]
#[command(
    name = "cursor-crc",
    about = "Checks hardware cursor clipping at every screen edge using frame CRCs",
    version
)]
struct Cli {
    /// TOML file describing the display under test.
    ///
    /// A missing file means the built-in defaults.
    #[arg(long, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Print every registered subtest name and exit.
    #[arg(long)]
    list_subtests: bool,

    /// Run only subtests matching this pattern (`*` and `?` wildcards).
    #[arg(long = "run-subtest", value_name = "GLOB")]
    run_subtest: Vec<String>,

    /// Write a JSON report of every subtest outcome to this path.
    #[arg(long, value_name = "PATH")]
    results: Option<PathBuf>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;

    // RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level)),
        )
        .init();

    let device = SimulatedDisplay::from_config(&config);
    let mut runner = CursorCrcRunner::new(device).context("cursor test preconditions not met")?;

    if cli.list_subtests {
        for name in runner.subtests() {
            println!("{name}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let filter = SubtestFilter::new(cli.run_subtest);
    if runner.selected(&filter).is_empty() {
        if filter.is_empty() {
            info!(
                max_cursor = runner.max_cursor(),
                "no cursor size is large enough to register any subtest"
            );
            return Ok(ExitCode::from(77));
        }
        error!("--run-subtest matched no registered subtest");
        return Ok(ExitCode::from(EXIT_INVALID_SUBTEST));
    }

    let reports = runner.run(&filter);

    for report in &reports {
        match &report.outcome {
            SubtestOutcome::Pass {
                combinations,
                probes,
            } => info!("{}: PASS ({combinations} combinations, {probes} probes)", report.name),
            SubtestOutcome::Skip { reason } => info!("{}: SKIP ({reason})", report.name),
            SubtestOutcome::Fail { message } => error!("{}: FAIL: {message}", report.name),
        }
    }

    let summary = RunSummary::from_reports(&reports);
    info!(
        passed = summary.passed,
        skipped = summary.skipped,
        failed = summary.failed,
        "cursor-crc finished"
    );

    if let Some(path) = &cli.results {
        let doc = ResultsDocument::new(runner.max_cursor(), &reports);
        write_results(path, &doc)
            .with_context(|| format!("failed to write results to {}", path.display()))?;
        info!("results written to {}", path.display());
    }

    Ok(ExitCode::from(summary.exit_code()))
}
