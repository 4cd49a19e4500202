// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 TrackShred Contributors
//! TrackShred - Secure File & Metadata Destruction Tool
//!
//! Command-line front end over the destruction engine: flag parsing,
//! config merging, logging setup, signal wiring, and the end-of-run
//! summary. The engine itself lives in the library crate.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use trackshred::config::DEFAULT_LOG_FILE;
use trackshred::{
    CancelToken, Config, DestructionOrchestrator, Mode, OperationKind, OperationReport,
    OperationRequest, OutcomeStatus, Profile, Result, ShredError,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line interface definition
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Secure File & Metadata Destruction Tool",
    long_about = "Securely deletes files with multi-pass overwrite, strips identifying \
                  metadata, and sweeps OS locations that retain traces of deleted files.",
    after_help = "Examples:\n  \
        trackshred --target ~/secret.pdf\n  \
        trackshred --target ~/Documents --deep\n  \
        trackshred --deep --dry-run\n  \
        trackshred --target file.zip --metadata-only"
)]
struct Cli {
    /// Target file or directory to shred (repeatable)
    #[arg(long = "target", value_name = "PATH")]
    targets: Vec<PathBuf>,

    /// Perform aggressive system-wide privacy sweep
    #[arg(long)]
    deep: bool,

    /// Number of overwrite passes, 1-10 (default from config)
    #[arg(long = "shred-passes", value_name = "N")]
    shred_passes: Option<u32>,

    /// Only clean metadata without deleting files
    #[arg(long = "metadata-only")]
    metadata_only: bool,

    /// Show what would be destroyed without taking action
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Path to log file
    #[arg(long, value_name = "PATH")]
    log: Option<PathBuf>,

    /// Save operation report to JSON file
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Verbose output
    #[arg(long, short)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(status) => status,
        Err(err) => {
            eprintln!("trackshred: {}", err);
            err.exit_code()
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(passes) = cli.shred_passes {
        config.shred_passes = passes;
    }
    if let Some(log) = cli.log.clone() {
        config.log_file = log;
    }
    init_logging(&config, cli.verbose);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "trackshred started");

    if cli.targets.is_empty() && !cli.deep {
        return Err(ShredError::InvalidInput(
            "must specify either --target or --deep".to_string(),
        ));
    }

    let cancel = CancelToken::new();
    let handler = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nreceived interrupt, finishing the current pass...");
        handler.cancel();
    })
    .map_err(|e| ShredError::Io(std::io::Error::other(e.to_string())))?;

    let mode = if cli.metadata_only {
        Mode::MetadataOnly
    } else if cli.targets.is_empty() {
        Mode::DeepSweep
    } else {
        Mode::Combined
    };
    let request = OperationRequest::new(
        cli.targets.clone(),
        mode,
        config.shred_passes,
        cli.dry_run,
        cli.deep && !cli.targets.is_empty(),
        Profile::Custom(config.clone()),
    )?;

    let mut engine = DestructionOrchestrator::new(cancel)?;
    let report = engine.run(&request);

    print_summary(&report, cli.dry_run);
    if let Some(path) = &cli.report {
        report.save(path)?;
        println!("Report saved to: {}", path.display());
    }
    Ok(report.exit_status())
}

/// Installs the tracing subscriber: always to the log file, and to
/// stderr as well under `--verbose`. A logging failure never blocks
/// destruction work; the configured file falls back to /tmp.
fn init_logging(config: &Config, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = open_log_file(&config.log_file)
        .map(|file| fmt::layer().with_ansi(false).with_writer(Arc::new(file)));
    let stderr_layer = verbose.then(|| fmt::layer().with_writer(std::io::stderr));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init();
}

fn open_log_file(path: &Path) -> Option<std::fs::File> {
    let open = |p: &Path| {
        if let Some(parent) = p.parent().filter(|d| !d.as_os_str().is_empty()) {
            let _ = std::fs::create_dir_all(parent);
        }
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(p)
            .ok()
    };
    open(path).or_else(|| open(Path::new(DEFAULT_LOG_FILE)))
}

/// Prints the human-readable end-of-run summary.
fn print_summary(report: &OperationReport, dry_run: bool) {
    println!();
    println!("TrackShred - Secure Erasure Utility");
    println!("-----------------------------------");
    if dry_run {
        println!("[dry run] no data was modified");
    }

    let sections = [
        (OperationKind::Overwrite, "Files shredded"),
        (OperationKind::MetadataStrip, "Metadata cleaned"),
        (OperationKind::SweepItem, "System locations swept"),
    ];
    for (kind, label) in sections {
        let done: Vec<_> = report
            .outcomes()
            .iter()
            .filter(|o| o.kind == kind && o.status == OutcomeStatus::Success)
            .collect();
        if !done.is_empty() {
            println!("[✓] {} ({}):", label, done.len());
            for outcome in done {
                println!("    - {}", outcome.target.display());
            }
        }
    }

    let failures: Vec<_> = report
        .outcomes()
        .iter()
        .filter(|o| o.status == OutcomeStatus::Failed)
        .collect();
    if !failures.is_empty() {
        println!("[✗] Failures ({}):", failures.len());
        for outcome in &failures {
            println!("    - {}: {}", outcome.target.display(), outcome.detail);
        }
    }

    let summary = report.summary();
    if summary.skipped > 0 {
        println!("[-] Skipped: {}", summary.skipped);
    }

    println!();
    if report.outcomes().is_empty() {
        println!("No operations performed.");
    } else if summary.failed == 0 {
        println!("Operation completed successfully.");
    } else {
        println!("Operation completed with errors.");
    }
}
