mod bounded_heap;
mod cancel;
mod categorize;
mod classify;
mod cli;
mod collector;
mod config;
mod error;
mod output;
mod pipeline;
mod progress;
mod sharded_collector;
mod types;
mod walker;

use categorize::CategoryTable;
use clap::Parser;
use cli::Cli;
use config::{ColorResolver, MadaaConfig};
use output::{build_report, JsonRenderer, ReportContext, TerminalRenderer};
use pipeline::Pipeline;
use progress::ProgressDisplay;
use sysinfo::Disks;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use types::DiskUsage;

fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    if let Err(e) = cli.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }

    let config = match MadaaConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    let path = cli.get_path();
    let options = cli.scan_options(&config);
    debug!(?options, "scan options");

    let mut pipeline = Pipeline::new(options);
    debug!(workers = pipeline.workers(), path = %path.display(), "starting scan");

    let cancel = pipeline.cancel_token();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, shutting down...");
        cancel.cancel();
    }) {
        warn!(error = %e, "failed to install Ctrl+C handler");
    }

    let display = if cli.progress {
        let snapshots = pipeline.subscribe();
        Some(std::thread::spawn(move || {
            ProgressDisplay::new(true).follow(snapshots);
        }))
    } else {
        None
    };

    let result = pipeline.run(&path);

    // Dropping the pipeline disconnects the progress channel
    drop(pipeline);
    if let Some(handle) = display {
        join_display(handle);
    }

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) if e.is_cancelled() => {
            eprintln!("Scan cancelled.");
            std::process::exit(130);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let categories = CategoryTable::from_config(&config);
    let report = build_report(
        &outcome.statistics,
        &ReportContext {
            scanned_path: &path,
            categories: &categories,
            top_entries: cli.top_entries(&config),
            disk_usage: get_disk_usage(&path),
            skipped: outcome.skipped,
        },
    );

    if cli.should_output_json() {
        let renderer = JsonRenderer::new();
        if let Err(e) = renderer.render(&report, cli.output.as_deref()) {
            eprintln!("Error writing JSON output: {}", e);
            std::process::exit(3);
        }
    } else {
        let use_color = !cli.no_color && std::io::IsTerminal::is_terminal(&std::io::stdout());
        let renderer = TerminalRenderer::new(use_color, cli.verbose, ColorResolver::new(&config));
        renderer.render(&report);
    }
}

fn setup_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("madaa=debug,warn")
        } else {
            EnvFilter::new("madaa=info,warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Waits for the progress display; a panic there never fails the scan.
fn join_display(handle: std::thread::JoinHandle<()>) -> bool {
    let joined = handle.join().is_ok();
    if !joined {
        warn!("progress display thread panicked");
    }
    joined
}

fn get_disk_usage(path: &std::path::Path) -> Option<DiskUsage> {
    let disks = Disks::new_with_refreshed_list();

    let canonical_path = path.canonicalize().ok()?;

    // The most specific mount point containing the path
    let disk = disks
        .iter()
        .filter(|d| canonical_path.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().as_os_str().len())?;

    let total_space = disk.total_space();
    let available_space = disk.available_space();
    let used_space = total_space.saturating_sub(available_space);
    let used_percent = if total_space > 0 {
        (used_space as f64 / total_space as f64) * 100.0
    } else {
        0.0
    };

    Some(DiskUsage {
        total_space,
        available_space,
        used_space,
        used_percent,
    })
}
