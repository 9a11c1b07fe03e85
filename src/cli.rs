use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::MadaaConfig;
use crate::pipeline::{MergeStrategy, ScanOptions};

#[derive(Parser, Debug)]
#[command(name = "madaa")]
#[command(about = "Mass data analyzer: concurrent directory statistics", long_about = None)]
pub struct Cli {
    /// Path to scan (defaults to current directory)
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Show verbose output with drill-down sections
    #[arg(long, short)]
    pub verbose: bool,

    /// Number of largest files to track, globally and per type
    #[arg(long, value_name = "N")]
    pub top: Option<usize>,

    /// Rows shown per ranked section
    #[arg(long, value_name = "N")]
    pub top_entries: Option<usize>,

    /// Maximum depth for directory recursion
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,

    /// Skip paths containing this substring (repeatable)
    #[arg(long, value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Number of worker threads (0 = auto-detect)
    #[arg(long, short = 'j', value_name = "N")]
    pub threads: Option<usize>,

    /// How workers merge into the aggregate
    #[arg(long, value_enum, value_name = "STRATEGY")]
    pub strategy: Option<MergeStrategy>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Output JSON to stdout
    #[arg(long)]
    pub json: bool,

    /// Write JSON output to file
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Show progress indicator during scan
    #[arg(long)]
    pub progress: bool,

    /// Config file (default: ~/.config/madaa/config.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn validate(&self) -> Result<(), String> {
        if self.top == Some(0) {
            return Err("--top must be at least 1".to_string());
        }
        if self.top_entries == Some(0) {
            return Err("--top-entries must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn get_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn should_output_json(&self) -> bool {
        self.json || self.output.is_some()
    }

    /// Scan options from the config file with command-line overrides applied.
    pub fn scan_options(&self, config: &MadaaConfig) -> ScanOptions {
        let scan = &config.scan;
        let mut exclude = scan.exclude.clone();
        exclude.extend(self.exclude.iter().cloned());

        ScanOptions {
            top: self.top.unwrap_or(scan.top),
            workers: self.threads.unwrap_or(scan.threads),
            max_depth: self.max_depth.or(scan.max_depth),
            exclude,
            progress_interval: Duration::from_millis(scan.progress_interval_ms),
            strategy: self.strategy.unwrap_or(scan.strategy),
        }
    }

    pub fn top_entries(&self, config: &MadaaConfig) -> usize {
        self.top_entries.unwrap_or(config.display.top_entries)
    }
}
