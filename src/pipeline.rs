//! Scan orchestration: one producer, a fixed pool of workers and a progress
//! sampler, all sharing one cancellation signal.
//!
//! ```text
//! Walker ──paths──▶ Worker × N ──Observation──▶ Collector
//!                      │
//!                 ProgressState ◀── ProgressReporter ──snapshots──▶ observer
//! ```

use crate::cancel::CancelToken;
use crate::classify::{self, FileFacts};
use crate::collector::{Collector, LockedCollector, Statistics};
use crate::error::ScanError;
use crate::progress::{ProgressReporter, ProgressState, DEFAULT_TICK};
use crate::sharded_collector::ShardedCollector;
use crate::types::{Observation, ProgressSnapshot};
use crate::walker::{PendingNode, Walker};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info};

const CHANNEL_CAPACITY_MULTIPLIER: usize = 64;
const MIN_CHANNEL_CAPACITY: usize = 256;
const PROGRESS_CHANNEL_CAPACITY: usize = 16;

/// How workers fold observations into the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// One aggregate behind one lock.
    #[default]
    Locked,
    /// One aggregate per worker, reduced after the workers are joined.
    Sharded,
}

impl MergeStrategy {
    fn build(self, workers: usize, top_n: usize) -> Box<dyn Collector> {
        match self {
            MergeStrategy::Locked => Box::new(LockedCollector::new(top_n)),
            MergeStrategy::Sharded => Box::new(ShardedCollector::new(workers, top_n)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Top-K capacity for the largest-file trackers.
    pub top: usize,
    /// Worker count; 0 picks the number of available processing units.
    pub workers: usize,
    pub max_depth: Option<usize>,
    pub exclude: Vec<String>,
    pub progress_interval: Duration,
    pub strategy: MergeStrategy,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            top: 10,
            workers: 0,
            max_depth: None,
            exclude: Vec::new(),
            progress_interval: DEFAULT_TICK,
            strategy: MergeStrategy::Locked,
        }
    }
}

/// A completed scan.
#[derive(Debug)]
pub struct ScanOutcome {
    pub statistics: Statistics,
    pub skipped: u64,
    pub elapsed: Duration,
}

pub struct Pipeline {
    options: ScanOptions,
    workers: usize,
    cancel: CancelToken,
    progress: Arc<ProgressState>,
    observer: Option<(Sender<ProgressSnapshot>, Receiver<ProgressSnapshot>)>,
}

impl Pipeline {
    pub fn new(options: ScanOptions) -> Self {
        // Auto-detect worker count if 0
        let workers = if options.workers == 0 {
            rayon::current_num_threads()
        } else {
            options.workers
        };

        Self {
            options,
            workers,
            cancel: CancelToken::new(),
            progress: Arc::new(ProgressState::new()),
            observer: None,
        }
    }

    /// Handle for cancelling the run from elsewhere (e.g. a Ctrl+C handler).
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Subscribes to progress snapshots. Delivery is best-effort except for
    /// the final snapshot of a successful run. The channel disconnects once
    /// the pipeline is dropped.
    pub fn subscribe(&mut self) -> Receiver<ProgressSnapshot> {
        let (tx, rx) = bounded(PROGRESS_CHANNEL_CAPACITY);
        self.observer = Some((tx, rx.clone()));
        rx
    }

    /// Runs a full scan of `root`.
    ///
    /// Either every worker and the producer finish cleanly and the complete
    /// aggregate is returned, or the first fatal error is. Partial statistics
    /// from a failed or cancelled run are discarded.
    pub fn run(&self, root: &Path) -> Result<ScanOutcome, ScanError> {
        let collector = self.options.strategy.build(self.workers, self.options.top);
        self.run_with(root, collector)
    }

    fn run_with(&self, root: &Path, collector: Box<dyn Collector>) -> Result<ScanOutcome, ScanError> {
        let started = Instant::now();
        let now = SystemTime::now();

        fs::symlink_metadata(root).map_err(|source| ScanError::Root {
            path: root.to_path_buf(),
            source,
        })?;

        let walker = Walker::new(
            self.workers,
            self.options.max_depth,
            self.options.exclude.clone(),
        );
        let reporter = self.observer.as_ref().map(|(tx, rx)| {
            ProgressReporter::new(
                self.progress.clone(),
                tx.clone(),
                rx.clone(),
                self.options.progress_interval,
            )
        });

        let (done_tx, done_rx) = bounded::<()>(0);
        let result = thread::scope(|s| {
            if let Some(reporter) = &reporter {
                let done_rx = &done_rx;
                s.spawn(move || reporter.run(done_rx, &self.cancel));
            }

            let result = self.drive(root, &walker, collector.as_ref(), now, s);
            drop(done_tx);
            result
        });

        result?;

        let statistics = collector.into_statistics();
        debug_assert_eq!(statistics.extension_total(), statistics.total_files);
        debug_assert_eq!(statistics.size_bucket_total(), statistics.total_files);
        if let Some(reporter) = &reporter {
            reporter.finish();
        }

        let outcome = ScanOutcome {
            statistics,
            skipped: self.progress.skipped(),
            elapsed: started.elapsed(),
        };
        info!(
            files = outcome.statistics.total_files,
            dirs = outcome.statistics.total_dirs,
            skipped = outcome.skipped,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "scan complete"
        );
        Ok(outcome)
    }

    fn drive<'scope, 'env>(
        &'env self,
        root: &'env Path,
        walker: &'env Walker,
        collector: &'env dyn Collector,
        now: SystemTime,
        s: &'scope thread::Scope<'scope, 'env>,
    ) -> Result<(), ScanError> {
        info!(root = %root.display(), workers = self.workers, "counting files");
        let total = walker.count_files(root, &self.cancel);
        if self.cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        self.progress.set_total(total);
        info!(total, "walking tree");

        let capacity = self
            .workers
            .saturating_mul(CHANNEL_CAPACITY_MULTIPLIER)
            .max(MIN_CHANNEL_CAPACITY);
        let (paths_tx, paths_rx) = bounded::<PendingNode>(capacity);

        let handles: Vec<_> = (0..self.workers)
            .map(|id| {
                let rx = paths_rx.clone();
                s.spawn(move || run_worker(id, rx, collector, &self.cancel, &self.progress, now))
            })
            .collect();
        drop(paths_rx);

        let mut first_error = None;
        let produced = walker.produce(root, &paths_tx, &self.cancel, &self.progress);
        drop(paths_tx);
        if let Err(err) = produced {
            self.cancel.cancel();
            first_error = Some(err);
        }

        for (id, handle) in handles.into_iter().enumerate() {
            let joined = handle.join().unwrap_or(Err(ScanError::WorkerPanicked(id)));
            if let Err(err) = joined {
                self.cancel.cancel();
                first_error = match first_error {
                    Some(existing) if !existing.is_cancelled() => Some(existing),
                    _ => Some(err),
                };
            }
        }

        match first_error {
            Some(err) => Err(err),
            None if self.cancel.is_cancelled() => Err(ScanError::Cancelled),
            None => Ok(()),
        }
    }
}

/// Drains the path channel until it closes or the run is cancelled.
fn run_worker(
    id: usize,
    paths: Receiver<PendingNode>,
    collector: &dyn Collector,
    cancel: &CancelToken,
    progress: &ProgressState,
    now: SystemTime,
) -> Result<(), ScanError> {
    loop {
        select! {
            recv(paths) -> msg => match msg {
                Ok(node) => {
                    match observe(&node, now) {
                        Some(observation) => collector.merge(id, observation),
                        None => progress.record_skipped(),
                    }
                    if !node.is_dir {
                        progress.record_processed();
                    }
                }
                Err(_) => return Ok(()),
            },
            recv(cancel.signal()) -> _ => return Err(ScanError::Cancelled),
        }
    }
}

/// Stats one node and classifies it. Only the scan root follows a symlink.
/// `None` means the node vanished or cannot be read; it is skipped.
fn observe(node: &PendingNode, now: SystemTime) -> Option<Observation> {
    let stat = if node.depth == 0 {
        fs::metadata(&node.path)
    } else {
        fs::symlink_metadata(&node.path)
    };
    let metadata = match stat {
        Ok(metadata) => metadata,
        Err(err) => {
            debug!(path = %node.path.display(), error = %err, "skipping node");
            return None;
        }
    };
    let mode = mode_bits(&metadata);

    if metadata.is_dir() {
        let empty = is_empty_dir(&node.path);
        return Some(Observation::Dir(classify::classify_dir(
            node.path.clone(),
            node.depth,
            mode,
            empty,
        )));
    }

    let facts = FileFacts {
        path: node.path.clone(),
        size: metadata.len(),
        mode,
        is_symlink: metadata.file_type().is_symlink(),
        modified: metadata.modified().ok(),
        accessed: metadata.accessed().ok(),
    };
    Some(Observation::File(classify::classify_file(facts, now)))
}

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

#[cfg(unix)]
fn mode_bits(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

#[cfg(not(unix))]
fn mode_bits(metadata: &fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}
