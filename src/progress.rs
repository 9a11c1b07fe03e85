use crate::cancel::CancelToken;
use crate::types::ProgressSnapshot;
use crossbeam_channel::{select, tick, Receiver, Sender, TrySendError};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// Shared progress counters.
///
/// `total` is written once by the walker after its count pass, `processed`
/// is bumped by workers once per file. `skipped` counts nodes that could
/// not be walked or stat'ed.
#[derive(Debug, Default)]
pub struct ProgressState {
    processed: AtomicU64,
    total: AtomicU64,
    skipped: AtomicU64,
}

impl ProgressState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Release);
    }

    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            processed: self.processed(),
            total: self.total(),
        }
    }
}

/// Periodically samples [`ProgressState`] and pushes snapshots to an observer.
///
/// Emission never blocks: when the observer channel is full the tick is
/// dropped. The terminal snapshot is the exception and always lands, by
/// draining one stale snapshot from the channel if it has to.
pub struct ProgressReporter {
    state: Arc<ProgressState>,
    observer: Sender<ProgressSnapshot>,
    backlog: Receiver<ProgressSnapshot>,
    interval: Duration,
}

impl ProgressReporter {
    /// `backlog` must be a receiver of the same channel as `observer`.
    pub fn new(
        state: Arc<ProgressState>,
        observer: Sender<ProgressSnapshot>,
        backlog: Receiver<ProgressSnapshot>,
        interval: Duration,
    ) -> Self {
        Self {
            state,
            observer,
            backlog,
            interval,
        }
    }

    /// Samples on every tick until `done` disconnects or `cancel` fires.
    pub fn run(&self, done: &Receiver<()>, cancel: &CancelToken) {
        let ticker = tick(self.interval);
        loop {
            select! {
                recv(ticker) -> _ => {
                    self.emit(self.state.snapshot());
                }
                recv(done) -> _ => break,
                recv(cancel.signal()) -> _ => break,
            }
        }
    }

    /// Best-effort emit; returns false when the snapshot was dropped.
    pub fn emit(&self, snapshot: ProgressSnapshot) -> bool {
        match self.observer.try_send(snapshot) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                trace!(
                    percent = snapshot.percent(),
                    "progress observer busy, dropping tick"
                );
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Emits the terminal snapshot with `processed == total`.
    pub fn finish(&self) -> ProgressSnapshot {
        let total = self.state.total().max(self.state.processed());
        let last = ProgressSnapshot {
            processed: total,
            total,
        };

        if !self.emit(last) {
            let _ = self.backlog.try_recv();
            self.emit(last);
        }
        last
    }
}

/// Terminal progress bar fed by the observer channel.
pub struct ProgressDisplay {
    bar: ProgressBar,
}

impl ProgressDisplay {
    pub fn new(enabled: bool) -> Self {
        if !enabled {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }

        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%)")
        {
            bar.set_style(style.progress_chars("█▓░"));
        }

        Self { bar }
    }

    /// Renders snapshots until the channel disconnects.
    pub fn follow(&self, snapshots: Receiver<ProgressSnapshot>) {
        for snapshot in snapshots {
            self.update(snapshot);
        }
        self.bar.finish_and_clear();
    }

    pub fn update(&self, snapshot: ProgressSnapshot) {
        self.bar.set_length(snapshot.total.max(snapshot.processed));
        self.bar.set_position(snapshot.processed);
    }
}
