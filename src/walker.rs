use crate::cancel::CancelToken;
use crate::error::ScanError;
use crate::progress::ProgressState;
use crossbeam_channel::{select, Sender};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// A node discovered by the walker, waiting for a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNode {
    pub path: PathBuf,
    pub depth: usize,
    pub is_dir: bool,
}

/// Two-pass tree walker: a parallel count of file nodes for the progress
/// denominator, then a sequential traversal feeding the path channel.
///
/// Symlinks are never followed. Both passes apply the same depth limit and
/// exclusion patterns so the count matches what the producer emits.
pub struct Walker {
    threads: usize,
    max_depth: Option<usize>,
    exclude_patterns: Vec<String>,
}

impl Walker {
    pub fn new(threads: usize, max_depth: Option<usize>, exclude_patterns: Vec<String>) -> Self {
        Self {
            threads: threads.max(1),
            max_depth,
            exclude_patterns,
        }
    }

    /// Counts non-directory nodes under `root`. Errors are swallowed: the
    /// result is a best-effort estimate used only for progress percentages.
    pub fn count_files(&self, root: &Path, cancel: &CancelToken) -> u64 {
        // jwalk does not follow a symlinked root, walkdir does
        let walk_root = resolve_root(root);
        let mut walker = jwalk::WalkDir::new(&walk_root)
            .follow_links(false)
            .skip_hidden(false)
            .parallelism(jwalk::Parallelism::RayonNewPool(self.threads));

        if let Some(depth) = self.max_depth {
            walker = walker.max_depth(depth);
        }

        walker
            .into_iter()
            .take_while(|_| !cancel.is_cancelled())
            .filter_map(Result::ok)
            .filter(|entry| !entry.file_type().is_dir())
            .filter(|entry| {
                let path = entry.path();
                match path.strip_prefix(&walk_root) {
                    Ok(relative) => !self.is_excluded(&root.join(relative)),
                    Err(_) => !self.is_excluded(&path),
                }
            })
            .count() as u64
    }

    /// Walks `root` and sends every node into `paths`.
    ///
    /// Per-node failures are logged, counted in `progress` and skipped. A
    /// failure on the root itself is fatal. Cancellation aborts the walk at
    /// the next send.
    pub fn produce(
        &self,
        root: &Path,
        paths: &Sender<PendingNode>,
        cancel: &CancelToken,
        progress: &ProgressState,
    ) -> Result<u64, ScanError> {
        let mut walker = WalkDir::new(root).follow_links(false);
        if let Some(depth) = self.max_depth {
            walker = walker.max_depth(depth);
        }

        let mut sent = 0u64;
        for entry in walker.into_iter().filter_entry(|e| !self.is_excluded(e.path())) {
            if cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    return Err(ScanError::RootWalk {
                        path: root.to_path_buf(),
                        source: err,
                    });
                }
                Err(err) => {
                    debug!(
                        path = %err.path().map(|p| p.display().to_string()).unwrap_or_default(),
                        error = %err,
                        "skipping unreadable entry"
                    );
                    progress.record_skipped();
                    continue;
                }
            };

            let node = PendingNode {
                is_dir: entry.file_type().is_dir(),
                depth: entry.depth(),
                path: entry.into_path(),
            };

            select! {
                send(paths, node) -> sent_ok => {
                    if sent_ok.is_err() {
                        return Err(ScanError::ChannelClosed);
                    }
                }
                recv(cancel.signal()) -> _ => return Err(ScanError::Cancelled),
            }
            sent += 1;
        }

        Ok(sent)
    }

    fn is_excluded(&self, path: &Path) -> bool {
        if self.exclude_patterns.is_empty() {
            return false;
        }

        let path_str = path.to_string_lossy();
        self.exclude_patterns
            .iter()
            .any(|pattern| path_str.contains(pattern.as_str()))
    }
}

/// The directory a symlinked root points at, or `root` itself.
fn resolve_root(root: &Path) -> PathBuf {
    let is_link = fs::symlink_metadata(root)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false);
    if is_link && root.is_dir() {
        fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf())
    } else {
        root.to_path_buf()
    }
}
