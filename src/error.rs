//! Error types for madaa.
//!
//! Only pipeline-fatal conditions live here. Per-node I/O failures are
//! skipped and counted, never surfaced as errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    /// The scan root cannot be stat'ed
    #[error("cannot open scan root {}: {source}", .path.display())]
    Root {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The root directory itself cannot be read
    #[error("cannot read scan root {}: {source}", .path.display())]
    RootWalk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// The shared cancellation signal fired
    #[error("scan cancelled")]
    Cancelled,

    /// Every worker went away before the walk finished
    #[error("path channel closed before the walk finished")]
    ChannelClosed,

    #[error("worker {0} panicked")]
    WorkerPanicked(usize),
}

impl ScanError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScanError::Cancelled)
    }
}
