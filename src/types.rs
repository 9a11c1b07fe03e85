use crate::classify::{AccessBucket, PermissionClass, SizeBucket, SpecialFlags};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::SystemTime;

/// One classified filesystem node, handed to the aggregate's merge step.
#[derive(Debug, Clone)]
pub enum Observation {
    File(FileObservation),
    Dir(DirObservation),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileObservation {
    pub path: PathBuf,
    pub parent: Option<PathBuf>,
    pub extension: String,
    pub size: u64,
    pub words: Vec<String>,
    pub size_bucket: SizeBucket,
    pub permissions: Vec<PermissionClass>,
    pub recent: bool,
    pub stale: bool,
    pub access: Option<AccessBucket>,
    pub modified: Option<SystemTime>,
    pub modified_year: Option<i32>,
    pub flags: SpecialFlags,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirObservation {
    pub path: PathBuf,
    pub depth: usize,
    pub empty: bool,
    pub flags: SpecialFlags,
}

/// A file with its size, ordered by size for use in BoundedMinHeap.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LargeFile {
    pub path: PathBuf,
    pub size: u64,
    pub extension: String,
}

impl Ord for LargeFile {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.size.cmp(&other.size)
    }
}

impl PartialOrd for LargeFile {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Oldest or newest file by modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extremum {
    pub path: PathBuf,
    pub modified: SystemTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub processed: u64,
    pub total: u64,
}

impl ProgressSnapshot {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.processed as f64 / self.total as f64) * 100.0
    }
}

// Report shapes handed to the renderers.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub scanned_path: String,
    pub totals: Totals,
    pub disk_usage: Option<DiskUsage>,
    pub top_words: Vec<Ranked>,
    pub types_by_count: Vec<TypeShare>,
    pub types_by_size: Vec<TypeShare>,
    pub categories: Vec<Bucket>,
    pub permissions: Vec<Ranked>,
    pub size_buckets: Vec<Ranked>,
    pub access_buckets: Vec<Ranked>,
    pub modification_years: Vec<Ranked>,
    pub activity: Activity,
    pub special: SpecialCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest: Option<DatedFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest: Option<DatedFile>,
    pub deepest_dirs: Vec<DirEntry>,
    pub busiest_dirs: Vec<DirEntry>,
    pub largest_files: Vec<FileEntry>,
    pub largest_by_type: BTreeMap<String, Vec<FileEntry>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Totals {
    pub total_bytes: u64,
    pub file_count: u64,
    pub dir_count: u64,
    pub skipped_paths: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskUsage {
    pub total_space: u64,
    pub available_space: u64,
    pub used_space: u64,
    pub used_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ranked {
    pub key: String,
    pub count: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeShare {
    pub extension: String,
    pub file_count: u64,
    pub bytes: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bucket {
    pub key: String,
    pub bytes: u64,
    pub percent: f64,
    pub file_count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Activity {
    pub recent_files: u64,
    pub stale_files: u64,
    pub empty_files: u64,
    pub empty_dirs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpecialCounts {
    pub hidden: u64,
    pub system: u64,
    pub symlinks: u64,
    pub write_protected: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatedFile {
    pub path: String,
    pub modified: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub bytes: u64,
    pub extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirEntry {
    pub path: String,
    pub depth: usize,
    pub file_count: u64,
}
