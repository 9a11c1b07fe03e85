//! Pure classification of file metadata into the dimensions the aggregate tracks.
//!
//! Nothing in here touches the filesystem or the clock: every function takes
//! the reference instant explicitly, so the same inputs always land in the
//! same buckets no matter which worker classifies them or in what order.

use crate::types::{DirObservation, FileObservation};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Modified within this window counts as recent (30 x 24h, not calendar aware).
pub const RECENT_WINDOW: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Not modified within this window counts as stale (~6 months as 180 x 24h).
pub const STALE_WINDOW: Duration = Duration::from_secs(180 * 24 * 60 * 60);

pub const NO_EXTENSION: &str = "no extension";

const SYSTEM_FILES: &[&str] = &[
    "thumbs.db",
    "desktop.ini",
    ".ds_store",
    "hiberfil.sys",
    "pagefile.sys",
    "swapfile.sys",
    "system volume information",
    "recycler",
    "$recycle.bin",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeBucket {
    Tiny,
    Small,
    Medium,
    Large,
}

impl SizeBucket {
    pub const ALL: [SizeBucket; 4] = [
        SizeBucket::Tiny,
        SizeBucket::Small,
        SizeBucket::Medium,
        SizeBucket::Large,
    ];

    /// Half-open thresholds: `< 1 KiB`, `< 1 MiB`, `< 100 MiB`, the rest.
    pub fn of(size: u64) -> Self {
        if size < KIB {
            SizeBucket::Tiny
        } else if size < MIB {
            SizeBucket::Small
        } else if size < 100 * MIB {
            SizeBucket::Medium
        } else {
            SizeBucket::Large
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SizeBucket::Tiny => "tiny",
            SizeBucket::Small => "small",
            SizeBucket::Medium => "medium",
            SizeBucket::Large => "large",
        }
    }
}

impl fmt::Display for SizeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How recently a node was last accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessBucket {
    Week,
    Month,
    Quarter,
    Older,
}

impl AccessBucket {
    pub const ALL: [AccessBucket; 4] = [
        AccessBucket::Week,
        AccessBucket::Month,
        AccessBucket::Quarter,
        AccessBucket::Older,
    ];

    pub fn of(age: Duration) -> Self {
        if age <= 7 * DAY {
            AccessBucket::Week
        } else if age <= 30 * DAY {
            AccessBucket::Month
        } else if age <= 90 * DAY {
            AccessBucket::Quarter
        } else {
            AccessBucket::Older
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AccessBucket::Week => "within 7 days",
            AccessBucket::Month => "within 30 days",
            AccessBucket::Quarter => "within 90 days",
            AccessBucket::Older => "older",
        }
    }
}

impl fmt::Display for AccessBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionClass {
    Executable,
    ReadOnly,
}

impl PermissionClass {
    pub const ALL: [PermissionClass; 2] = [PermissionClass::Executable, PermissionClass::ReadOnly];

    pub fn label(self) -> &'static str {
        match self {
            PermissionClass::Executable => "executable",
            PermissionClass::ReadOnly => "read-only",
        }
    }
}

impl fmt::Display for PermissionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpecialFlags {
    pub hidden: bool,
    pub system: bool,
    pub symlink: bool,
    pub write_protected: bool,
    pub executable: bool,
}

/// Splits a filename at its last `.`; everything after it is the extension.
///
/// A leading dot is not special: `.bashrc` has an empty stem and the
/// extension `bashrc`.
fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(dot) => (&file_name[..dot], &file_name[dot + 1..]),
        None => (file_name, ""),
    }
}

/// Splits a filename (extension stripped) on `,` `_` `-` `.` and whitespace,
/// returning lower-cased tokens of at least two bytes.
pub fn tokenize(file_name: &str) -> Vec<String> {
    let (stem, _) = split_extension(file_name);

    stem.split(|c: char| matches!(c, ',' | '_' | '-' | '.') || c.is_whitespace())
        .filter(|token| token.len() >= 2)
        .map(|token| token.to_lowercase())
        .collect()
}

/// Lower-cased extension without the dot, or [`NO_EXTENSION`].
pub fn normalize_extension(file_name: &str) -> String {
    match split_extension(file_name) {
        (_, "") => NO_EXTENSION.to_string(),
        (_, ext) => ext.to_lowercase(),
    }
}

/// Age of `timestamp` at `now`; timestamps in the future are age zero.
pub fn age(timestamp: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(timestamp).unwrap_or(Duration::ZERO)
}

pub fn is_recent(modified: SystemTime, now: SystemTime) -> bool {
    age(modified, now) <= RECENT_WINDOW
}

pub fn is_stale(modified: SystemTime, now: SystemTime) -> bool {
    age(modified, now) > STALE_WINDOW
}

/// `None` when the platform did not report an access time.
pub fn access_bucket(accessed: Option<SystemTime>, now: SystemTime) -> Option<AccessBucket> {
    accessed.map(|at| AccessBucket::of(age(at, now)))
}

pub fn modification_year(modified: SystemTime) -> i32 {
    DateTime::<Utc>::from(modified).year()
}

pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

pub fn is_system_file(name: &str) -> bool {
    let lowered = name.to_lowercase();
    SYSTEM_FILES.contains(&lowered.as_str())
}

/// Derives the special-file flags from a node's name and unix mode bits.
pub fn special_flags(name: &str, mode: u32, is_symlink: bool) -> SpecialFlags {
    SpecialFlags {
        hidden: is_hidden(name),
        system: is_system_file(name),
        symlink: is_symlink,
        write_protected: mode & 0o200 == 0,
        executable: mode & 0o111 != 0,
    }
}

pub fn permission_classes(flags: &SpecialFlags) -> Vec<PermissionClass> {
    let mut classes = Vec::with_capacity(2);
    if flags.executable {
        classes.push(PermissionClass::Executable);
    }
    if flags.write_protected {
        classes.push(PermissionClass::ReadOnly);
    }
    classes
}

/// Raw metadata for one non-directory node, as read by a worker.
#[derive(Debug, Clone)]
pub struct FileFacts {
    pub path: PathBuf,
    pub size: u64,
    pub mode: u32,
    pub is_symlink: bool,
    pub modified: Option<SystemTime>,
    pub accessed: Option<SystemTime>,
}

pub fn classify_file(facts: FileFacts, now: SystemTime) -> FileObservation {
    let name = file_name(&facts.path);
    let flags = special_flags(&name, facts.mode, facts.is_symlink);

    FileObservation {
        parent: facts.path.parent().map(Path::to_path_buf),
        extension: normalize_extension(&name),
        size: facts.size,
        words: tokenize(&name),
        size_bucket: SizeBucket::of(facts.size),
        permissions: permission_classes(&flags),
        recent: facts.modified.is_some_and(|m| is_recent(m, now)),
        stale: facts.modified.is_some_and(|m| is_stale(m, now)),
        access: access_bucket(facts.accessed, now),
        modified: facts.modified,
        modified_year: facts.modified.map(modification_year),
        flags,
        path: facts.path,
    }
}

pub fn classify_dir(path: PathBuf, depth: usize, mode: u32, empty: bool) -> DirObservation {
    let name = file_name(&path);
    DirObservation {
        flags: special_flags(&name, mode, false),
        path,
        depth,
        empty,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    #[test]
    fn test_tokenize_strips_extension_and_splits() {
        let tokens = tokenize("My_Report-2023.final.txt");
        assert_eq!(tokens, vec!["my", "report", "2023", "final"]);
    }

    #[test]
    fn test_tokenize_drops_short_tokens() {
        assert_eq!(tokenize("a_b-cd,e f.txt"), vec!["cd"]);
        assert!(tokenize("x.rs").is_empty());
    }

    #[test]
    fn test_tokenize_dotfile_has_no_stem() {
        assert!(tokenize(".bashrc").is_empty());
        assert_eq!(tokenize(".hidden_notes.txt"), vec!["hidden", "notes"]);
    }

    #[test]
    fn test_tokenize_counts_bytes_not_chars() {
        assert_eq!(tokenize("é_ü_ab.txt"), vec!["é", "ü", "ab"]);
    }

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension("Photo.JPG"), "jpg");
        assert_eq!(normalize_extension("archive.tar.gz"), "gz");
        assert_eq!(normalize_extension("Makefile"), NO_EXTENSION);
        assert_eq!(normalize_extension("trailing."), NO_EXTENSION);
    }

    #[test]
    fn test_normalize_extension_of_dotfile_is_whole_name() {
        assert_eq!(normalize_extension(".bashrc"), "bashrc");
        assert_eq!(normalize_extension(".GitIgnore"), "gitignore");
    }

    #[test]
    fn test_size_bucket_boundaries_are_half_open() {
        assert_eq!(SizeBucket::of(0), SizeBucket::Tiny);
        assert_eq!(SizeBucket::of(1023), SizeBucket::Tiny);
        assert_eq!(SizeBucket::of(1024), SizeBucket::Small);
        assert_eq!(SizeBucket::of(MIB - 1), SizeBucket::Small);
        assert_eq!(SizeBucket::of(MIB), SizeBucket::Medium);
        assert_eq!(SizeBucket::of(100 * MIB - 1), SizeBucket::Medium);
        assert_eq!(SizeBucket::of(100 * MIB), SizeBucket::Large);
    }

    #[test]
    fn test_recent_and_stale_windows() {
        let now = now();
        assert!(is_recent(now - RECENT_WINDOW, now));
        assert!(!is_recent(now - RECENT_WINDOW - Duration::from_secs(1), now));

        assert!(!is_stale(now - STALE_WINDOW, now));
        assert!(is_stale(now - STALE_WINDOW - Duration::from_secs(1), now));
    }

    #[test]
    fn test_future_timestamps_are_recent() {
        let now = now();
        let future = now + Duration::from_secs(3600);
        assert!(is_recent(future, now));
        assert!(!is_stale(future, now));
    }

    #[test]
    fn test_access_buckets() {
        let now = now();
        assert_eq!(access_bucket(None, now), None);
        assert_eq!(access_bucket(Some(now - 7 * DAY), now), Some(AccessBucket::Week));
        assert_eq!(access_bucket(Some(now - 8 * DAY), now), Some(AccessBucket::Month));
        assert_eq!(access_bucket(Some(now - 90 * DAY), now), Some(AccessBucket::Quarter));
        assert_eq!(access_bucket(Some(now - 91 * DAY), now), Some(AccessBucket::Older));
    }

    #[test]
    fn test_modification_year() {
        // 1_700_000_000 is 2023-11-14 in UTC
        assert_eq!(modification_year(now()), 2023);
        assert_eq!(modification_year(SystemTime::UNIX_EPOCH), 1970);
    }

    #[test]
    fn test_system_files_match_case_insensitively() {
        assert!(is_system_file("Thumbs.db"));
        assert!(is_system_file(".DS_Store"));
        assert!(is_system_file("System Volume Information"));
        assert!(is_system_file("$RECYCLE.BIN"));
        assert!(!is_system_file("thumbs.db.bak"));
    }

    #[test]
    fn test_special_flags_from_mode() {
        let flags = special_flags(".hidden.sh", 0o555, false);
        assert!(flags.hidden);
        assert!(flags.write_protected);
        assert!(flags.executable);
        assert_eq!(
            permission_classes(&flags),
            vec![PermissionClass::Executable, PermissionClass::ReadOnly]
        );

        let flags = special_flags("notes.txt", 0o644, true);
        assert!(!flags.hidden);
        assert!(flags.symlink);
        assert!(!flags.write_protected);
        assert!(permission_classes(&flags).is_empty());
    }

    #[test]
    fn test_classify_file() {
        let now = now();
        let obs = classify_file(
            FileFacts {
                path: PathBuf::from("/data/Q3_sales-report.CSV"),
                size: 2048,
                mode: 0o644,
                is_symlink: false,
                modified: Some(now - 2 * DAY),
                accessed: None,
            },
            now,
        );

        assert_eq!(obs.extension, "csv");
        assert_eq!(obs.parent, Some(PathBuf::from("/data")));
        assert_eq!(obs.words, vec!["q3", "sales", "report"]);
        assert_eq!(obs.size_bucket, SizeBucket::Small);
        assert!(obs.recent);
        assert!(!obs.stale);
        assert_eq!(obs.access, None);
        assert_eq!(obs.modified_year, Some(2023));
    }

    #[test]
    fn test_classify_file_without_timestamps() {
        let obs = classify_file(
            FileFacts {
                path: PathBuf::from("empty"),
                size: 0,
                mode: 0o644,
                is_symlink: false,
                modified: None,
                accessed: None,
            },
            now(),
        );
        assert!(!obs.recent);
        assert!(!obs.stale);
        assert_eq!(obs.modified_year, None);
    }

    #[test]
    fn test_classification_is_deterministic_across_threads() {
        let now = now();
        let facts: Vec<FileFacts> = (0..64u64)
            .map(|i| FileFacts {
                path: PathBuf::from(format!("/t/file_{i}-part.{}", ["rs", "md", "bin"][i as usize % 3])),
                size: i * 37_123,
                mode: if i % 2 == 0 { 0o755 } else { 0o444 },
                is_symlink: i % 5 == 0,
                modified: Some(now - Duration::from_secs(i * 86_400 * 7)),
                accessed: Some(now - Duration::from_secs(i * 86_400 * 3)),
            })
            .collect();

        let sequential: Vec<FileObservation> =
            facts.iter().cloned().map(|f| classify_file(f, now)).collect();

        let reversed: Vec<FileObservation> = std::thread::scope(|s| {
            let handles: Vec<_> = facts
                .iter()
                .rev()
                .cloned()
                .map(|f| s.spawn(move || classify_file(f, now)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut reversed = reversed;
        reversed.reverse();
        assert_eq!(sequential, reversed);
    }
}
