use crate::bounded_heap::BoundedMinHeap;
use crate::classify::{AccessBucket, PermissionClass, SizeBucket, SpecialFlags};
use crate::types::{DirObservation, Extremum, FileObservation, LargeFile, Observation};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// The statistics aggregate for one scan.
///
/// Every field changes only through [`Statistics::merge`] (or
/// [`Statistics::absorb`] when shards are combined). Once the pipeline has
/// joined its workers the value is handed out read-only.
#[derive(Debug, Clone)]
pub struct Statistics {
    pub total_files: u64,
    pub total_dirs: u64,
    pub total_size: u64,
    pub recent_files: u64,
    pub stale_files: u64,
    pub empty_files: u64,
    pub empty_dirs: u64,
    pub hidden: u64,
    pub system: u64,
    pub symlinks: u64,
    pub write_protected: u64,

    pub word_freq: HashMap<String, u64>,
    pub type_freq: HashMap<String, u64>,
    pub type_sizes: HashMap<String, u64>,
    pub permissions: BTreeMap<PermissionClass, u64>,
    pub size_buckets: BTreeMap<SizeBucket, u64>,
    pub access_buckets: BTreeMap<AccessBucket, u64>,
    pub modification_years: BTreeMap<i32, u64>,
    pub dir_depths: HashMap<PathBuf, usize>,
    pub dir_file_counts: HashMap<PathBuf, u64>,

    pub largest: BoundedMinHeap<LargeFile>,
    pub largest_by_type: HashMap<String, BoundedMinHeap<LargeFile>>,

    pub oldest: Option<Extremum>,
    pub newest: Option<Extremum>,

    top_n: usize,
}

impl Statistics {
    /// Creates an empty aggregate whose Top-K trackers keep `top_n` files.
    pub fn new(top_n: usize) -> Self {
        Self {
            total_files: 0,
            total_dirs: 0,
            total_size: 0,
            recent_files: 0,
            stale_files: 0,
            empty_files: 0,
            empty_dirs: 0,
            hidden: 0,
            system: 0,
            symlinks: 0,
            write_protected: 0,
            word_freq: HashMap::new(),
            type_freq: HashMap::new(),
            type_sizes: HashMap::new(),
            permissions: BTreeMap::new(),
            size_buckets: BTreeMap::new(),
            access_buckets: BTreeMap::new(),
            modification_years: BTreeMap::new(),
            dir_depths: HashMap::new(),
            dir_file_counts: HashMap::new(),
            largest: BoundedMinHeap::new(top_n),
            largest_by_type: HashMap::new(),
            oldest: None,
            newest: None,
            top_n,
        }
    }

    /// Folds one classified node into the aggregate.
    ///
    /// Runs inside the collector's critical section, so it only touches
    /// memory: no I/O and nothing that can block.
    pub fn merge(&mut self, observation: Observation) {
        match observation {
            Observation::File(file) => self.merge_file(file),
            Observation::Dir(dir) => self.merge_dir(dir),
        }
    }

    fn merge_file(&mut self, file: FileObservation) {
        self.total_files += 1;
        self.total_size += file.size;
        self.count_flags(&file.flags);

        for word in file.words {
            *self.word_freq.entry(word).or_insert(0) += 1;
        }
        *self.type_freq.entry(file.extension.clone()).or_insert(0) += 1;
        *self.type_sizes.entry(file.extension.clone()).or_insert(0) += file.size;
        for class in file.permissions {
            *self.permissions.entry(class).or_insert(0) += 1;
        }
        *self.size_buckets.entry(file.size_bucket).or_insert(0) += 1;

        if file.recent {
            self.recent_files += 1;
        }
        if file.stale {
            self.stale_files += 1;
        }
        if file.size == 0 {
            self.empty_files += 1;
        }
        if let Some(bucket) = file.access {
            *self.access_buckets.entry(bucket).or_insert(0) += 1;
        }
        if let Some(year) = file.modified_year {
            *self.modification_years.entry(year).or_insert(0) += 1;
        }
        if let Some(parent) = file.parent {
            *self.dir_file_counts.entry(parent).or_insert(0) += 1;
        }

        if let Some(modified) = file.modified {
            self.observe_extremes(&file.path, modified);
        }

        let item = LargeFile {
            path: file.path,
            size: file.size,
            extension: file.extension,
        };
        let top_n = self.top_n;
        let per_type = self
            .largest_by_type
            .entry(item.extension.clone())
            .or_insert_with(|| BoundedMinHeap::new(top_n));
        if per_type.admits(&item) {
            per_type.offer(item.clone());
        }
        self.largest.offer(item);
    }

    fn merge_dir(&mut self, dir: DirObservation) {
        self.total_dirs += 1;
        self.count_flags(&dir.flags);
        if dir.empty {
            self.empty_dirs += 1;
        }
        self.dir_file_counts.entry(dir.path.clone()).or_insert(0);
        self.dir_depths.insert(dir.path, dir.depth);
    }

    fn count_flags(&mut self, flags: &SpecialFlags) {
        if flags.hidden {
            self.hidden += 1;
        }
        if flags.system {
            self.system += 1;
        }
        if flags.symlink {
            self.symlinks += 1;
        }
        if flags.write_protected {
            self.write_protected += 1;
        }
    }

    // Strict comparisons: on equal timestamps the first record stays.
    fn observe_extremes(&mut self, path: &std::path::Path, modified: std::time::SystemTime) {
        if self.oldest.as_ref().map_or(true, |o| modified < o.modified) {
            self.oldest = Some(Extremum {
                path: path.to_path_buf(),
                modified,
            });
        }
        if self.newest.as_ref().map_or(true, |n| modified > n.modified) {
            self.newest = Some(Extremum {
                path: path.to_path_buf(),
                modified,
            });
        }
    }

    /// Combines another aggregate (typically a worker shard) into this one.
    pub fn absorb(&mut self, other: Statistics) {
        self.total_files += other.total_files;
        self.total_dirs += other.total_dirs;
        self.total_size += other.total_size;
        self.recent_files += other.recent_files;
        self.stale_files += other.stale_files;
        self.empty_files += other.empty_files;
        self.empty_dirs += other.empty_dirs;
        self.hidden += other.hidden;
        self.system += other.system;
        self.symlinks += other.symlinks;
        self.write_protected += other.write_protected;

        sum_into(&mut self.word_freq, other.word_freq);
        sum_into(&mut self.type_freq, other.type_freq);
        sum_into(&mut self.type_sizes, other.type_sizes);
        sum_into(&mut self.permissions, other.permissions);
        sum_into(&mut self.size_buckets, other.size_buckets);
        sum_into(&mut self.access_buckets, other.access_buckets);
        sum_into(&mut self.modification_years, other.modification_years);
        sum_into(&mut self.dir_file_counts, other.dir_file_counts);
        self.dir_depths.extend(other.dir_depths);

        self.largest.absorb(other.largest);
        for (extension, heap) in other.largest_by_type {
            match self.largest_by_type.get_mut(&extension) {
                Some(existing) => existing.absorb(heap),
                None => {
                    self.largest_by_type.insert(extension, heap);
                }
            }
        }

        if let Some(oldest) = other.oldest {
            self.observe_extremes(&oldest.path, oldest.modified);
        }
        if let Some(newest) = other.newest {
            self.observe_extremes(&newest.path, newest.modified);
        }
    }

    /// Sum of the extension frequency counts; equals `total_files`.
    pub fn extension_total(&self) -> u64 {
        self.type_freq.values().sum()
    }

    /// Sum of the size-bucket counts; equals `total_files`.
    pub fn size_bucket_total(&self) -> u64 {
        self.size_buckets.values().sum()
    }
}

fn sum_into<K, M>(target: &mut M, source: M)
where
    M: IntoIterator<Item = (K, u64)> + MapEntry<K>,
{
    for (key, value) in source {
        *target.slot(key) += value;
    }
}

/// Minimal entry access shared by `HashMap` and `BTreeMap`.
trait MapEntry<K> {
    fn slot(&mut self, key: K) -> &mut u64;
}

impl<K: std::hash::Hash + Eq> MapEntry<K> for HashMap<K, u64> {
    fn slot(&mut self, key: K) -> &mut u64 {
        self.entry(key).or_insert(0)
    }
}

impl<K: Ord> MapEntry<K> for BTreeMap<K, u64> {
    fn slot(&mut self, key: K) -> &mut u64 {
        self.entry(key).or_insert(0)
    }
}

/// Where workers deliver their observations.
///
/// `worker` identifies the calling worker so implementations can route
/// merges to a per-worker shard; a single-lock collector ignores it.
pub trait Collector: Send + Sync {
    fn merge(&self, worker: usize, observation: Observation);

    /// Consumes the collector once every worker has been joined.
    fn into_statistics(self: Box<Self>) -> Statistics;
}

/// One aggregate behind one lock; every merge serializes on it.
pub struct LockedCollector {
    inner: Mutex<Statistics>,
}

impl LockedCollector {
    pub fn new(top_n: usize) -> Self {
        Self {
            inner: Mutex::new(Statistics::new(top_n)),
        }
    }
}

impl Collector for LockedCollector {
    fn merge(&self, _worker: usize, observation: Observation) {
        self.inner.lock().merge(observation);
    }

    fn into_statistics(self: Box<Self>) -> Statistics {
        self.inner.into_inner()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::classify::{classify_dir, classify_file, FileFacts};
    use std::time::{Duration, SystemTime};

    pub(crate) fn reference_now() -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    pub(crate) fn file(path: &str, size: u64, days_old: u64) -> Observation {
        let now = reference_now();
        Observation::File(classify_file(
            FileFacts {
                path: PathBuf::from(path),
                size,
                mode: 0o644,
                is_symlink: false,
                modified: Some(now - Duration::from_secs(days_old * 86_400)),
                accessed: Some(now - Duration::from_secs(days_old * 86_400)),
            },
            now,
        ))
    }

    pub(crate) fn dir(path: &str, depth: usize, empty: bool) -> Observation {
        Observation::Dir(classify_dir(PathBuf::from(path), depth, 0o755, empty))
    }

    pub(crate) fn sample_observations() -> Vec<Observation> {
        vec![
            dir("/r", 0, false),
            dir("/r/docs", 1, false),
            dir("/r/empty", 1, true),
            file("/r/readme.md", 10, 1),
            file("/r/docs/annual_report-2023.pdf", 2048, 40),
            file("/r/docs/annual_summary.pdf", 5_000_000, 400),
            file("/r/docs/.hidden_notes.txt", 0, 200),
            file("/r/big-video.mp4", 150 * 1024 * 1024, 3),
            file("/r/Makefile", 512, 10),
        ]
    }

    /// Compares everything except the internal order of the Top-K heaps.
    pub(crate) fn assert_same_statistics(a: &Statistics, b: &Statistics) {
        assert_eq!(a.total_files, b.total_files);
        assert_eq!(a.total_dirs, b.total_dirs);
        assert_eq!(a.total_size, b.total_size);
        assert_eq!(a.recent_files, b.recent_files);
        assert_eq!(a.stale_files, b.stale_files);
        assert_eq!(a.empty_files, b.empty_files);
        assert_eq!(a.empty_dirs, b.empty_dirs);
        assert_eq!(a.hidden, b.hidden);
        assert_eq!(a.system, b.system);
        assert_eq!(a.symlinks, b.symlinks);
        assert_eq!(a.write_protected, b.write_protected);
        assert_eq!(a.word_freq, b.word_freq);
        assert_eq!(a.type_freq, b.type_freq);
        assert_eq!(a.type_sizes, b.type_sizes);
        assert_eq!(a.permissions, b.permissions);
        assert_eq!(a.size_buckets, b.size_buckets);
        assert_eq!(a.access_buckets, b.access_buckets);
        assert_eq!(a.modification_years, b.modification_years);
        assert_eq!(a.dir_depths, b.dir_depths);
        assert_eq!(a.dir_file_counts, b.dir_file_counts);

        let sizes = |heap: &BoundedMinHeap<LargeFile>| -> Vec<u64> {
            heap.sorted().into_iter().map(|f| f.size).collect()
        };
        assert_eq!(sizes(&a.largest), sizes(&b.largest));
        assert_eq!(a.largest_by_type.len(), b.largest_by_type.len());
        for (ext, heap) in &a.largest_by_type {
            assert_eq!(sizes(heap), sizes(&b.largest_by_type[ext]), "extension {ext}");
        }
        assert_eq!(a.oldest, b.oldest);
        assert_eq!(a.newest, b.newest);
    }

    #[test]
    fn test_three_file_scenario() {
        let mut stats = Statistics::new(2);
        stats.merge(file("/s/a.txt", 10, 1));
        stats.merge(file("/s/b.txt", 2048, 1));
        stats.merge(file("/s/c.txt", 5_000_000, 1));

        let sizes: Vec<u64> = stats.largest.sorted().iter().map(|f| f.size).collect();
        assert_eq!(sizes, vec![5_000_000, 2048]);

        assert_eq!(stats.size_buckets.get(&SizeBucket::Tiny), Some(&1));
        assert_eq!(stats.size_buckets.get(&SizeBucket::Small), Some(&1));
        assert_eq!(stats.size_buckets.get(&SizeBucket::Medium), Some(&1));
        assert_eq!(stats.size_buckets.get(&SizeBucket::Large), None);
    }

    #[test]
    fn test_merge_invariants() {
        let mut stats = Statistics::new(3);
        for obs in sample_observations() {
            stats.merge(obs);
        }

        assert_eq!(stats.total_files, 6);
        assert_eq!(stats.total_dirs, 3);
        assert_eq!(stats.extension_total(), stats.total_files);
        assert_eq!(stats.size_bucket_total(), stats.total_files);
        assert!(stats.largest.iter().count() <= 3);
        for heap in stats.largest_by_type.values() {
            assert!(heap.iter().count() <= 3);
        }

        assert_eq!(stats.type_freq.get("pdf"), Some(&2));
        assert_eq!(stats.type_sizes.get("pdf"), Some(&(2048 + 5_000_000)));
        assert_eq!(stats.type_freq.get(crate::classify::NO_EXTENSION), Some(&1));
        assert_eq!(stats.word_freq.get("annual"), Some(&2));
        assert_eq!(stats.empty_files, 1);
        assert_eq!(stats.empty_dirs, 1);
        assert_eq!(stats.hidden, 1);
        assert_eq!(stats.recent_files, 3);
        assert_eq!(stats.stale_files, 2);
        assert_eq!(stats.dir_depths.get(&PathBuf::from("/r/docs")), Some(&1));
        assert_eq!(stats.dir_file_counts.get(&PathBuf::from("/r/docs")), Some(&3));
        assert_eq!(stats.dir_file_counts.get(&PathBuf::from("/r/empty")), Some(&0));
        assert_eq!(
            stats.oldest.as_ref().map(|o| o.path.clone()),
            Some(PathBuf::from("/r/docs/annual_summary.pdf"))
        );
        assert_eq!(
            stats.newest.as_ref().map(|n| n.path.clone()),
            Some(PathBuf::from("/r/readme.md"))
        );
    }

    #[test]
    fn test_extremum_ties_keep_first_writer() {
        let mut stats = Statistics::new(1);
        stats.merge(file("/t/first.txt", 1, 5));
        stats.merge(file("/t/second.txt", 1, 5));

        assert_eq!(stats.oldest.unwrap().path, PathBuf::from("/t/first.txt"));
        assert_eq!(stats.newest.unwrap().path, PathBuf::from("/t/first.txt"));
    }

    #[test]
    fn test_merge_order_does_not_matter() {
        let observations = sample_observations();
        let mut forward = Statistics::new(2);
        for obs in observations.iter().cloned() {
            forward.merge(obs);
        }

        // rotate and reverse to produce several distinct permutations
        for shift in 0..observations.len() {
            let mut permuted = observations.clone();
            permuted.rotate_left(shift);
            if shift % 2 == 1 {
                permuted.reverse();
            }
            let mut stats = Statistics::new(2);
            for obs in permuted {
                stats.merge(obs);
            }
            assert_same_statistics(&forward, &stats);
        }
    }

    #[test]
    fn test_absorb_equals_single_merge() {
        let observations = sample_observations();
        let mut whole = Statistics::new(2);
        let mut left = Statistics::new(2);
        let mut right = Statistics::new(2);
        for (i, obs) in observations.into_iter().enumerate() {
            whole.merge(obs.clone());
            if i % 2 == 0 {
                left.merge(obs);
            } else {
                right.merge(obs);
            }
        }

        left.absorb(right);
        assert_same_statistics(&whole, &left);
    }

    #[test]
    fn test_locked_collector_concurrent_merges() {
        let collector = LockedCollector::new(5);
        std::thread::scope(|s| {
            for worker in 0..4 {
                let collector = &collector;
                s.spawn(move || {
                    for i in 0..250u64 {
                        let path = format!("/w{worker}/f{i}.dat");
                        collector.merge(worker, file(&path, i * 10, i % 365));
                    }
                });
            }
        });

        let stats = Box::new(collector).into_statistics();
        assert_eq!(stats.total_files, 1000);
        assert_eq!(stats.extension_total(), 1000);
        assert_eq!(stats.size_bucket_total(), 1000);
        let sizes: Vec<u64> = stats.largest.sorted().iter().map(|f| f.size).collect();
        assert_eq!(sizes, vec![2490, 2490, 2490, 2490, 2480]);
    }
}
