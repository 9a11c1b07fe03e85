use crate::collector::{Collector, Statistics};
use crate::types::Observation;
use parking_lot::Mutex;
use rayon::prelude::*;

/// Sharded collector that avoids contention on the merge step.
/// Each worker writes to its own shard, so its lock is never contended.
/// Shards are combined once at the end using a parallel reduction.
pub struct ShardedCollector {
    shards: Vec<Mutex<Statistics>>,
    top_n: usize,
}

impl ShardedCollector {
    /// Create a new sharded collector.
    ///
    /// # Arguments
    /// * `num_shards` - Number of shards (one per worker)
    /// * `top_n` - How many largest files each Top-K tracker keeps
    pub fn new(num_shards: usize, top_n: usize) -> Self {
        let shards = (0..num_shards.max(1))
            .map(|_| Mutex::new(Statistics::new(top_n)))
            .collect();

        Self { shards, top_n }
    }
}

impl Collector for ShardedCollector {
    fn merge(&self, worker: usize, observation: Observation) {
        self.shards[worker % self.shards.len()]
            .lock()
            .merge(observation);
    }

    fn into_statistics(self: Box<Self>) -> Statistics {
        let top_n = self.top_n;
        self.shards
            .into_par_iter()
            .map(Mutex::into_inner)
            .reduce(
                || Statistics::new(top_n),
                |mut left, right| {
                    left.absorb(right);
                    left
                },
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::tests::{assert_same_statistics, file, sample_observations};
    use crate::collector::LockedCollector;

    #[test]
    fn test_sharded_collector_creation() {
        let collector = ShardedCollector::new(4, 10);
        assert_eq!(collector.shards.len(), 4);

        let collector = ShardedCollector::new(0, 10);
        assert_eq!(collector.shards.len(), 1);
    }

    #[test]
    fn test_sharded_matches_locked() {
        let locked = LockedCollector::new(3);
        let sharded = ShardedCollector::new(3, 3);

        for (i, obs) in sample_observations().into_iter().enumerate() {
            locked.merge(i, obs.clone());
            sharded.merge(i, obs);
        }

        let locked = Box::new(locked).into_statistics();
        let sharded = Box::new(sharded).into_statistics();
        assert_same_statistics(&locked, &sharded);
    }

    #[test]
    fn test_sharded_concurrent_merges() {
        let collector = ShardedCollector::new(4, 2);
        std::thread::scope(|s| {
            for worker in 0..4usize {
                let collector = &collector;
                s.spawn(move || {
                    for i in 0..100u64 {
                        let size = i + worker as u64 * 1000;
                        collector.merge(worker, file(&format!("/s{worker}/{i}.bin"), size, 1));
                    }
                });
            }
        });

        let stats = Box::new(collector).into_statistics();
        assert_eq!(stats.total_files, 400);
        assert_eq!(stats.type_freq.get("bin"), Some(&400));
        let sizes: Vec<u64> = stats.largest.sorted().iter().map(|f| f.size).collect();
        assert_eq!(sizes, vec![3099, 3098]);
    }
}
