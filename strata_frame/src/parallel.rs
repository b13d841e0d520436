//! Bounded worker pool for join problems too large for flat broadcast.
//!
//! Each worker owns one contiguous slice of the probe side and of the output;
//! workers only meet at spawn and at the end of the scope.

use rayon::{ThreadPool, ThreadPoolBuilder};
use strata_column::{Error, Result};
use tracing::debug;

use crate::join::Buckets;

pub(crate) struct WorkerPool {
    pool: ThreadPool,
    workers: usize,
}

impl WorkerPool {
    pub(crate) fn new(workers: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("strata-join-{i}"))
            .build()
            .map_err(|e| Error::WorkerPool(e.to_string()))?;
        debug!(workers, "started join worker pool");
        Ok(Self { pool, workers })
    }

    /// For every entry of the sorted `bag`, whether it occurs in the sorted,
    /// duplicate-free `set`.
    ///
    /// A worker starts its cursor at the first set entry not below its first
    /// probe key and only ever moves it forward.
    pub(crate) fn membership(&self, bag: &[u64], set: &[u64]) -> Vec<bool> {
        let mut hits = vec![false; bag.len()];
        let chunk = bag.len().div_ceil(self.workers).max(1);
        self.pool.scope(|s| {
            for (probe, out) in bag.chunks(chunk).zip(hits.chunks_mut(chunk)) {
                s.spawn(move |_| {
                    let mut cursor = set.partition_point(|&v| v < probe[0]);
                    for (&key, hit) in probe.iter().zip(out.iter_mut()) {
                        while cursor < set.len() && set[cursor] < key {
                            cursor += 1;
                        }
                        *hit = cursor < set.len() && set[cursor] == key;
                    }
                });
            }
        });
        hits
    }

    /// Write the per-bucket Cartesian products. Pair `(j, k)` of bucket `b`
    /// lands at `out_start[b] + j * right_count[b] + k`.
    pub(crate) fn expand(
        &self,
        buckets: &Buckets,
        left_rows: &[u64],
        right_rows: &[u64],
    ) -> (Vec<u64>, Vec<u64>) {
        let total = buckets.total as usize;
        let mut left = vec![0u64; total];
        let mut right = vec![0u64; total];
        let n = buckets.len();
        let chunk = n.div_ceil(self.workers).max(1);
        self.pool.scope(|s| {
            let (mut left_rest, mut right_rest) = (&mut left[..], &mut right[..]);
            for first in (0..n).step_by(chunk) {
                let last = (first + chunk).min(n);
                let size = (buckets.end_of(last - 1) - buckets.out_start[first]) as usize;
                let (l, lr) = std::mem::take(&mut left_rest).split_at_mut(size);
                let (r, rr) = std::mem::take(&mut right_rest).split_at_mut(size);
                left_rest = lr;
                right_rest = rr;
                s.spawn(move |_| {
                    let origin = buckets.out_start[first];
                    for b in first..last {
                        let (lc, rc) = (buckets.left_count[b], buckets.right_count[b]);
                        let (ls, rs) = (buckets.left_start[b], buckets.right_start[b]);
                        let base = buckets.out_start[b] - origin;
                        for j in 0..lc {
                            for k in 0..rc {
                                let at = (base + j * rc + k) as usize;
                                l[at] = left_rows[(ls + j) as usize];
                                r[at] = right_rows[(rs + k) as usize];
                            }
                        }
                    }
                });
            }
        });
        (left, right)
    }
}
