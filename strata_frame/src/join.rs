//! Sort-based equi-join.
//!
//! Both key sequences are stably sorted, pruned to the keys present on both
//! sides, counted per key ("bucket") and expanded into the per-bucket
//! Cartesian product. The flat expansion decodes `(bucket, j, k)` from a
//! single index space of `buckets * max_left * max_right` elements and
//! scatters the valid ones; problems larger than the configured threshold run
//! on the worker pool instead.

use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::{Lazy, OnceCell};
use rayon::prelude::*;
use strata_column::{DataType, Error, Result};
use strata_vec::{
    gather, intersect_sorted, max_u64, run_lengths, scan_exclusive, scatter, sort_with_permutation,
    sum_u64, unique_sorted, where_true, Deferred,
};
use tracing::{debug, info, instrument};

use crate::parallel::WorkerPool;
use crate::{EngineConfig, Frame};

static DEFAULT_ENGINE: Lazy<JoinEngine> = Lazy::new(JoinEngine::default);

/// Row pairs produced by a join: `left[i]` matches `right[i]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinIndices {
    /// Row numbers on the left side.
    pub left: Vec<u64>,
    /// Row numbers on the right side.
    pub right: Vec<u64>,
}

impl JoinIndices {
    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.left.len()
    }

    /// Whether nothing matched.
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    fn keep(&self, idx: &[u64]) -> Self {
        Self {
            left: gather(&self.left, idx),
            right: gather(&self.right, idx),
        }
    }
}

/// Per-key run counts of the pruned, sorted sides and the output range each
/// key's product occupies.
pub(crate) struct Buckets {
    pub(crate) left_start: Vec<u64>,
    pub(crate) left_count: Vec<u64>,
    pub(crate) right_start: Vec<u64>,
    pub(crate) right_count: Vec<u64>,
    pub(crate) out_start: Vec<u64>,
    pub(crate) total: u64,
}

impl Buckets {
    fn new(left_count: Vec<u64>, right_count: Vec<u64>) -> Self {
        debug_assert_eq!(left_count.len(), right_count.len());
        let products: Vec<u64> = left_count
            .par_iter()
            .zip(right_count.par_iter())
            .map(|(&l, &r)| l * r)
            .collect();
        Self {
            left_start: scan_exclusive(&left_count),
            right_start: scan_exclusive(&right_count),
            out_start: scan_exclusive(&products),
            total: sum_u64(&products),
            left_count,
            right_count,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.left_count.len()
    }

    /// One past the last output slot of bucket `b`.
    pub(crate) fn end_of(&self, b: usize) -> u64 {
        self.out_start[b] + self.left_count[b] * self.right_count[b]
    }
}

/// Equi-join executor. Holds the configuration and a worker pool that is
/// only started the first time a problem exceeds the threshold.
pub struct JoinEngine {
    config: EngineConfig,
    pool: OnceCell<WorkerPool>,
}

impl Default for JoinEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for JoinEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinEngine")
            .field("config", &self.config)
            .field("pool_started", &self.pool.get().is_some())
            .finish()
    }
}

impl JoinEngine {
    /// Engine with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            pool: OnceCell::new(),
        }
    }

    /// Process-wide engine with the default configuration, used by
    /// [`Frame::equi_join`].
    pub fn global() -> &'static JoinEngine {
        &DEFAULT_ENGINE
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn pool(&self) -> Result<&WorkerPool> {
        self.pool
            .get_or_try_init(|| WorkerPool::new(self.config.worker_count()))
    }

    fn exceeds(&self, size: u128) -> bool {
        size > u128::from(self.config.parallel_threshold)
    }

    /// Inner equi-join of `lhs` and `rhs` on one column each. The output has
    /// every left column followed by every right column except the join
    /// column, right-side names qualified with the right frame's name.
    #[instrument(skip(self, lhs, rhs), fields(left_rows = lhs.len(), right_rows = rhs.len()))]
    pub fn equi_join(
        &self,
        lhs: &Frame,
        rhs: &Frame,
        left_column: usize,
        right_column: usize,
    ) -> Result<Frame> {
        let started = Instant::now();
        let left = lhs.column(left_column)?;
        let right = rhs.column(right_column)?;
        if left.data_type() != right.data_type() {
            return Err(Error::TypeMismatch {
                op: "equi_join",
                expected: "join columns of equal type",
                found: right.data_type(),
            });
        }

        let exact = left.max_len().max(right.max_len()) <= 8;
        let mut matches = self.set_compare(&left.join_key(exact), &right.join_key(exact))?;
        if left.data_type() == DataType::String && self.config.verify_string_matches {
            let same = left.rows_equal(&matches.left, right, &matches.right)?;
            let keep = where_true(&same);
            if keep.len() < matches.len() {
                debug!(dropped = matches.len() - keep.len(), "dropped hash collisions");
                matches = matches.keep(&keep);
            }
        }

        let out = lhs.assemble_join(rhs, right_column, &matches)?;
        info!(
            rows = out.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "equi-join finished"
        );
        Ok(out)
    }

    /// Match two key sequences, returning every pair of positions with equal
    /// keys. Pairs are grouped by ascending key; within a key, left rows vary
    /// slowest and both sides keep their input order.
    pub fn set_compare(&self, left: &[u64], right: &[u64]) -> Result<JoinIndices> {
        let (left_keys, left_perm) = sort_with_permutation(left);
        let (right_keys, right_perm) = sort_with_permutation(right);
        let equal = intersect_sorted(&unique_sorted(&left_keys), &unique_sorted(&right_keys));
        debug!(left = left.len(), right = right.len(), keys = equal.len(), "set compare");
        if equal.is_empty() {
            return Ok(JoinIndices::default());
        }

        let keep_left = where_true(&self.membership(&left_keys, &equal)?);
        let keep_right = where_true(&self.membership(&right_keys, &equal)?);
        let buckets = Buckets::new(
            run_lengths(&gather(&left_keys, &keep_left)),
            run_lengths(&gather(&right_keys, &keep_right)),
        );
        let left_rows = gather(&left_perm, &keep_left);
        let right_rows = gather(&right_perm, &keep_right);
        let (left, right) = self.expand(buckets, left_rows, right_rows)?;
        Ok(JoinIndices { left, right })
    }

    /// Mask of the `bag` entries present in `set`; both sorted, `set` unique.
    fn membership(&self, bag: &[u64], set: &[u64]) -> Result<Vec<bool>> {
        if bag.is_empty() || set.is_empty() {
            return Ok(vec![false; bag.len()]);
        }
        if self.exceeds(bag.len() as u128 * set.len() as u128) {
            debug!(bag = bag.len(), set = set.len(), "membership on worker pool");
            return Ok(self.pool()?.membership(bag, set));
        }
        debug!(bag = bag.len(), set = set.len(), "membership by broadcast");
        let width = set.len();
        let (bag_keys, set_keys): (Arc<[u64]>, Arc<[u64]>) = (bag.into(), set.into());
        let equal = Deferred::generate(bag.len() * width, move |i| {
            bag_keys[i / width] == set_keys[i % width]
        })
        .eval();
        Ok(equal.par_chunks(width).map(|row| row.contains(&true)).collect())
    }

    fn expand(
        &self,
        buckets: Buckets,
        left_rows: Vec<u64>,
        right_rows: Vec<u64>,
    ) -> Result<(Vec<u64>, Vec<u64>)> {
        let max_left = max_u64(&buckets.left_count);
        let max_right = max_u64(&buckets.right_count);
        let space = buckets.len() as u128 * u128::from(max_left) * u128::from(max_right);
        if self.exceeds(space) {
            debug!(buckets = buckets.len(), max_left, max_right, "expansion on worker pool");
            return Ok(self.pool()?.expand(&buckets, &left_rows, &right_rows));
        }
        debug!(buckets = buckets.len(), max_left, max_right, "expansion by broadcast");

        let total = buckets.total;
        let cell = max_left * max_right;
        let buckets = Arc::new(buckets);
        let left_rows: Arc<[u64]> = left_rows.into();
        let right_rows: Arc<[u64]> = right_rows.into();
        let decoded = Deferred::generate(space as usize, move |i| {
            let i = i as u64;
            let b = (i / cell) as usize;
            let (j, k) = (i % cell / max_right, i % max_right);
            let (lc, rc) = (buckets.left_count[b], buckets.right_count[b]);
            if j < lc && k < rc {
                let slot = buckets.out_start[b] + j * rc + k;
                let l = left_rows[(buckets.left_start[b] + j) as usize];
                let r = right_rows[(buckets.right_start[b] + k) as usize];
                (slot, l, r)
            } else {
                (total, 0, 0)
            }
        })
        .eval();

        let slots: Vec<u64> = decoded.par_iter().map(|d| d.0).collect();
        let mut left = vec![0u64; total as usize + 1];
        let mut right = vec![0u64; total as usize + 1];
        scatter(&mut left, &slots, &decoded.par_iter().map(|d| d.1).collect::<Vec<_>>());
        scatter(&mut right, &slots, &decoded.par_iter().map(|d| d.2).collect::<Vec<_>>());
        left.truncate(total as usize);
        right.truncate(total as usize);
        Ok((left, right))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use strata_column::Column;

    fn engine(threshold: u64) -> JoinEngine {
        JoinEngine::new(EngineConfig {
            parallel_threshold: threshold,
            workers: Some(3),
            ..EngineConfig::default()
        })
    }

    #[test]
    fn grouped_product_layout() {
        let out = engine(1_000).set_compare(&[1, 2, 2, 3], &[2, 2, 3, 5]).unwrap();
        assert_eq!(out.left, vec![1, 1, 2, 2, 3]);
        assert_eq!(out.right, vec![0, 1, 0, 1, 2]);
    }

    #[test]
    fn no_common_keys() {
        let out = engine(1_000).set_compare(&[1, 2], &[3]).unwrap();
        assert!(out.is_empty());
        assert!(engine(1_000).set_compare(&[], &[1]).unwrap().is_empty());
    }

    #[test]
    fn worker_pool_agrees_with_broadcast() {
        let mut rng = StdRng::seed_from_u64(42);
        let left: Vec<u64> = (0..400).map(|_| rng.gen_range(0..60)).collect();
        let right: Vec<u64> = (0..300).map(|_| rng.gen_range(20..90)).collect();
        let flat = engine(u64::MAX).set_compare(&left, &right).unwrap();
        let pooled = engine(1).set_compare(&left, &right).unwrap();
        assert_eq!(flat, pooled);
        for (&l, &r) in flat.left.iter().zip(&flat.right) {
            assert_eq!(left[l as usize], right[r as usize]);
        }
        let expected: usize = (0..90)
            .map(|k| {
                let l = left.iter().filter(|&&v| v == k).count();
                l * right.iter().filter(|&&v| v == k).count()
            })
            .sum();
        assert_eq!(flat.len(), expected);
    }

    fn keyed(name: &str, keys: &[&str]) -> Frame {
        let mut f = Frame::new(name);
        f.add(Column::from_strs(keys.iter().copied()), Some("k"));
        f.add(Column::from_vec((0..keys.len() as u32).collect()), Some("row"));
        f
    }

    fn row_pairs(joined: &Frame) -> Vec<(u32, u32)> {
        let left = joined.column_by_name("row").unwrap().values::<u32>().unwrap();
        let right = joined.column_by_name("r.row").unwrap().values::<u32>().unwrap();
        left.iter().copied().zip(right.iter().copied()).collect()
    }

    #[test]
    fn short_keys_match_against_long_keys() {
        let l = keyed("l", &["ab", "cd"]);
        let r = keyed("r", &["ab", "a much longer key"]);
        assert_eq!(row_pairs(&l.equi_join(&r, 0, 0).unwrap()), vec![(0, 0)]);
        assert_eq!(row_pairs(&r.equi_join(&keyed("r", &["ab"]), 0, 0).unwrap()), vec![(0, 0)]);
    }

    #[test]
    fn verification_drops_word_hash_ties() {
        // A trailing NUL packs to the same word as the shorter key.
        let l = keyed("l", &["ab", "xy"]);
        let r = keyed("r", &["ab\0", "xy"]);
        let verified = JoinEngine::default().equi_join(&l, &r, 0, 0).unwrap();
        assert_eq!(row_pairs(&verified), vec![(1, 1)]);

        let trusting = JoinEngine::new(EngineConfig {
            verify_string_matches: false,
            ..EngineConfig::default()
        });
        let unverified = trusting.equi_join(&l, &r, 0, 0).unwrap();
        assert_eq!(row_pairs(&unverified), vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn unverified_long_keys_keep_true_matches() {
        let l = keyed("l", &["a fairly long key", "short", "short"]);
        let r = keyed("r", &["short", "a fairly long key", "another long key"]);
        let trusting = JoinEngine::new(EngineConfig {
            verify_string_matches: false,
            ..EngineConfig::default()
        });
        let mut pairs = row_pairs(&trusting.equi_join(&l, &r, 0, 0).unwrap());
        pairs.sort();
        assert_eq!(pairs, vec![(0, 1), (1, 0), (2, 0)]);
    }
}
