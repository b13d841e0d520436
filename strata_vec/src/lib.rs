//! Strata data-parallel primitive runtime.
//!
//! Column and frame algorithms are written only against the primitives in this
//! crate: broadcast elementwise expressions ([`Deferred`]), boolean compaction,
//! stable sort-by-key, prefix scans, run-length counting, gather and scatter.
//! The CPU backend spreads each batch call over rayon; from the caller's point
//! of view every call is synchronous.
//!
//! Gather and scatter only accept materialized index slices. Any index array
//! built as a [`Deferred`] therefore has to pass through [`Deferred::eval`]
//! before it can address memory.
#![deny(missing_docs)]

mod deferred;

pub use deferred::Deferred;

use std::cmp::Reverse;

use rayon::prelude::*;

/// Minimum number of elements handed to one rayon task.
pub const BATCH_CAPACITY: usize = 4096;

/// Boolean compaction: indices of the `true` entries, ascending.
pub fn where_true(mask: &[bool]) -> Vec<u64> {
    mask.par_iter()
        .enumerate()
        .with_min_len(BATCH_CAPACITY)
        .filter_map(|(i, &keep)| keep.then_some(i as u64))
        .collect()
}

/// Stable sort-by-key returning the permutation that orders `keys`.
///
/// Ties keep their input order in both directions, which is what lets
/// callers build multi-key orderings out of successive single-key passes.
pub fn sort_permutation(keys: &[u64], ascending: bool) -> Vec<u64> {
    let mut perm: Vec<u64> = (0..keys.len() as u64).collect();
    if ascending {
        perm.par_sort_by_key(|&i| keys[i as usize]);
    } else {
        perm.par_sort_by_key(|&i| Reverse(keys[i as usize]));
    }
    perm
}

/// Ascending stable sort returning `(sorted_keys, permutation)`.
pub fn sort_with_permutation(keys: &[u64]) -> (Vec<u64>, Vec<u64>) {
    let perm = sort_permutation(keys, true);
    (gather(keys, &perm), perm)
}

/// Inclusive prefix scan with a caller supplied associative operator.
pub fn scan_inclusive_by<T: Copy>(values: &[T], op: impl Fn(T, T) -> T) -> Vec<T> {
    let mut out = Vec::with_capacity(values.len());
    let mut acc: Option<T> = None;
    for &v in values {
        let next = match acc {
            Some(a) => op(a, v),
            None => v,
        };
        out.push(next);
        acc = Some(next);
    }
    out
}

/// Exclusive prefix scan starting from `identity`.
pub fn scan_exclusive_by<T: Copy>(values: &[T], identity: T, op: impl Fn(T, T) -> T) -> Vec<T> {
    let mut out = Vec::with_capacity(values.len());
    let mut acc = identity;
    for &v in values {
        out.push(acc);
        acc = op(acc, v);
    }
    out
}

/// Inclusive `u64` sum scan (wrapping).
pub fn scan_inclusive(values: &[u64]) -> Vec<u64> {
    scan_inclusive_by(values, u64::wrapping_add)
}

/// Exclusive `u64` sum scan (wrapping).
pub fn scan_exclusive(values: &[u64]) -> Vec<u64> {
    scan_exclusive_by(values, 0, u64::wrapping_add)
}

/// Count occurrences of each bin id in `0..bins`. Ids outside the range are
/// ignored.
pub fn histogram(ids: &[u64], bins: usize) -> Vec<u64> {
    let mut counts = vec![0u64; bins];
    for &id in ids {
        if let Some(slot) = counts.get_mut(id as usize) {
            *slot += 1;
        }
    }
    counts
}

/// Length of every run of equal values in a sorted sequence.
///
/// Boundaries between runs are scanned into bucket ids, which are then
/// histogrammed.
pub fn run_lengths(sorted: &[u64]) -> Vec<u64> {
    if sorted.is_empty() {
        return Vec::new();
    }
    let boundaries: Vec<u64> = (0..sorted.len())
        .into_par_iter()
        .with_min_len(BATCH_CAPACITY)
        .map(|i| u64::from(i > 0 && sorted[i] != sorted[i - 1]))
        .collect();
    let ids = scan_inclusive(&boundaries);
    let buckets = ids[ids.len() - 1] as usize + 1;
    histogram(&ids, buckets)
}

/// Run-length decode: repeat `values[i]` `counts[i]` times.
pub fn repeat_each(values: &[u64], counts: &[u64]) -> Vec<u64> {
    values
        .par_iter()
        .zip(counts.par_iter())
        .flat_map_iter(|(&v, &n)| std::iter::repeat(v).take(n as usize))
        .collect()
}

/// Distinct values of a sorted sequence.
pub fn unique_sorted(sorted: &[u64]) -> Vec<u64> {
    let first: Vec<bool> = (0..sorted.len())
        .into_par_iter()
        .with_min_len(BATCH_CAPACITY)
        .map(|i| i == 0 || sorted[i] != sorted[i - 1])
        .collect();
    gather(sorted, &where_true(&first))
}

/// Intersection of two sorted, duplicate-free sequences.
///
/// Both sets are concatenated and sorted; a value present on both sides
/// shows up as two adjacent equal entries.
pub fn intersect_sorted(lhs: &[u64], rhs: &[u64]) -> Vec<u64> {
    let mut both = Vec::with_capacity(lhs.len() + rhs.len());
    both.extend_from_slice(lhs);
    both.extend_from_slice(rhs);
    both.par_sort_unstable();
    let pairs = both.len().saturating_sub(1);
    let hit: Vec<bool> = (0..pairs)
        .into_par_iter()
        .with_min_len(BATCH_CAPACITY)
        .map(|i| both[i] == both[i + 1])
        .collect();
    gather(&both, &where_true(&hit))
}

/// Gather: `out[i] = src[idx[i]]`.
pub fn gather<T: Copy + Send + Sync>(src: &[T], idx: &[u64]) -> Vec<T> {
    idx.par_iter()
        .with_min_len(BATCH_CAPACITY)
        .map(|&i| src[i as usize])
        .collect()
}

/// Gather fixed-width rows of `width` consecutive elements.
pub fn gather_rows<T: Copy + Send + Sync>(src: &[T], width: usize, idx: &[u64]) -> Vec<T> {
    if width == 1 {
        return gather(src, idx);
    }
    idx.par_iter()
        .flat_map_iter(move |&i| {
            let start = i as usize * width;
            src[start..start + width].iter().copied()
        })
        .collect()
}

/// Scatter: `dst[idx[i]] = values[i]`.
///
/// Callers that mask elements out point them at a trailing dump slot of
/// `dst` and drop that slot afterwards.
pub fn scatter<T: Copy>(dst: &mut [T], idx: &[u64], values: &[T]) {
    debug_assert_eq!(idx.len(), values.len(), "scatter operands differ in length");
    for (&i, &v) in idx.iter().zip(values) {
        dst[i as usize] = v;
    }
}

/// Largest element, or zero for an empty slice.
pub fn max_u64(values: &[u64]) -> u64 {
    values.par_iter().copied().max().unwrap_or(0)
}

/// Wrapping sum of all elements.
pub fn sum_u64(values: &[u64]) -> u64 {
    values
        .par_iter()
        .copied()
        .reduce(|| 0, u64::wrapping_add)
}
