//! Column hashing.
//!
//! Sortable keys preserve row order under unsigned comparison; the streaming
//! String hash is for equality and grouping only.

use std::sync::Arc;

use rayon::prelude::*;
use strata_vec::Deferred;

use crate::buffer::{with_buffer, Buffer, Numeric};
use crate::{Column, DataType, Span};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Row keys laid out word-major: word `w` of row `r` is at `w * rows + r`.
///
/// Comparing rows word by word, first word most significant, gives the same
/// order as comparing the hashed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBuffer {
    words: usize,
    rows: usize,
    data: Vec<u64>,
}

impl KeyBuffer {
    /// Single-word keys.
    pub fn single(keys: Vec<u64>) -> Self {
        Self {
            words: 1,
            rows: keys.len(),
            data: keys,
        }
    }

    /// Number of key words per row.
    pub fn words(&self) -> usize {
        self.words
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Word `w` of every row.
    pub fn word(&self, w: usize) -> &[u64] {
        &self.data[w * self.rows..(w + 1) * self.rows]
    }

    /// The key words of one row, most significant first.
    pub fn row(&self, r: usize) -> Vec<u64> {
        (0..self.words).map(|w| self.data[w * self.rows + r]).collect()
    }

    /// Flat word-major storage.
    pub fn into_inner(self) -> Vec<u64> {
        self.data
    }
}

impl Column {
    /// Hash every row.
    ///
    /// * String, `sortable`: word hash, `ceil(max_len / 8)` words (at least
    ///   one), bytes packed most significant first and zero filled.
    /// * String, not `sortable`: 64-bit FNV-1a, one word.
    /// * Date / Time / DateTime: base-100 positional sum of the fields.
    /// * Numeric and Boolean: an order-preserving bijection onto `u64`.
    pub fn hash(&self, sortable: bool) -> KeyBuffer {
        match (&self.data, &self.index) {
            (Buffer::U8(bytes), Some(spans)) => {
                if sortable {
                    word_hash(bytes.clone(), spans.clone(), self.max_len())
                } else {
                    KeyBuffer::single(fnv1a(bytes.clone(), spans.clone()))
                }
            }
            (Buffer::U16(fields), None) if self.data_type.is_temporal() => {
                KeyBuffer::single(temporal_hash(fields, self.data_type.field_width()))
            }
            (data, _) => KeyBuffer::single(with_buffer!(data, v => {
                v[..].par_iter().map(|x| x.order_key()).collect()
            })),
        }
    }

    /// Single-word key used for equi-joins.
    ///
    /// Both sides of a join must be keyed the same way, so the String mode is
    /// chosen by the caller: `exact` packs each row into one sortable word and
    /// is only valid when every row on both sides fits in eight bytes;
    /// otherwise rows are FNV-1a hashed and matches need byte verification.
    /// Other types ignore `exact`.
    pub fn join_key(&self, exact: bool) -> Vec<u64> {
        self.hash(self.data_type != DataType::String || exact).into_inner()
    }
}

fn word_hash(bytes: Arc<[u8]>, spans: Arc<[Span]>, max_len: u64) -> KeyBuffer {
    let words = (max_len.max(1) as usize).div_ceil(8);
    let rows = spans.len();
    let data = Deferred::generate(words * rows, move |i| {
        let span = spans[i % rows];
        let start = (i / rows) as u64 * 8;
        (0..8u64)
            .filter(|b| start + b < span.len)
            .fold(0u64, |key, b| {
                let byte = bytes[(span.offset + start + b) as usize];
                key | u64::from(byte) << ((7 - b) * 8)
            })
    })
    .eval();
    KeyBuffer { words, rows, data }
}

fn fnv1a(bytes: Arc<[u8]>, spans: Arc<[Span]>) -> Vec<u64> {
    Deferred::from_arc(spans)
        .map(move |span| {
            bytes[span.offset as usize..span.end() as usize]
                .iter()
                .fold(FNV_OFFSET, |h, &b| (h ^ u64::from(b)).wrapping_mul(FNV_PRIME))
        })
        .eval()
}

fn temporal_hash(fields: &[u16], width: usize) -> Vec<u64> {
    fields
        .par_chunks(width)
        .map(|row| row.iter().fold(0u64, |acc, &f| acc * 100 + u64::from(f)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use strata_vec::sort_permutation;

    #[test]
    fn word_hash_orders_short_strings() {
        let col = Column::from_strs(["world", "hello", "hi"]);
        let keys = col.hash(true);
        assert_eq!(keys.words(), 1);
        let perm = sort_permutation(keys.word(0), true);
        assert_eq!(perm, vec![1, 2, 0]);
        assert_eq!(keys.word(0)[2], u64::from_be_bytes(*b"hi\0\0\0\0\0\0"));
    }

    #[test]
    fn word_hash_spans_words() {
        let col = Column::from_strs(["abcdefghij", "abcdefgh", ""]);
        let keys = col.hash(true);
        assert_eq!((keys.words(), keys.rows()), (2, 3));
        assert_eq!(keys.row(0), vec![u64::from_be_bytes(*b"abcdefgh"), u64::from_be_bytes(*b"ij\0\0\0\0\0\0")]);
        assert_eq!(keys.row(1)[1], 0);
        assert_eq!(keys.row(2), vec![0, 0]);
    }

    #[test]
    fn fnv_matches_reference_vectors() {
        let col = Column::from_strs(["", "a", "foobar"]);
        assert_eq!(
            col.hash(false).into_inner(),
            vec![0xcbf29ce484222325, 0xaf63dc4c8601ec8c, 0x85944171f73967e8]
        );
    }

    #[test]
    fn temporal_hash_is_injective_over_field_bounds() {
        let mut fields = Vec::new();
        for year in [1999u16, 2000, 2024] {
            for month in 0..=12u16 {
                for day in 0..=31u16 {
                    fields.extend_from_slice(&[year, month, day]);
                }
            }
        }
        let col = Column::temporal(DataType::Date, fields);
        let keys = col.hash(false).into_inner();
        assert_eq!(keys.iter().collect::<HashSet<_>>().len(), keys.len());
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(keys, col.hash(true).into_inner());

        let mut times = Vec::new();
        for h in 0..24u16 {
            for m in 0..60u16 {
                for s in 0..=60u16 {
                    times.extend_from_slice(&[h, m, s]);
                }
            }
        }
        let keys = Column::temporal(DataType::Time, times).hash(false).into_inner();
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn join_key_mode_is_chosen_by_caller() {
        let short = Column::from_strs(["ab", "b"]);
        assert_eq!(short.join_key(true), short.hash(true).into_inner());
        assert_eq!(short.join_key(false), short.hash(false).into_inner());
        let long = Column::from_strs(["a much longer string", "ab"]);
        assert_eq!(long.join_key(false)[1], short.join_key(false)[0]);
    }

    #[test]
    fn numeric_keys_keep_order() {
        let col = Column::from_vec(vec![3i32, -7, 0]);
        let keys = col.join_key(false);
        assert_eq!(sort_permutation(&keys, true), vec![1, 2, 0]);
    }
}
