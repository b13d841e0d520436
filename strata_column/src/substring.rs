//! Substring extraction. Results share the source buffer and are dirty until
//! flushed.

use rayon::prelude::*;

use crate::buffer::Buffer;
use crate::{Column, Error, Result, Span};

impl Column {
    /// First `n` bytes of every row.
    pub fn left(&self, n: u64) -> Result<Column> {
        self.respan("left", n, |s| Span::new(s.offset, n))
    }

    /// Last `n` bytes of every row.
    pub fn right(&self, n: u64) -> Result<Column> {
        self.respan("right", n, |s| Span::new(s.end() - n, n))
    }

    /// `n` bytes of every row starting at byte `start`.
    pub fn trim(&self, start: u64, n: u64) -> Result<Column> {
        // No row can hold more than u64::MAX bytes.
        let required = start.checked_add(n).unwrap_or(u64::MAX);
        self.respan("trim", required, |s| Span::new(s.offset + start, n))
    }

    fn respan(&self, op: &'static str, required: u64, f: impl Fn(&Span) -> Span + Sync + Send) -> Result<Column> {
        let (_, spans) = self.strings(op)?;
        if let Some(row) = spans.par_iter().position_first(|s| s.len < required) {
            return Err(Error::BoundsViolation {
                row,
                len: spans[row].len,
                required,
            });
        }
        let Buffer::U8(bytes) = &self.data else {
            return Err(Error::type_mismatch(op, "String", self.data_type));
        };
        let spans: Vec<Span> = spans.par_iter().map(f).collect();
        Ok(Column::string(bytes.clone(), spans.into()))
    }
}
