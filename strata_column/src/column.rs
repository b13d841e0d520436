//! Column storage, row selection and String compaction.

use std::sync::Arc;

use rayon::prelude::*;
use strata_vec::{gather, scan_exclusive, scatter, sum_u64, where_true, BATCH_CAPACITY};
use tracing::trace;

use crate::buffer::{with_buffer, Buffer, NativeType};
use crate::{DataType, Error, Result, Span, Value};

/// Typed, buffer-backed single attribute.
///
/// Fixed-width columns hold `len * field_width` elements. String columns hold
/// a byte buffer plus one [`Span`] per row; spans of a dirty column (e.g. a
/// substring result) may alias each other until [`Column::flush`] repacks
/// them.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub(crate) data_type: DataType,
    pub(crate) data: Buffer,
    pub(crate) index: Option<Arc<[Span]>>,
}

impl Column {
    /// Column over a vector of native scalars.
    pub fn from_vec<T: NativeType>(values: Vec<T>) -> Self {
        Self {
            data_type: T::DATA_TYPE,
            data: T::into_buffer(values),
            index: None,
        }
    }

    /// Boolean column.
    pub fn from_bools(values: Vec<bool>) -> Self {
        Self::from_vec(values)
    }

    /// Compact String column, one row per item.
    pub fn from_strs<S: AsRef<[u8]>>(rows: impl IntoIterator<Item = S>) -> Self {
        let mut bytes = Vec::new();
        let mut spans = Vec::new();
        for row in rows {
            let row = row.as_ref();
            spans.push(Span::new(bytes.len() as u64, row.len() as u64));
            bytes.extend_from_slice(row);
            bytes.push(0);
        }
        Self::string(bytes.into(), spans.into())
    }

    /// String column from a raw byte buffer and per-row spans, as delivered
    /// by an ingestion layer. Spans may overlap but must lie in the buffer.
    pub fn from_parts(bytes: Vec<u8>, spans: Vec<Span>) -> Result<Self> {
        let size = bytes.len() as u64;
        let overruns = |s: &Span| s.offset.checked_add(s.len).map_or(true, |end| end > size);
        if let Some(row) = spans.par_iter().position_first(overruns) {
            let Span { offset, len } = spans[row];
            return Err(Error::MalformedValue {
                row,
                reason: format!("{len} bytes at offset {offset} overrun a {size}-byte buffer"),
            });
        }
        Ok(Self::string(bytes.into(), spans.into()))
    }

    pub(crate) fn string(bytes: Arc<[u8]>, spans: Arc<[Span]>) -> Self {
        Self {
            data_type: DataType::String,
            data: Buffer::U8(bytes),
            index: Some(spans),
        }
    }

    /// Date, Time or DateTime column over row-major `u16` fields.
    pub(crate) fn temporal(data_type: DataType, fields: Vec<u16>) -> Self {
        debug_assert!(data_type.is_temporal());
        Self {
            data_type,
            data: Buffer::U16(fields.into()),
            index: None,
        }
    }

    /// Logical type.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Row count.
    pub fn len(&self) -> usize {
        match &self.index {
            Some(spans) => spans.len(),
            None => self.data.len() / self.data_type.field_width(),
        }
    }

    /// Whether the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Primary buffer.
    pub fn buffer(&self) -> &Buffer {
        &self.data
    }

    /// Typed view of a fixed-width scalar column. `None` when `T` does not
    /// back this column's logical type.
    pub fn values<T: NativeType>(&self) -> Option<&[T]> {
        if self.data_type != T::DATA_TYPE {
            return None;
        }
        T::slice(&self.data)
    }

    /// Raw byte buffer of a String column.
    pub fn bytes(&self) -> Option<&[u8]> {
        match (&self.data, &self.index) {
            (Buffer::U8(bytes), Some(_)) => Some(bytes),
            _ => None,
        }
    }

    /// Row spans of a String column.
    pub fn spans(&self) -> Option<&[Span]> {
        self.index.as_deref()
    }

    /// Payload bytes of one String row.
    pub fn str_bytes(&self, row: usize) -> Option<&[u8]> {
        let span = self.spans()?.get(row)?;
        self.bytes()?.get(span.offset as usize..span.end() as usize)
    }

    /// Row-major fields of a Date, Time or DateTime column.
    pub fn temporal_fields(&self) -> Option<&[u16]> {
        match &self.data {
            Buffer::U16(fields) if self.data_type.is_temporal() => Some(fields),
            _ => None,
        }
    }

    pub(crate) fn strings(&self, op: &'static str) -> Result<(&[u8], &[Span])> {
        match (self.bytes(), self.spans()) {
            (Some(bytes), Some(spans)) => Ok((bytes, spans)),
            _ => Err(Error::type_mismatch(op, "String", self.data_type)),
        }
    }

    /// Longest String row in bytes; zero for other types.
    pub fn max_len(&self) -> u64 {
        self.spans()
            .map(|spans| spans.par_iter().map(|s| s.len).max().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Whether String rows are packed in order, each followed by a single
    /// terminator byte, with nothing else in the buffer. Always true for
    /// fixed-width types.
    pub fn is_compact(&self) -> bool {
        let (Some(bytes), Some(spans)) = (self.bytes(), self.spans()) else {
            return true;
        };
        let widths: Vec<u64> = spans.par_iter().map(|s| s.len + 1).collect();
        let offsets = scan_exclusive(&widths);
        sum_u64(&widths) == bytes.len() as u64
            && spans
                .par_iter()
                .zip(offsets.par_iter())
                .all(|(s, &o)| s.offset == o && bytes[s.end() as usize] == 0)
    }

    /// Materialize one cell.
    pub fn get(&self, row: usize) -> Option<Value> {
        if row >= self.len() {
            return None;
        }
        let value = match self.data_type {
            DataType::String => {
                Value::String(String::from_utf8_lossy(self.str_bytes(row)?).into_owned())
            }
            DataType::Date | DataType::Time | DataType::DateTime => {
                let width = self.data_type.field_width();
                let f = &self.temporal_fields()?[row * width..(row + 1) * width];
                match self.data_type {
                    DataType::Date => Value::Date {
                        year: f[0],
                        month: f[1],
                        day: f[2],
                    },
                    DataType::Time => Value::Time {
                        hour: f[0],
                        minute: f[1],
                        second: f[2],
                    },
                    _ => Value::DateTime {
                        year: f[0],
                        month: f[1],
                        day: f[2],
                        hour: f[3],
                        minute: f[4],
                        second: f[5],
                    },
                }
            }
            _ => with_buffer!(&self.data, v => v.get(row).copied().map(NativeType::to_value))?,
        };
        Some(value)
    }

    /// Materialize every cell in row order.
    pub fn to_values(&self) -> Vec<Value> {
        (0..self.len())
            .into_par_iter()
            .filter_map(|row| self.get(row))
            .collect()
    }

    /// Gather rows by index into a new column. String results are compact.
    pub fn select(&self, idx: &[u64]) -> Result<Column> {
        let rows = self.len() as u64;
        if let Some(bad) = idx.par_iter().find_any(|&&i| i >= rows) {
            return Err(Error::InvalidSelection(format!(
                "row {bad} out of range for {rows} rows"
            )));
        }
        match (self.bytes(), self.spans()) {
            (Some(bytes), Some(spans)) => {
                let picked = gather(spans, idx);
                let max_len = picked.par_iter().map(|s| s.len).max().unwrap_or(0);
                let (bytes, spans) = compact_strings(bytes, &picked, max_len);
                Ok(Column::string(bytes.into(), spans.into()))
            }
            _ => Ok(Column {
                data_type: self.data_type,
                data: self.data.gather_rows(self.data_type.field_width(), idx),
                index: None,
            }),
        }
    }

    /// Keep the rows whose mask entry is `true`.
    pub fn select_mask(&self, mask: &[bool]) -> Result<Column> {
        if mask.len() != self.len() {
            return Err(Error::InvalidSelection(format!(
                "mask of {} entries for {} rows",
                mask.len(),
                self.len()
            )));
        }
        self.select(&where_true(mask))
    }

    /// Append `other` below `self`. Both operands are compacted first; the
    /// type check runs before any repacking.
    pub fn concatenate(&self, other: &Column) -> Result<Column> {
        if self.data_type != other.data_type {
            return Err(Error::TypeMismatch {
                op: "concatenate",
                expected: "operands of equal type",
                found: other.data_type,
            });
        }
        let (head, tail) = (self.clone().flush(), other.clone().flush());
        let data = head
            .data
            .concat(&tail.data)
            .ok_or_else(|| Error::type_mismatch("concatenate", "equal buffers", other.data_type))?;
        let index = match (&head.index, &tail.index) {
            (Some(a), Some(b)) => {
                let shift = head.data.len() as u64;
                let mut spans = Vec::with_capacity(a.len() + b.len());
                spans.extend_from_slice(a);
                spans.par_extend(b.par_iter().map(|s| Span::new(s.offset + shift, s.len)));
                Some(spans.into())
            }
            _ => None,
        };
        Ok(Column {
            data_type: self.data_type,
            data,
            index,
        })
    }

    /// Repack String storage into ordered, disjoint, terminated spans.
    /// Other types and already compact columns are returned unchanged.
    pub fn flush(self) -> Column {
        if self.is_compact() {
            return self;
        }
        let max_len = self.max_len();
        match (self.bytes(), self.spans()) {
            (Some(bytes), Some(spans)) => {
                let (bytes, spans) = compact_strings(bytes, spans, max_len);
                Column::string(bytes.into(), spans.into())
            }
            _ => self,
        }
    }
}

/// Wavefront compaction.
///
/// Lays the rows of `spans` out back to back, each followed by one `0` byte.
/// Position `pos` of every row still longer than `pos` is copied in a single
/// gather/scatter pass, so the number of sequential steps is `max_len`, which
/// must bound every span length.
pub(crate) fn compact_strings(bytes: &[u8], spans: &[Span], max_len: u64) -> (Vec<u8>, Vec<Span>) {
    debug_assert!(spans.iter().all(|s| s.len <= max_len));
    let widths: Vec<u64> = spans.par_iter().map(|s| s.len + 1).collect();
    let offsets = scan_exclusive(&widths);
    let mut out = vec![0u8; sum_u64(&widths) as usize];

    let nonempty: Vec<bool> = spans.par_iter().map(|s| s.len > 0).collect();
    let mut active = where_true(&nonempty);
    for pos in 0..max_len {
        let alive: Vec<bool> = active
            .par_iter()
            .with_min_len(BATCH_CAPACITY)
            .map(|&r| spans[r as usize].len > pos)
            .collect();
        active = gather(&active, &where_true(&alive));
        let src: Vec<u64> = active.par_iter().map(|&r| spans[r as usize].offset + pos).collect();
        let dst: Vec<u64> = active.par_iter().map(|&r| offsets[r as usize] + pos).collect();
        scatter(&mut out, &dst, &gather(bytes, &src));
    }
    trace!(rows = spans.len(), steps = max_len, "compacted string column");

    let packed = spans
        .par_iter()
        .zip(offsets.par_iter())
        .map(|(s, &o)| Span::new(o, s.len))
        .collect();
    (out, packed)
}
