//! Date and time conversion from fixed-layout text.

use rayon::prelude::*;

use crate::{Column, DataType, DateFormat, Error, Result};

/// A run of digits inside the text layout and the output field it fills.
#[derive(Debug, Clone, Copy)]
struct Segment {
    start: u64,
    width: u64,
    slot: usize,
}

const YEAR: (u64, usize) = (4, 0);
const MONTH: (u64, usize) = (2, 1);
const DAY: (u64, usize) = (2, 2);
const TIME: [(u64, usize); 3] = [(2, 0), (2, 1), (2, 2)];

/// Upper bound of each output field, in Y M D h m s order.
const FIELD_MAX: [u16; 6] = [9999, 12, 31, 23, 59, 60];

impl DateFormat {
    fn fields(self) -> [(u64, usize); 3] {
        match self {
            DateFormat::YearMonthDay => [YEAR, MONTH, DAY],
            DateFormat::YearDayMonth => [YEAR, DAY, MONTH],
            DateFormat::MonthDayYear => [MONTH, DAY, YEAR],
            DateFormat::DayMonthYear => [DAY, MONTH, YEAR],
        }
    }
}

/// Append `fields` to `layout`, with one separator byte between fields when
/// `delimited`. Returns the position after the last field.
fn push_fields(
    layout: &mut Vec<Segment>,
    mut pos: u64,
    fields: &[(u64, usize)],
    base: usize,
    delimited: bool,
) -> u64 {
    for (i, &(width, slot)) in fields.iter().enumerate() {
        if i > 0 && delimited {
            pos += 1;
        }
        layout.push(Segment {
            start: pos,
            width,
            slot: base + slot,
        });
        pos += width;
    }
    pos
}

impl Column {
    /// Parse `YYYYMMDD`-style text (in `format` order) into a Date column.
    /// Delimited text carries one separator byte between fields.
    pub fn to_date(self, is_delimited: bool, format: DateFormat) -> Result<Column> {
        let mut layout = Vec::new();
        let end = push_fields(&mut layout, 0, &format.fields(), 0, is_delimited);
        self.parse_layout("to_date", DataType::Date, &layout, end)
    }

    /// Parse `HHMMSS` / `HH:MM:SS` text into a Time column.
    pub fn to_time(self, is_delimited: bool) -> Result<Column> {
        let mut layout = Vec::new();
        let end = push_fields(&mut layout, 0, &TIME, 0, is_delimited);
        self.parse_layout("to_time", DataType::Time, &layout, end)
    }

    /// Parse a date in `format` order followed by a time into a DateTime
    /// column. Delimited text separates the date and the time by one byte.
    pub fn to_datetime(self, is_delimited: bool, format: DateFormat) -> Result<Column> {
        let mut layout = Vec::new();
        let mut pos = push_fields(&mut layout, 0, &format.fields(), 0, is_delimited);
        if is_delimited {
            pos += 1;
        }
        let end = push_fields(&mut layout, pos, &TIME, 3, is_delimited);
        self.parse_layout("to_datetime", DataType::DateTime, &layout, end)
    }

    /// Date fields of a DateTime column.
    pub fn date_part(self) -> Result<Column> {
        self.split_datetime("date_part", DataType::Date, 0)
    }

    /// Time fields of a DateTime column.
    pub fn time_part(self) -> Result<Column> {
        self.split_datetime("time_part", DataType::Time, 3)
    }

    fn split_datetime(self, op: &'static str, target: DataType, first: usize) -> Result<Column> {
        let fields = match self.temporal_fields() {
            Some(fields) if self.data_type == DataType::DateTime => fields,
            _ => return Err(Error::type_mismatch(op, "DateTime", self.data_type)),
        };
        let part = fields
            .par_chunks(6)
            .flat_map_iter(|row| row[first..first + 3].iter().copied())
            .collect();
        Ok(Column::temporal(target, part))
    }

    /// Read every segment of `layout` as digits, one byte position at a time
    /// across all rows. Rows must be exactly `expected` bytes long or blank.
    fn parse_layout(
        self,
        op: &'static str,
        target: DataType,
        layout: &[Segment],
        expected: u64,
    ) -> Result<Column> {
        let (bytes, spans) = self.strings(op)?;
        if let Some(row) = spans
            .par_iter()
            .position_first(|s| s.len != 0 && s.len != expected)
        {
            return Err(Error::MalformedValue {
                row,
                reason: format!("{} bytes, expected {expected}", spans[row].len),
            });
        }

        let width = target.field_width();
        let base = if target == DataType::Time { 3 } else { 0 };
        let mut fields = vec![0u16; spans.len() * width];
        for segment in layout {
            for k in 0..segment.width {
                let pos = segment.start + k;
                let digits: Vec<Option<u16>> = spans
                    .par_iter()
                    .map(|s| match s.len {
                        0 => Some(0),
                        _ => {
                            let b = bytes[(s.offset + pos) as usize];
                            b.is_ascii_digit().then(|| u16::from(b - b'0'))
                        }
                    })
                    .collect();
                if let Some(row) = digits.par_iter().position_first(Option::is_none) {
                    return Err(Error::MalformedValue {
                        row,
                        reason: format!("byte {pos} is not a digit"),
                    });
                }
                fields
                    .par_chunks_mut(width)
                    .zip(digits.par_iter())
                    .for_each(|(row, d)| {
                        let f = &mut row[segment.slot];
                        *f = *f * 10 + d.unwrap_or(0);
                    });
            }
        }

        let limits = &FIELD_MAX[base..base + width];
        if let Some(row) = fields
            .par_chunks(width)
            .position_first(|row| row.iter().zip(limits).any(|(f, max)| f > max))
        {
            return Err(Error::MalformedValue {
                row,
                reason: "field out of range".into(),
            });
        }
        Ok(Column::temporal(target, fields))
    }
}
