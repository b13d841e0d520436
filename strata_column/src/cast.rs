//! Type casts between scalar types and from String.

use rayon::prelude::*;
use strata_vec::{repeat_each, scan_exclusive, scan_exclusive_by, Deferred};
use tracing::debug;

use crate::buffer::{with_buffer, Numeric};
use crate::types::Num;
use crate::{Column, DataType, Error, Result, Span};

/// Longest digit run that is summed exactly in 128-bit arithmetic.
const MAX_DIGITS: u64 = 38;

impl Column {
    /// Convert to `target`, consuming the column.
    ///
    /// Numeric and Boolean sources convert by value, saturating at the
    /// bounds of the target (floats truncate toward zero, NaN becomes 0).
    /// String sources are parsed: `Boolean` is true when the first byte is
    /// one of `TtYy1`; numeric targets accept optional spaces, one leading
    /// sign and one decimal point. Date/time columns cannot be cast, and
    /// String is not a cast target.
    pub fn cast(self, target: DataType) -> Result<Column> {
        if self.data_type.is_temporal() {
            return Err(Error::type_mismatch("cast", "non-temporal source", self.data_type));
        }
        if target.is_temporal() || target == DataType::String {
            return Err(Error::type_mismatch("cast", "numeric or Boolean target", target));
        }
        if target == self.data_type {
            return Ok(self);
        }
        debug!(from = ?self.data_type, to = ?target, rows = self.len(), "cast column");
        match (self.bytes(), self.spans()) {
            (Some(bytes), Some(spans)) if target == DataType::Boolean => Ok(Column::from_bools(
                spans
                    .par_iter()
                    .map(|s| s.len > 0 && b"TtYy1".contains(&bytes[s.offset as usize]))
                    .collect(),
            )),
            (Some(bytes), Some(spans)) => {
                let nums = parse_numbers(bytes, spans)?;
                from_nums(target, &nums)
            }
            _ => {
                let nums: Vec<Num> = with_buffer!(&self.data, v => {
                    v[..].par_iter().map(|&x| x.to_num()).collect()
                });
                from_nums(target, &nums)
            }
        }
    }
}

fn build<T: Numeric>(nums: &[Num]) -> Column {
    Column::from_vec(nums.par_iter().map(|&n| T::from_num(n)).collect::<Vec<T>>())
}

fn from_nums(target: DataType, nums: &[Num]) -> Result<Column> {
    Ok(match target {
        DataType::UInt8 => build::<u8>(nums),
        DataType::UInt16 => build::<u16>(nums),
        DataType::Int16 => build::<i16>(nums),
        DataType::UInt32 => build::<u32>(nums),
        DataType::Int32 => build::<i32>(nums),
        DataType::Int64 => build::<i64>(nums),
        DataType::UInt64 => build::<u64>(nums),
        DataType::Float32 => build::<f32>(nums),
        DataType::Float64 => build::<f64>(nums),
        DataType::Boolean => build::<bool>(nums),
        DataType::String | DataType::Date | DataType::Time | DataType::DateTime => {
            return Err(Error::type_mismatch("cast", "numeric or Boolean target", target))
        }
    })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Class {
    Digit(u8),
    Space,
    Point,
    Minus,
    Plus,
    Other,
}

impl Class {
    fn of(byte: u8) -> Self {
        match byte {
            b'0'..=b'9' => Class::Digit(byte - b'0'),
            b' ' | b'\t' | 0 => Class::Space,
            b'.' => Class::Point,
            b'-' => Class::Minus,
            b'+' => Class::Plus,
            _ => Class::Other,
        }
    }
}

/// Per-row totals of a per-byte flag, from an exclusive scan over all bytes.
fn segment_sums(prefix: &[u64], total: u64, starts: &[u64], lens: &[u64]) -> Vec<u64> {
    let at = |i: u64| prefix.get(i as usize).copied().unwrap_or(total);
    starts
        .par_iter()
        .zip(lens.par_iter())
        .map(|(&s, &n)| at(s + n) - at(s))
        .collect()
}

/// Parse every row as a decimal number.
///
/// All bytes of all rows are classified in one flat pass. Segmented scans
/// give each digit its rank within the row; the digit is weighted by
/// `10^(digits - 1 - rank)` and a wrapping prefix sum over the weighted
/// digits yields each row's mantissa as a difference of two scan entries.
/// Sign and decimal scaling are applied per row afterwards. Blank rows are 0.
fn parse_numbers(bytes: &[u8], spans: &[Span]) -> Result<Vec<Num>> {
    let rows = spans.len();
    let lens: Vec<u64> = spans.par_iter().map(|s| s.len).collect();
    let starts = scan_exclusive(&lens);
    let row_of = repeat_each(&Deferred::iota(rows).eval(), &lens);
    let total = row_of.len() as u64;

    let classes: Vec<Class> = row_of
        .par_iter()
        .enumerate()
        .map(|(i, &r)| {
            let pos = i as u64 - starts[r as usize];
            Class::of(bytes[(spans[r as usize].offset + pos) as usize])
        })
        .collect();
    let flag = |pred: fn(Class) -> bool| -> (Vec<u64>, u64) {
        let flags: Vec<u64> = classes.par_iter().map(|&c| u64::from(pred(c))).collect();
        let prefix = scan_exclusive(&flags);
        let sum = prefix.last().copied().unwrap_or(0) + flags.last().copied().unwrap_or(0);
        (prefix, sum)
    };
    let (digit_prefix, digit_total) = flag(|c| matches!(c, Class::Digit(_)));
    let (point_prefix, point_total) = flag(|c| c == Class::Point);
    let (sign_prefix, sign_total) = flag(|c| matches!(c, Class::Minus | Class::Plus));
    let (minus_prefix, minus_total) = flag(|c| c == Class::Minus);
    let (other_prefix, other_total) = flag(|c| c == Class::Other);

    let digits = segment_sums(&digit_prefix, digit_total, &starts, &lens);
    let points = segment_sums(&point_prefix, point_total, &starts, &lens);
    let signs = segment_sums(&sign_prefix, sign_total, &starts, &lens);
    let minus = segment_sums(&minus_prefix, minus_total, &starts, &lens);
    let others = segment_sums(&other_prefix, other_total, &starts, &lens);

    // Per byte: digits and points seen earlier in the same row.
    let before = |prefix: &[u64], i: usize| prefix[i] - prefix[starts[row_of[i] as usize] as usize];
    let late_sign: Vec<u64> = (0..classes.len())
        .into_par_iter()
        .map(|i| {
            let sign = matches!(classes[i], Class::Minus | Class::Plus);
            u64::from(sign && (before(&digit_prefix, i) > 0 || before(&point_prefix, i) > 0))
        })
        .collect();
    let late_prefix = scan_exclusive(&late_sign);
    let late_total = late_prefix.last().copied().unwrap_or(0) + late_sign.last().copied().unwrap_or(0);
    let late = segment_sums(&late_prefix, late_total, &starts, &lens);

    let reject = |row: usize| -> Option<&'static str> {
        if others[row] > 0 {
            Some("unexpected character")
        } else if points[row] > 1 {
            Some("more than one decimal point")
        } else if signs[row] > 1 || late[row] > 0 {
            Some("sign must lead the number")
        } else if digits[row] > MAX_DIGITS {
            Some("too many digits")
        } else {
            None
        }
    };
    if let Some(row) = (0..rows).into_par_iter().position_first(|r| reject(r).is_some()) {
        let reason = reject(row).unwrap_or_default().to_string();
        return Err(Error::MalformedValue { row, reason });
    }

    let weighted: Vec<i128> = (0..classes.len())
        .into_par_iter()
        .map(|i| match classes[i] {
            Class::Digit(d) => {
                let row = row_of[i] as usize;
                let rank = before(&digit_prefix, i);
                let exponent = (digits[row] - 1 - rank) as u32;
                i128::from(d) * 10i128.pow(exponent)
            }
            _ => 0,
        })
        .collect();
    let sums = scan_exclusive_by(&weighted, 0i128, i128::wrapping_add);
    let grand = sums.last().copied().unwrap_or(0).wrapping_add(weighted.last().copied().unwrap_or(0));
    let at = |i: u64| sums.get(i as usize).copied().unwrap_or(grand);

    // Digits after the point set the decimal scale.
    let fraction: Vec<u64> = (0..classes.len())
        .into_par_iter()
        .map(|i| u64::from(matches!(classes[i], Class::Digit(_)) && before(&point_prefix, i) > 0))
        .collect();
    let frac_prefix = scan_exclusive(&fraction);
    let frac_total = frac_prefix.last().copied().unwrap_or(0) + fraction.last().copied().unwrap_or(0);
    let scale = segment_sums(&frac_prefix, frac_total, &starts, &lens);

    Ok((0..rows)
        .into_par_iter()
        .map(|r| {
            let (s, n) = (starts[r], lens[r]);
            let mantissa = at(s + n).wrapping_sub(at(s));
            let signed = if minus[r] > 0 { -mantissa } else { mantissa };
            if scale[r] == 0 {
                Num::Int(signed)
            } else {
                Num::Float(signed as f64 / 10f64.powi(scale[r] as i32))
            }
        })
        .collect())
}
