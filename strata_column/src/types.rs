use serde::{Deserialize, Serialize};

/// Logical type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// `u8`
    UInt8,
    /// `u16`
    UInt16,
    /// `i16`
    Int16,
    /// `u32`
    UInt32,
    /// `i32`
    Int32,
    /// `i64`
    Int64,
    /// `u64`
    UInt64,
    /// `f32`
    Float32,
    /// `f64`
    Float64,
    /// `bool`
    Boolean,
    /// Variable-length byte strings.
    String,
    /// Year, month, day.
    Date,
    /// Hour, minute, second.
    Time,
    /// Date fields followed by time fields.
    DateTime,
}

impl DataType {
    /// Number of buffer elements per row. Strings are variable width and
    /// report 1 (one byte element per payload byte).
    pub fn field_width(self) -> usize {
        match self {
            DataType::Date | DataType::Time => 3,
            DataType::DateTime => 6,
            _ => 1,
        }
    }

    /// Date, Time or DateTime.
    pub fn is_temporal(self) -> bool {
        matches!(self, DataType::Date | DataType::Time | DataType::DateTime)
    }

    /// Integer and floating point types.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            DataType::UInt8
                | DataType::UInt16
                | DataType::Int16
                | DataType::UInt32
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt64
                | DataType::Float32
                | DataType::Float64
        )
    }
}

/// Field order of a textual date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateFormat {
    /// `YYYYMMDD` / `YYYY-MM-DD`
    YearMonthDay,
    /// `YYYYDDMM` / `YYYY-DD-MM`
    YearDayMonth,
    /// `MMDDYYYY` / `MM-DD-YYYY`
    MonthDayYear,
    /// `DDMMYYYY` / `DD-MM-YYYY`
    DayMonthYear,
}

/// Byte span of one String row inside the column buffer.
///
/// `len` counts payload bytes only. Compact columns follow every payload
/// with a single `0` terminator byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Start of the row's bytes.
    pub offset: u64,
    /// Number of payload bytes.
    pub len: u64,
}

impl Span {
    /// Create a span.
    pub const fn new(offset: u64, len: u64) -> Self {
        Self { offset, len }
    }

    /// One past the last payload byte.
    #[inline]
    pub fn end(self) -> u64 {
        self.offset + self.len
    }
}

/// A single materialized cell, as handed to terminal consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// `u8`
    UInt8(u8),
    /// `u16`
    UInt16(u16),
    /// `i16`
    Int16(i16),
    /// `u32`
    UInt32(u32),
    /// `i32`
    Int32(i32),
    /// `i64`
    Int64(i64),
    /// `u64`
    UInt64(u64),
    /// `f32`
    Float32(f32),
    /// `f64`
    Float64(f64),
    /// `bool`
    Boolean(bool),
    /// String payload (lossy UTF-8).
    String(String),
    /// Calendar date.
    Date {
        /// Year
        year: u16,
        /// Month
        month: u16,
        /// Day of month
        day: u16,
    },
    /// Time of day.
    Time {
        /// Hour
        hour: u16,
        /// Minute
        minute: u16,
        /// Second
        second: u16,
    },
    /// Date and time of day.
    DateTime {
        /// Year
        year: u16,
        /// Month
        month: u16,
        /// Day of month
        day: u16,
        /// Hour
        hour: u16,
        /// Minute
        minute: u16,
        /// Second
        second: u16,
    },
}

/// Scalar operand for numeric comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating point.
    Float(f64),
    /// Boolean (compares as 0 / 1).
    Bool(bool),
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<u64> for Scalar {
    fn from(v: u64) -> Self {
        Scalar::UInt(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl Scalar {
    pub(crate) fn to_num(self) -> Num {
        match self {
            Scalar::Int(v) => Num::Int(i128::from(v)),
            Scalar::UInt(v) => Num::Int(i128::from(v)),
            Scalar::Float(v) => Num::Float(v),
            Scalar::Bool(v) => Num::Int(i128::from(v)),
        }
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
}

impl CmpOp {
    /// `<`, `>`, `<=` or `>=`.
    pub fn is_ordering(self) -> bool {
        !matches!(self, CmpOp::Eq | CmpOp::Ne)
    }

    /// Apply the operator. Unordered operands (NaN) only satisfy `!=`.
    #[inline]
    pub fn eval<T: PartialOrd>(self, lhs: T, rhs: T) -> bool {
        match self {
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Ge => lhs >= rhs,
        }
    }
}

/// Widened numeric value used for cross-type comparison and casting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Num {
    Int(i128),
    Float(f64),
}

impl Num {
    pub(crate) fn compare(self, op: CmpOp, other: Num) -> bool {
        match (self, other) {
            (Num::Int(a), Num::Int(b)) => op.eval(a, b),
            (a, b) => op.eval(a.as_f64(), b.as_f64()),
        }
    }

    pub(crate) fn as_f64(self) -> f64 {
        match self {
            Num::Int(v) => v as f64,
            Num::Float(v) => v,
        }
    }

    /// Integer value, truncating toward zero and saturating.
    pub(crate) fn as_i128(self) -> i128 {
        match self {
            Num::Int(v) => v,
            Num::Float(v) if v.is_nan() => 0,
            Num::Float(v) => v as i128,
        }
    }
}
