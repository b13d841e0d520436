//! Typed primary buffers.
//!
//! Buffers are reference counted so derived columns can share storage until
//! one of them produces new data; nothing in the public API can observe the
//! sharing.

use std::sync::Arc;

use strata_vec::gather_rows;

use crate::types::Num;
use crate::{DataType, Value};

/// Flat element storage of a column.
#[derive(Debug, Clone, PartialEq)]
pub enum Buffer {
    /// Bytes (UInt8 values or String payloads).
    U8(Arc<[u8]>),
    /// UInt16 values, or Date/Time/DateTime fields.
    U16(Arc<[u16]>),
    /// Int16 values.
    I16(Arc<[i16]>),
    /// UInt32 values.
    U32(Arc<[u32]>),
    /// Int32 values.
    I32(Arc<[i32]>),
    /// Int64 values.
    I64(Arc<[i64]>),
    /// UInt64 values.
    U64(Arc<[u64]>),
    /// Float32 values.
    F32(Arc<[f32]>),
    /// Float64 values.
    F64(Arc<[f64]>),
    /// Boolean values.
    Bool(Arc<[bool]>),
}

/// Run `$body` with `$v` bound to the typed slice of every variant.
macro_rules! with_buffer {
    ($buf:expr, $v:ident => $body:expr) => {
        match $buf {
            $crate::buffer::Buffer::U8($v) => $body,
            $crate::buffer::Buffer::U16($v) => $body,
            $crate::buffer::Buffer::I16($v) => $body,
            $crate::buffer::Buffer::U32($v) => $body,
            $crate::buffer::Buffer::I32($v) => $body,
            $crate::buffer::Buffer::I64($v) => $body,
            $crate::buffer::Buffer::U64($v) => $body,
            $crate::buffer::Buffer::F32($v) => $body,
            $crate::buffer::Buffer::F64($v) => $body,
            $crate::buffer::Buffer::Bool($v) => $body,
        }
    };
}

/// Like `with_buffer!`, rewrapping the result in the same variant.
macro_rules! map_buffer {
    ($buf:expr, $v:ident => $body:expr) => {
        match $buf {
            $crate::buffer::Buffer::U8($v) => $crate::buffer::Buffer::U8($body),
            $crate::buffer::Buffer::U16($v) => $crate::buffer::Buffer::U16($body),
            $crate::buffer::Buffer::I16($v) => $crate::buffer::Buffer::I16($body),
            $crate::buffer::Buffer::U32($v) => $crate::buffer::Buffer::U32($body),
            $crate::buffer::Buffer::I32($v) => $crate::buffer::Buffer::I32($body),
            $crate::buffer::Buffer::I64($v) => $crate::buffer::Buffer::I64($body),
            $crate::buffer::Buffer::U64($v) => $crate::buffer::Buffer::U64($body),
            $crate::buffer::Buffer::F32($v) => $crate::buffer::Buffer::F32($body),
            $crate::buffer::Buffer::F64($v) => $crate::buffer::Buffer::F64($body),
            $crate::buffer::Buffer::Bool($v) => $crate::buffer::Buffer::Bool($body),
        }
    };
}

pub(crate) use {map_buffer, with_buffer};

impl Buffer {
    /// Number of elements.
    pub fn len(&self) -> usize {
        with_buffer!(self, v => v.len())
    }

    /// Whether the buffer holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gather rows of `width` elements each.
    pub(crate) fn gather_rows(&self, width: usize, idx: &[u64]) -> Buffer {
        map_buffer!(self, v => gather_rows(v, width, idx).into())
    }

    /// Append `other`; `None` when the physical types differ.
    pub(crate) fn concat(&self, other: &Buffer) -> Option<Buffer> {
        fn join<T: Copy>(a: &[T], b: &[T]) -> Arc<[T]> {
            let mut out = Vec::with_capacity(a.len() + b.len());
            out.extend_from_slice(a);
            out.extend_from_slice(b);
            out.into()
        }
        let joined = match (self, other) {
            (Buffer::U8(a), Buffer::U8(b)) => Buffer::U8(join(a, b)),
            (Buffer::U16(a), Buffer::U16(b)) => Buffer::U16(join(a, b)),
            (Buffer::I16(a), Buffer::I16(b)) => Buffer::I16(join(a, b)),
            (Buffer::U32(a), Buffer::U32(b)) => Buffer::U32(join(a, b)),
            (Buffer::I32(a), Buffer::I32(b)) => Buffer::I32(join(a, b)),
            (Buffer::I64(a), Buffer::I64(b)) => Buffer::I64(join(a, b)),
            (Buffer::U64(a), Buffer::U64(b)) => Buffer::U64(join(a, b)),
            (Buffer::F32(a), Buffer::F32(b)) => Buffer::F32(join(a, b)),
            (Buffer::F64(a), Buffer::F64(b)) => Buffer::F64(join(a, b)),
            (Buffer::Bool(a), Buffer::Bool(b)) => Buffer::Bool(join(a, b)),
            _ => return None,
        };
        Some(joined)
    }
}

/// Rust scalar types that back a fixed-width logical type.
pub trait NativeType: Copy + Send + Sync + PartialOrd + 'static {
    /// Logical type stored by columns of this element type.
    const DATA_TYPE: DataType;

    /// Borrow the elements when `buffer` has the matching variant.
    fn slice(buffer: &Buffer) -> Option<&[Self]>;

    /// Wrap owned values into a buffer.
    fn into_buffer(values: Vec<Self>) -> Buffer;

    /// Convert one element into a [`Value`].
    fn to_value(self) -> Value;
}

/// Numeric conversions used by comparison, cast and hashing.
pub(crate) trait Numeric: NativeType {
    fn to_num(self) -> Num;

    /// Convert, saturating at the bounds of `Self`.
    fn from_num(n: Num) -> Self;

    /// Order-preserving bijection onto `u64`.
    fn order_key(self) -> u64;
}

macro_rules! native {
    ($ty:ty, $dt:ident, $variant:ident, $value:ident) => {
        impl NativeType for $ty {
            const DATA_TYPE: DataType = DataType::$dt;

            fn slice(buffer: &Buffer) -> Option<&[Self]> {
                match buffer {
                    Buffer::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn into_buffer(values: Vec<Self>) -> Buffer {
                Buffer::$variant(values.into())
            }

            fn to_value(self) -> Value {
                Value::$value(self)
            }
        }
    };
}

native!(u8, UInt8, U8, UInt8);
native!(u16, UInt16, U16, UInt16);
native!(i16, Int16, I16, Int16);
native!(u32, UInt32, U32, UInt32);
native!(i32, Int32, I32, Int32);
native!(i64, Int64, I64, Int64);
native!(u64, UInt64, U64, UInt64);
native!(f32, Float32, F32, Float32);
native!(f64, Float64, F64, Float64);
native!(bool, Boolean, Bool, Boolean);

macro_rules! unsigned {
    ($($ty:ty),*) => {$(
        impl Numeric for $ty {
            fn to_num(self) -> Num {
                Num::Int(i128::from(self))
            }

            fn from_num(n: Num) -> Self {
                n.as_i128().clamp(0, i128::from(<$ty>::MAX)) as $ty
            }

            fn order_key(self) -> u64 {
                u64::from(self)
            }
        }
    )*};
}

macro_rules! signed {
    ($($ty:ty),*) => {$(
        impl Numeric for $ty {
            fn to_num(self) -> Num {
                Num::Int(i128::from(self))
            }

            fn from_num(n: Num) -> Self {
                n.as_i128().clamp(i128::from(<$ty>::MIN), i128::from(<$ty>::MAX)) as $ty
            }

            fn order_key(self) -> u64 {
                (i64::from(self) as u64) ^ (1 << 63)
            }
        }
    )*};
}

unsigned!(u8, u16, u32, u64);
signed!(i16, i32, i64);

impl Numeric for f32 {
    fn to_num(self) -> Num {
        Num::Float(f64::from(self))
    }

    fn from_num(n: Num) -> Self {
        n.as_f64() as f32
    }

    fn order_key(self) -> u64 {
        let bits = self.to_bits();
        let key = if bits >> 31 == 1 { !bits } else { bits | (1 << 31) };
        u64::from(key)
    }
}

impl Numeric for f64 {
    fn to_num(self) -> Num {
        Num::Float(self)
    }

    fn from_num(n: Num) -> Self {
        n.as_f64()
    }

    fn order_key(self) -> u64 {
        let bits = self.to_bits();
        if bits >> 63 == 1 {
            !bits
        } else {
            bits | (1 << 63)
        }
    }
}

impl Numeric for bool {
    fn to_num(self) -> Num {
        Num::Int(i128::from(self))
    }

    fn from_num(n: Num) -> Self {
        match n {
            Num::Int(v) => v != 0,
            Num::Float(v) => v != 0.0,
        }
    }

    fn order_key(self) -> u64 {
        u64::from(self)
    }
}
