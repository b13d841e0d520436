//! Strata column model.
//!
//! A [`Column`] is a typed, buffer-backed attribute. Fixed-width types store a
//! flat buffer; String stores a byte buffer plus per-row [`Span`]s;
//! Date/Time/DateTime store three or six `u16` fields per row and are only
//! produced from String text. Every algorithm here is written against the
//! batch primitives of `strata_vec`, never as per-row control flow.
#![deny(missing_docs)]

mod buffer;
mod cast;
mod column;
mod compare;
mod error;
mod hash;
mod substring;
mod temporal;
mod types;

pub use buffer::{Buffer, NativeType};
pub use column::Column;
pub use error::{Error, Result};
pub use hash::KeyBuffer;
pub use types::{CmpOp, DataType, DateFormat, Scalar, Span, Value};
