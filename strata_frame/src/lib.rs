//! Strata frames and the sort-based equi-join.
//!
//! A [`Frame`] is an ordered collection of [`Column`]s. Relational operations
//! (project, select, zip, unionize, equi-join) return new frames; `sort_by`
//! reorders in place. Joins run on a [`JoinEngine`], which switches from flat
//! broadcast to a bounded worker pool once a problem grows past
//! [`EngineConfig::parallel_threshold`].
#![deny(missing_docs)]

mod config;
mod frame;
mod join;
mod parallel;
mod sort;

pub use config::EngineConfig;
pub use frame::{Field, Frame, Selection};
pub use join::{JoinEngine, JoinIndices};
pub use strata_column::{CmpOp, Column, DataType, DateFormat, Error, Result, Scalar, Span, Value};
