//! Multi-key stable sort.

use rayon::prelude::*;
use strata_column::{Error, Result};
use strata_vec::{gather, sort_permutation, Deferred};
use tracing::debug;

use crate::Frame;

impl Frame {
    /// Reorder all rows by `columns`, most significant first, each ascending
    /// or descending per `ascending`. Rows that tie on every key keep their
    /// relative order.
    ///
    /// One permutation is refined by stable single-word passes, from the
    /// least significant word of the last key to the most significant word
    /// of the first; every column is gathered once at the end.
    pub fn sort_by(&mut self, columns: &[usize], ascending: &[bool]) -> Result<()> {
        if columns.len() != ascending.len() {
            return Err(Error::SchemaMismatch(format!(
                "{} sort keys with {} directions",
                columns.len(),
                ascending.len()
            )));
        }
        for &c in columns {
            self.column(c)?;
        }
        let rows = self.len();
        if let Some(field) = self.fields().iter().find(|f| f.column().len() != rows) {
            return Err(Error::SchemaMismatch(format!(
                "column {:?} has {} rows, expected {rows}",
                field.name(),
                field.column().len()
            )));
        }

        let mut order = Deferred::iota(rows).eval();
        let mut passes = 0;
        for (&c, &asc) in columns.iter().zip(ascending).rev() {
            let keys = self.column(c)?.hash(true);
            for w in (0..keys.words()).rev() {
                let current = gather(keys.word(w), &order);
                order = gather(&order, &sort_permutation(&current, asc));
                passes += 1;
            }
        }
        debug!(rows, keys = columns.len(), passes, "sort frame");

        let sorted = self
            .fields()
            .par_iter()
            .map(|f| f.column().select(&order))
            .collect::<Result<Vec<_>>>()?;
        for (index, column) in sorted.into_iter().enumerate() {
            *self.column_mut(index)? = column;
        }
        Ok(())
    }

    /// [`Frame::sort_by`] by column names.
    pub fn sort_by_names(&mut self, columns: &[&str], ascending: &[bool]) -> Result<()> {
        let ordinals = columns
            .iter()
            .map(|c| self.index_of(c))
            .collect::<Result<Vec<_>>>()?;
        self.sort_by(&ordinals, ascending)
    }
}
