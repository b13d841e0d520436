//! Frames: ordered, optionally named collections of equal-length columns.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use strata_column::{Column, Error, Result, Value};
use tracing::debug;

use crate::join::{JoinEngine, JoinIndices};

/// One column slot of a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: Option<String>,
    column: Column,
}

impl Field {
    /// Bound name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The column.
    pub fn column(&self) -> &Column {
        &self.column
    }
}

/// Row filter applied by [`Frame::select`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selection {
    /// Rows to gather, in output order. Repeats are allowed.
    Indices(Vec<u64>),
    /// Keep rows whose entry is `true`.
    Mask(Vec<bool>),
}

/// Ordered collection of columns sharing a row count.
///
/// The field list is the only schema state: a column's ordinal is its
/// position and each name is bound to at most one field, so inserting or
/// removing a column shifts every later binding with it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    name: String,
    fields: Vec<Field>,
}

impl Frame {
    /// Empty frame.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Frame label, used to qualify column names in zip and join output.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Change the frame label.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.fields.len()
    }

    /// Row count (of the first column; all columns are expected to agree).
    pub fn len(&self) -> usize {
        self.fields.first().map_or(0, |f| f.column.len())
    }

    /// Whether the frame has no columns.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Drop every column.
    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// Fields in order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Names in ordinal order; `None` for unnamed columns.
    pub fn names(&self) -> Vec<Option<&str>> {
        self.fields.iter().map(Field::name).collect()
    }

    fn check_ordinal(&self, index: usize) -> Result<()> {
        if index >= self.fields.len() {
            return Err(Error::InvalidColumnReference(format!(
                "column {index} of {} in frame '{}'",
                self.fields.len(),
                self.name
            )));
        }
        Ok(())
    }

    /// Ordinal of the column bound to `name`.
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.fields
            .iter()
            .position(|f| f.name.as_deref() == Some(name))
            .ok_or_else(|| {
                Error::InvalidColumnReference(format!("no column '{name}' in frame '{}'", self.name))
            })
    }

    /// Column at `index`.
    pub fn column(&self, index: usize) -> Result<&Column> {
        self.check_ordinal(index)?;
        Ok(&self.fields[index].column)
    }

    /// Mutable column at `index`.
    pub fn column_mut(&mut self, index: usize) -> Result<&mut Column> {
        self.check_ordinal(index)?;
        Ok(&mut self.fields[index].column)
    }

    /// Column bound to `name`.
    pub fn column_by_name(&self, name: &str) -> Result<&Column> {
        let index = self.index_of(name)?;
        Ok(&self.fields[index].column)
    }

    /// Name bound to column `index`.
    pub fn column_name(&self, index: usize) -> Option<&str> {
        self.fields.get(index).and_then(Field::name)
    }

    fn unbind(&mut self, name: &str) {
        for field in &mut self.fields {
            if field.name.as_deref() == Some(name) {
                field.name = None;
            }
        }
    }

    /// Append a column, returning its ordinal. A name already in use moves to
    /// the new column.
    pub fn add(&mut self, column: Column, name: Option<&str>) -> usize {
        if let Some(name) = name {
            self.unbind(name);
        }
        self.fields.push(Field {
            name: name.map(str::to_owned),
            column,
        });
        self.fields.len() - 1
    }

    /// Insert a column at `index`, shifting later columns right.
    pub fn insert(&mut self, index: usize, column: Column, name: Option<&str>) -> Result<()> {
        if index > self.fields.len() {
            return Err(Error::InvalidColumnReference(format!(
                "cannot insert at {index} into {} columns",
                self.fields.len()
            )));
        }
        if let Some(name) = name {
            self.unbind(name);
        }
        self.fields.insert(
            index,
            Field {
                name: name.map(str::to_owned),
                column,
            },
        );
        Ok(())
    }

    /// Remove and return the column at `index`, shifting later columns left.
    pub fn remove(&mut self, index: usize) -> Result<Column> {
        self.check_ordinal(index)?;
        Ok(self.fields.remove(index).column)
    }

    /// Remove the column bound to `name`.
    pub fn remove_by_name(&mut self, name: &str) -> Result<Column> {
        let index = self.index_of(name)?;
        self.remove(index)
    }

    /// Bind `name` to column `index`, replacing that column's previous name
    /// and taking the name from any other column.
    pub fn name_column(&mut self, index: usize, name: &str) -> Result<()> {
        self.check_ordinal(index)?;
        self.unbind(name);
        self.fields[index].name = Some(name.to_owned());
        Ok(())
    }

    /// Rename the column bound to `old`.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        let index = self.index_of(old)?;
        self.name_column(index, new)
    }

    /// Append without moving names; a clash is a schema error.
    fn push_unique(&mut self, column: Column, name: Option<String>) -> Result<()> {
        if let Some(name) = &name {
            if self.index_of(name).is_ok() {
                return Err(Error::SchemaMismatch(format!("column name '{name}' appears twice")));
            }
        }
        self.fields.push(Field { name, column });
        Ok(())
    }

    /// Name a right-hand column takes in zip and join output. An unnamed
    /// frame still prefixes the separator, so `a` becomes `.a`.
    fn qualify(&self, column: Option<&str>) -> Option<String> {
        column.map(|c| format!("{}.{c}", self.name))
    }

    /// New frame with the columns at `columns`, in that order, keeping their
    /// names.
    pub fn project(&self, columns: &[usize], name: &str) -> Result<Frame> {
        let mut out = Frame::new(name);
        for &index in columns {
            self.check_ordinal(index)?;
            let field = &self.fields[index];
            out.push_unique(field.column.clone(), field.name.clone())?;
        }
        Ok(out)
    }

    /// [`Frame::project`] by column names.
    pub fn project_by_names(&self, columns: &[&str], name: &str) -> Result<Frame> {
        let ordinals = columns
            .iter()
            .map(|c| self.index_of(c))
            .collect::<Result<Vec<_>>>()?;
        self.project(&ordinals, name)
    }

    /// Apply one row filter to every column. The source is left untouched;
    /// the result takes `name`, or this frame's name when `None`.
    pub fn select(&self, selection: &Selection, name: Option<&str>) -> Result<Frame> {
        let rows = self.len();
        let owned;
        let idx = match selection {
            Selection::Indices(idx) => idx.as_slice(),
            Selection::Mask(mask) => {
                if mask.len() != rows {
                    return Err(Error::InvalidSelection(format!(
                        "mask of {} entries for {rows} rows",
                        mask.len()
                    )));
                }
                owned = strata_vec::where_true(mask);
                owned.as_slice()
            }
        };
        let columns = self
            .fields
            .par_iter()
            .map(|f| f.column.select(idx))
            .collect::<Result<Vec<_>>>()?;
        debug!(frame = %self.name, rows_in = rows, rows_out = idx.len(), "select");
        Ok(Frame {
            name: name.map_or_else(|| self.name.clone(), str::to_owned),
            fields: self
                .fields
                .iter()
                .zip(columns)
                .map(|(f, column)| Field {
                    name: f.name.clone(),
                    column,
                })
                .collect(),
        })
    }

    /// Exact-match mask over a String column.
    pub fn string_match(&self, column: usize, needle: &str) -> Result<Vec<bool>> {
        self.column(column)?.string_match(needle)
    }

    /// Side-by-side concatenation. Named right-hand columns are qualified
    /// as `"{rhs.name}.{column}"`.
    pub fn zip(&self, rhs: &Frame) -> Result<Frame> {
        if !self.is_empty() && !rhs.is_empty() && self.len() != rhs.len() {
            return Err(Error::SchemaMismatch(format!(
                "cannot zip {} rows with {} rows",
                self.len(),
                rhs.len()
            )));
        }
        let mut out = self.clone();
        for field in &rhs.fields {
            out.push_unique(field.column.clone(), rhs.qualify(field.name.as_deref()))?;
        }
        Ok(out)
    }

    /// Stack `rhs` below this frame. Columns pair up by position and must
    /// agree in count and type; names come from this frame.
    pub fn unionize(&self, rhs: &Frame) -> Result<Frame> {
        if self.width() != rhs.width() {
            return Err(Error::SchemaMismatch(format!(
                "cannot union {} columns with {} columns",
                self.width(),
                rhs.width()
            )));
        }
        if let Some(i) = (0..self.width()).find(|&i| {
            self.fields[i].column.data_type() != rhs.fields[i].column.data_type()
        }) {
            return Err(Error::SchemaMismatch(format!(
                "column {i} is {:?} on the left and {:?} on the right",
                self.fields[i].column.data_type(),
                rhs.fields[i].column.data_type()
            )));
        }
        let columns = self
            .fields
            .par_iter()
            .zip(rhs.fields.par_iter())
            .map(|(a, b)| a.column.concatenate(&b.column))
            .collect::<Result<Vec<_>>>()?;
        Ok(Frame {
            name: self.name.clone(),
            fields: self
                .fields
                .iter()
                .zip(columns)
                .map(|(f, column)| Field {
                    name: f.name.clone(),
                    column,
                })
                .collect(),
        })
    }

    /// Same as [`Frame::unionize`].
    pub fn concatenate(&self, rhs: &Frame) -> Result<Frame> {
        self.unionize(rhs)
    }

    /// Inner equi-join on `self[left_column] == rhs[right_column]` using the
    /// process-wide [`JoinEngine`].
    pub fn equi_join(&self, rhs: &Frame, left_column: usize, right_column: usize) -> Result<Frame> {
        JoinEngine::global().equi_join(self, rhs, left_column, right_column)
    }

    /// [`Frame::equi_join`] by column names.
    pub fn equi_join_by_names(
        &self,
        rhs: &Frame,
        left_column: &str,
        right_column: &str,
    ) -> Result<Frame> {
        self.equi_join(rhs, self.index_of(left_column)?, rhs.index_of(right_column)?)
    }

    /// Join output: every column of `self` gathered by the left rows, then
    /// every column of `rhs` except `skip` gathered by the right rows.
    pub(crate) fn assemble_join(
        &self,
        rhs: &Frame,
        skip: usize,
        matches: &JoinIndices,
    ) -> Result<Frame> {
        let mut out = Frame::new(self.name.clone());
        for field in &self.fields {
            out.push_unique(field.column.select(&matches.left)?, field.name.clone())?;
        }
        for (_, field) in rhs.fields.iter().enumerate().filter(|(i, _)| *i != skip) {
            let name = rhs.qualify(field.name.as_deref());
            out.push_unique(field.column.select(&matches.right)?, name)?;
        }
        Ok(out)
    }

    /// Materialize all rows, column values in ordinal order.
    pub fn to_rows(&self) -> Vec<Vec<Value>> {
        let columns: Vec<Vec<Value>> = self.fields.iter().map(|f| f.column.to_values()).collect();
        (0..self.len())
            .map(|r| columns.iter().filter_map(|c| c.get(r).cloned()).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        let mut f = Frame::new("t");
        f.add(Column::from_vec(vec![1i32, 2, 3]), Some("a"));
        f.add(Column::from_strs(["x", "y", "z"]), Some("b"));
        f.add(Column::from_vec(vec![0.5f64, 1.5, 2.5]), None);
        f
    }

    #[test]
    fn insert_and_remove_shift_bindings() {
        let mut f = frame();
        f.insert(0, Column::from_bools(vec![true, false, true]), Some("flag")).unwrap();
        assert_eq!(f.index_of("flag").unwrap(), 0);
        assert_eq!(f.index_of("a").unwrap(), 1);
        assert_eq!(f.index_of("b").unwrap(), 2);
        assert_eq!(f.names(), vec![Some("flag"), Some("a"), Some("b"), None]);

        f.remove(1).unwrap();
        assert_eq!(f.index_of("b").unwrap(), 1);
        assert!(matches!(f.index_of("a"), Err(Error::InvalidColumnReference(_))));
        assert!(matches!(f.remove(9), Err(Error::InvalidColumnReference(_))));
        assert!(f.insert(9, Column::from_vec(vec![1u8]), None).is_err());
    }

    #[test]
    fn names_move_instead_of_duplicating() {
        let mut f = frame();
        f.name_column(2, "a").unwrap();
        assert_eq!(f.names(), vec![None, Some("b"), Some("a")]);
        f.rename("b", "c").unwrap();
        assert_eq!(f.column_name(1), Some("c"));
        let col = f.remove_by_name("a").unwrap();
        assert_eq!(col.values::<f64>(), Some(&[0.5, 1.5, 2.5][..]));
        assert_eq!(f.width(), 2);
    }

    #[test]
    fn project_and_select_copy() {
        let f = frame();
        let p = f.project_by_names(&["b", "a"], "p").unwrap();
        assert_eq!(p.names(), vec![Some("b"), Some("a")]);
        assert!(f.project(&[7], "p").is_err());

        let picked = f.select(&Selection::Mask(vec![true, false, true]), None).unwrap();
        assert_eq!(picked.len(), 2);
        assert_eq!(picked.name(), "t");
        assert_eq!(f.len(), 3);
        let by_idx = f.select(&Selection::Indices(vec![2, 0]), Some("s")).unwrap();
        assert_eq!(by_idx.to_rows()[0][1], Value::String("z".into()));
        assert!(f.select(&Selection::Mask(vec![true]), None).is_err());
        assert_eq!(f.string_match(1, "y").unwrap(), vec![false, true, false]);
    }

    #[test]
    fn zip_qualifies_right_names() {
        let f = frame();
        let mut g = Frame::new("u");
        g.add(Column::from_vec(vec![7u8, 8, 9]), Some("a"));
        let z = f.zip(&g).unwrap();
        assert_eq!(z.names(), vec![Some("a"), Some("b"), None, Some("u.a")]);

        let mut short = Frame::new("s");
        short.add(Column::from_vec(vec![1u8]), None);
        assert!(matches!(f.zip(&short), Err(Error::SchemaMismatch(_))));

        let mut bare = Frame::new("");
        bare.add(Column::from_vec(vec![7u8, 8, 9]), Some("a"));
        let z = f.zip(&bare).unwrap();
        assert_eq!(z.column_name(3), Some(".a"));
        assert_eq!(z.column_by_name("a").unwrap().len(), 3);

        let mut again = z.clone();
        again.set_name("");
        assert!(matches!(again.zip(&bare), Err(Error::SchemaMismatch(_))));
    }

    #[test]
    fn unionize_checks_positional_types() {
        let f = frame();
        let u = f.unionize(&f).unwrap();
        assert_eq!(u.len(), 6);
        assert_eq!(u.to_rows()[4][1], Value::String("y".into()));

        let mut g = f.clone();
        g.remove(2).unwrap();
        g.add(Column::from_vec(vec![1i64, 2, 3]), None);
        assert!(matches!(f.concatenate(&g), Err(Error::SchemaMismatch(_))));
    }
}
