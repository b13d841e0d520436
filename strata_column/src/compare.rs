//! Row-wise comparisons producing boolean masks.

use std::sync::Arc;

use rayon::prelude::*;
use strata_vec::{gather, max_u64, scatter, where_true, Deferred};

use crate::buffer::{with_buffer, Buffer, Numeric};
use crate::{CmpOp, Column, DataType, Error, Result, Scalar};

fn compare_slices<T: Numeric>(op: CmpOp, lhs: &[T], rhs: &[T]) -> Vec<bool> {
    lhs.par_iter()
        .zip(rhs.par_iter())
        .map(|(&a, &b)| op.eval(a, b))
        .collect()
}

macro_rules! compare_native {
    ($op:expr, $lhs:expr, $rhs:expr, $($variant:ident),*) => {
        match ($lhs, $rhs) {
            $((Buffer::$variant(a), Buffer::$variant(b)) => Some(compare_slices($op, a, b)),)*
            _ => None,
        }
    };
}

impl Column {
    fn check_operator(&self, op: CmpOp) -> Result<()> {
        if op.is_ordering() && self.data_type == DataType::String {
            return Err(Error::type_mismatch("ordering comparison", "non-String type", self.data_type));
        }
        Ok(())
    }

    /// Compare row `i` of `self` with row `i` of `other`.
    ///
    /// String and date/time columns compare through their single-word hash,
    /// so only `==` and `!=` are accepted for String.
    pub fn compare(&self, op: CmpOp, other: &Column) -> Result<Vec<bool>> {
        if self.data_type != other.data_type {
            return Err(Error::type_mismatch("compare", "operands of equal type", other.data_type));
        }
        if self.len() != other.len() {
            return Err(Error::SchemaMismatch(format!(
                "cannot compare {} rows with {} rows",
                self.len(),
                other.len()
            )));
        }
        self.check_operator(op)?;
        if self.data_type == DataType::String || self.data_type.is_temporal() {
            let (lhs, rhs) = (self.hash(false).into_inner(), other.hash(false).into_inner());
            return Ok(compare_slices(op, &lhs, &rhs));
        }
        compare_native!(op, &self.data, &other.data, U8, U16, I16, U32, I32, I64, U64, F32, F64, Bool)
            .ok_or_else(|| Error::type_mismatch("compare", "operands of equal type", other.data_type))
    }

    /// Compare every row's key against `keys`, which holds either one key per
    /// row or a single key broadcast to all rows. Keys must come from
    /// [`Column::hash`] with `sortable == false` on a column of the same type.
    pub fn compare_keys(&self, op: CmpOp, keys: &[u64]) -> Result<Vec<bool>> {
        self.check_operator(op)?;
        if keys.len() != 1 && keys.len() != self.len() {
            return Err(Error::SchemaMismatch(format!(
                "{} keys for {} rows",
                keys.len(),
                self.len()
            )));
        }
        let own: Arc<[u64]> = self.hash(false).into_inner().into();
        let other: Arc<[u64]> = keys.into();
        Ok(Deferred::from_arc(own)
            .zip_with(Deferred::from_arc(other), move |a, b| op.eval(a, b))
            .eval())
    }

    /// Compare a numeric or Boolean column against a scalar. Mixed signedness
    /// and integer/float operands compare by value.
    pub fn compare_scalar(&self, op: CmpOp, rhs: Scalar) -> Result<Vec<bool>> {
        if !(self.data_type.is_numeric() || self.data_type == DataType::Boolean) {
            return Err(Error::type_mismatch("compare_scalar", "numeric or Boolean", self.data_type));
        }
        let rhs = rhs.to_num();
        Ok(with_buffer!(&self.data, v => {
            v[..].par_iter().map(|&x| x.to_num().compare(op, rhs)).collect()
        }))
    }

    /// Rows whose bytes equal `needle` exactly.
    pub fn string_match(&self, needle: &str) -> Result<Vec<bool>> {
        let (bytes, spans) = self.strings("string_match")?;
        let needle = needle.as_bytes();
        Ok(spans
            .par_iter()
            .map(|s| &bytes[s.offset as usize..s.end() as usize] == needle)
            .collect())
    }

    /// Byte equality of `self[rows[i]]` and `other[other_rows[i]]` for every
    /// pair, compared one byte position at a time across all pairs still
    /// equal so far.
    pub fn rows_equal(&self, rows: &[u64], other: &Column, other_rows: &[u64]) -> Result<Vec<bool>> {
        let (lhs_bytes, lhs_spans) = self.strings("rows_equal")?;
        let (rhs_bytes, rhs_spans) = other.strings("rows_equal")?;
        if rows.len() != other_rows.len() {
            return Err(Error::SchemaMismatch(format!(
                "{} left rows paired with {} right rows",
                rows.len(),
                other_rows.len()
            )));
        }
        let (lhs_len, rhs_len) = (self.len() as u64, other.len() as u64);
        if rows.par_iter().any(|&r| r >= lhs_len) || other_rows.par_iter().any(|&r| r >= rhs_len) {
            return Err(Error::InvalidSelection("row pair out of range".into()));
        }
        let lhs = gather(lhs_spans, rows);
        let rhs = gather(rhs_spans, other_rows);

        let mut equal: Vec<bool> = lhs.par_iter().zip(rhs.par_iter()).map(|(a, b)| a.len == b.len).collect();
        let lens: Vec<u64> = lhs.par_iter().map(|s| s.len).collect();
        let mut active = where_true(&equal);
        for pos in 0..max_u64(&gather(&lens, &active)) {
            let alive: Vec<bool> = active.par_iter().map(|&i| lens[i as usize] > pos).collect();
            active = gather(&active, &where_true(&alive));
            let differs: Vec<bool> = active
                .par_iter()
                .map(|&i| {
                    let (a, b) = (lhs[i as usize], rhs[i as usize]);
                    lhs_bytes[(a.offset + pos) as usize] != rhs_bytes[(b.offset + pos) as usize]
                })
                .collect();
            let mismatched = gather(&active, &where_true(&differs));
            scatter(&mut equal, &mismatched, &vec![false; mismatched.len()]);
            let same: Vec<bool> = differs.par_iter().map(|d| !d).collect();
            active = gather(&active, &where_true(&same));
        }
        Ok(equal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_comparisons() {
        let a = Column::from_vec(vec![1i64, 5, -3]);
        let b = Column::from_vec(vec![2i64, 5, -4]);
        assert_eq!(a.compare(CmpOp::Lt, &b).unwrap(), vec![true, false, false]);
        assert_eq!(a.compare(CmpOp::Ge, &b).unwrap(), vec![false, true, true]);
        let c = Column::from_vec(vec![1i32, 5, -3]);
        assert!(matches!(a.compare(CmpOp::Eq, &c), Err(Error::TypeMismatch { .. })));
        let d = Column::from_vec(vec![1i64]);
        assert!(matches!(a.compare(CmpOp::Eq, &d), Err(Error::SchemaMismatch(_))));
    }

    #[test]
    fn strings_allow_only_equality() {
        let a = Column::from_strs(["x", "yy", "z"]);
        let b = Column::from_strs(["x", "y", "z"]);
        assert_eq!(a.compare(CmpOp::Eq, &b).unwrap(), vec![true, false, true]);
        assert_eq!(a.compare(CmpOp::Ne, &b).unwrap(), vec![false, true, false]);
        assert!(matches!(a.compare(CmpOp::Lt, &b), Err(Error::TypeMismatch { .. })));
        assert!(matches!(a.compare_keys(CmpOp::Gt, &[0]), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn dates_order_through_hash() {
        let a = Column::temporal(DataType::Date, vec![2020, 1, 31, 2021, 6, 1]);
        let b = Column::temporal(DataType::Date, vec![2020, 2, 1, 2021, 6, 1]);
        assert_eq!(a.compare(CmpOp::Lt, &b).unwrap(), vec![true, false]);
        assert_eq!(a.compare(CmpOp::Le, &b).unwrap(), vec![true, true]);
    }

    #[test]
    fn key_comparison_broadcasts() {
        let col = Column::from_strs(["a", "b", "a"]);
        let key = Column::from_strs(["a"]).hash(false).into_inner();
        assert_eq!(col.compare_keys(CmpOp::Eq, &key).unwrap(), vec![true, false, true]);
        assert!(matches!(col.compare_keys(CmpOp::Eq, &[1, 2]), Err(Error::SchemaMismatch(_))));
    }

    #[test]
    fn scalar_comparison_crosses_widths() {
        let col = Column::from_vec(vec![0u8, 200, 255]);
        assert_eq!(col.compare_scalar(CmpOp::Gt, Scalar::Int(-1)).unwrap(), vec![true, true, true]);
        assert_eq!(col.compare_scalar(CmpOp::Ge, Scalar::Float(199.5)).unwrap(), vec![false, true, true]);
        let flags = Column::from_bools(vec![true, false]);
        assert_eq!(flags.compare_scalar(CmpOp::Eq, true.into()).unwrap(), vec![true, false]);
        let s = Column::from_strs(["1"]);
        assert!(s.compare_scalar(CmpOp::Eq, Scalar::Int(1)).is_err());
    }

    #[test]
    fn matching_and_row_equality() {
        let col = Column::from_strs(["apple", "pear", "apple pie"]);
        assert_eq!(col.string_match("apple").unwrap(), vec![true, false, false]);

        let other = Column::from_strs(["apple pie", "pear", "peas"]);
        let eq = col.rows_equal(&[2, 1, 1, 0], &other, &[0, 1, 2, 2]).unwrap();
        assert_eq!(eq, vec![true, true, false, false]);
        assert!(Column::from_vec(vec![1u8]).string_match("1").is_err());
    }
}
