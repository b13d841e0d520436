//! Deferred elementwise expressions.
//!
//! A [`Deferred`] is a length-known expression over an index space. Chaining
//! [`Deferred::map`] or [`Deferred::zip_with`] composes closures instead of
//! allocating intermediates, so a chain of broadcast operations runs as one
//! fused pass once [`Deferred::eval`] forces it.

use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::trace;

use crate::BATCH_CAPACITY;

type Expr<T> = Box<dyn Fn(usize) -> T + Send + Sync>;

/// Lazily evaluated vector of `len` elements.
pub struct Deferred<T> {
    len: usize,
    expr: Expr<T>,
}

impl<T: Send + 'static> Deferred<T> {
    /// Expression whose element `i` is `f(i)`.
    pub fn generate(len: usize, f: impl Fn(usize) -> T + Send + Sync + 'static) -> Self {
        Self {
            len,
            expr: Box::new(f),
        }
    }

    /// Expression reading an already materialized buffer.
    pub fn from_arc(values: Arc<[T]>) -> Self
    where
        T: Copy + Sync,
    {
        let len = values.len();
        Self::generate(len, move |i| values[i])
    }

    /// Broadcast one value over `len` elements.
    pub fn splat(len: usize, value: T) -> Self
    where
        T: Clone + Sync,
    {
        Self::generate(len, move |_| value.clone())
    }

    /// Number of elements the expression produces.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the expression is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Apply `f` to every element (fused, nothing is computed yet).
    pub fn map<U: Send + 'static>(
        self,
        f: impl Fn(T) -> U + Send + Sync + 'static,
    ) -> Deferred<U> {
        let expr = self.expr;
        Deferred {
            len: self.len,
            expr: Box::new(move |i| f(expr(i))),
        }
    }

    /// Combine two expressions elementwise. A one-element operand is
    /// broadcast against the other.
    pub fn zip_with<U: Send + 'static, V: Send + 'static>(
        self,
        other: Deferred<U>,
        f: impl Fn(T, U) -> V + Send + Sync + 'static,
    ) -> Deferred<V> {
        let (lhs_len, rhs_len) = (self.len, other.len);
        assert!(
            lhs_len == rhs_len || lhs_len == 1 || rhs_len == 1,
            "cannot broadcast {lhs_len} against {rhs_len}"
        );
        let len = if lhs_len == 1 { rhs_len } else { lhs_len };
        let (lhs, rhs) = (self.expr, other.expr);
        let lhs_step = usize::from(lhs_len != 1);
        let rhs_step = usize::from(rhs_len != 1);
        Deferred {
            len,
            expr: Box::new(move |i| f(lhs(i * lhs_step), rhs(i * rhs_step))),
        }
    }

    /// Materialization checkpoint: evaluate the fused expression in parallel.
    pub fn eval(self) -> Vec<T> {
        trace!(len = self.len, "materialize deferred expression");
        let expr = &self.expr;
        (0..self.len)
            .into_par_iter()
            .with_min_len(BATCH_CAPACITY)
            .map(|i| expr(i))
            .collect()
    }
}

impl Deferred<u64> {
    /// The index space `0, 1, .., len - 1`.
    pub fn iota(len: usize) -> Self {
        Self::generate(len, |i| i as u64)
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred").field("len", &self.len).finish()
    }
}
