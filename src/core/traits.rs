//! Core linear-algebra traits.

use std::borrow::Cow;

use crate::core::classify::Scalar;
use crate::expr::MatExpr;
use crate::matrix::SparseMatrix;

/// Inner products & norms.
pub trait InnerProduct<V> {
    /// Associated scalar type.
    type Scalar: num_traits::Float;
    /// Compute dot(x, y).
    fn dot(&self, x: &V, y: &V) -> Self::Scalar;
    /// Compute ‖x‖₂.
    fn norm(&self, x: &V) -> Self::Scalar;
}

/// Uniform indexing into vectors and matrices.
pub trait Indexing {
    /// Number of rows (or length for a vector).
    fn nrows(&self) -> usize;
}

/// A system matrix the solvers can work with: usable as an expression leaf and
/// readable row by row.
pub trait SystemMatrix<T: Scalar>: Indexing + Sync {
    fn ncols(&self) -> usize;
    /// Borrowing leaf expression over the matrix.
    fn as_expr(&self) -> MatExpr<'_, T>;
    /// Compressed row-major form, borrowed when the matrix is already stored so.
    fn row_major(&self) -> Cow<'_, SparseMatrix<T>>;
}
