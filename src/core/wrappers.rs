//! Trait implementations for the crate's containers and conversions to and
//! from `faer` types.
//!
//! Inner products use rayon parallel iterators when the `rayon` feature is
//! enabled. The faer conversions let callers hand results to faer's dense and
//! sparse routines, and give tests an independent reference.

use std::borrow::Cow;

use faer::Mat;
use faer::sparse::{SparseRowMat, SymbolicSparseRowMat};
use faer::traits::ComplexField;
use num_traits::Float;

use crate::core::classify::{Layout, Scalar};
use crate::core::traits::{Indexing, InnerProduct, SystemMatrix};
use crate::expr::MatExpr;
use crate::matrix::{DenseMatrix, DenseVector, SparseMatrix};

/// Inner product and norm of dense vectors, with optional Rayon parallelism.
impl<T: Scalar + Float> InnerProduct<DenseVector<T>> for () {
    type Scalar = T;

    fn dot(&self, x: &DenseVector<T>, y: &DenseVector<T>) -> T {
        assert_eq!(x.len(), y.len(), "Vectors must have the same length");
        #[cfg(feature = "rayon")]
        {
            use rayon::prelude::*;
            x.as_slice()
                .par_iter()
                .zip(y.as_slice().par_iter())
                .map(|(xi, yi)| *xi * *yi)
                .reduce(|| T::zero(), |acc, v| acc + v)
        }
        #[cfg(not(feature = "rayon"))]
        {
            x.iter().zip(y.iter()).fold(T::zero(), |acc, (xi, yi)| acc + *xi * *yi)
        }
    }

    fn norm(&self, x: &DenseVector<T>) -> T {
        self.dot(x, x).sqrt()
    }
}

impl<T: Scalar> Indexing for DenseVector<T> {
    fn nrows(&self) -> usize {
        self.shape().rows
    }
}

impl<T: Scalar> Indexing for DenseMatrix<T> {
    fn nrows(&self) -> usize {
        self.rows()
    }
}

impl<T: Scalar> Indexing for SparseMatrix<T> {
    fn nrows(&self) -> usize {
        self.rows()
    }
}

impl<T: Scalar> SystemMatrix<T> for DenseMatrix<T> {
    fn ncols(&self) -> usize {
        self.cols()
    }

    fn as_expr(&self) -> MatExpr<'_, T> {
        self.expr()
    }

    fn row_major(&self) -> Cow<'_, SparseMatrix<T>> {
        Cow::Owned(SparseMatrix::from_dense(self, Layout::RowMajor))
    }
}

impl<T: Scalar> SystemMatrix<T> for SparseMatrix<T> {
    fn ncols(&self) -> usize {
        self.cols()
    }

    fn as_expr(&self) -> MatExpr<'_, T> {
        self.expr()
    }

    fn row_major(&self) -> Cow<'_, SparseMatrix<T>> {
        match self.layout() {
            Layout::RowMajor => Cow::Borrowed(self),
            Layout::ColumnMajor => Cow::Owned(self.to_layout(Layout::RowMajor)),
        }
    }
}

impl<T: Scalar + ComplexField> DenseMatrix<T> {
    /// Copy into a `faer::Mat`.
    pub fn to_faer(&self) -> Mat<T> {
        Mat::from_fn(self.rows(), self.cols(), |i, j| self[(i, j)])
    }

    /// Copy of a `faer::Mat` in the requested layout.
    pub fn from_faer(m: &Mat<T>, layout: Layout) -> Self {
        Self::from_fn(m.nrows(), m.ncols(), layout, |i, j| m[(i, j)])
    }
}

impl<T: Scalar + ComplexField> DenseVector<T> {
    /// Copy into a single-column `faer::Mat`.
    pub fn to_faer(&self) -> Mat<T> {
        Mat::from_fn(self.len(), 1, |i, _| self[i])
    }
}

impl<T: Scalar + ComplexField> SparseMatrix<T> {
    /// Copy into a faer CSR matrix.
    pub fn to_faer_csr(&self) -> SparseRowMat<usize, T> {
        let csr = self.row_major();
        let (ptr, idx, vals) = csr.raw_parts();
        let symbolic = SymbolicSparseRowMat::new_checked(self.rows(), self.cols(), ptr.to_vec(), None, idx.to_vec());
        SparseRowMat::new(symbolic, vals.to_vec())
    }
}
