//! Matrix module: dense and sparse storage primitives.

pub mod dense;
pub use dense::{DenseMatrix, DenseVector};
pub mod sparse;
pub use sparse::{SparseMatrix, SparseVector};

use crate::core::classify::{Scalar, Shape, Storage};

/// A materialized matrix of resolved storage.
#[derive(Debug, Clone, PartialEq)]
pub enum Matrix<T> {
    Dense(DenseMatrix<T>),
    Sparse(SparseMatrix<T>),
}

impl<T: Scalar> Matrix<T> {
    pub fn storage(&self) -> Storage {
        match self {
            Matrix::Dense(_) => Storage::Dense,
            Matrix::Sparse(_) => Storage::Sparse,
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            Matrix::Dense(m) => m.shape(),
            Matrix::Sparse(m) => m.shape(),
        }
    }

    /// Element `(i, j)`, zero for structural zeros.
    pub fn get(&self, i: usize, j: usize) -> T {
        match self {
            Matrix::Dense(m) => m[(i, j)],
            Matrix::Sparse(m) => m.get(i, j),
        }
    }

    pub fn to_dense(&self) -> DenseMatrix<T> {
        match self {
            Matrix::Dense(m) => m.clone(),
            Matrix::Sparse(m) => m.to_dense(),
        }
    }

    pub fn into_dense(self) -> Option<DenseMatrix<T>> {
        match self {
            Matrix::Dense(m) => Some(m),
            Matrix::Sparse(_) => None,
        }
    }

    pub fn into_sparse(self) -> Option<SparseMatrix<T>> {
        match self {
            Matrix::Sparse(m) => Some(m),
            Matrix::Dense(_) => None,
        }
    }
}

/// A materialized vector of resolved storage.
#[derive(Debug, Clone, PartialEq)]
pub enum Vector<T> {
    Dense(DenseVector<T>),
    Sparse(SparseVector<T>),
}

impl<T: Scalar> Vector<T> {
    pub fn storage(&self) -> Storage {
        match self {
            Vector::Dense(_) => Storage::Dense,
            Vector::Sparse(_) => Storage::Sparse,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Vector::Dense(v) => v.len(),
            Vector::Sparse(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> T {
        match self {
            Vector::Dense(v) => v[i],
            Vector::Sparse(v) => v.get(i),
        }
    }

    pub fn to_dense(&self) -> DenseVector<T> {
        match self {
            Vector::Dense(v) => v.clone(),
            Vector::Sparse(v) => v.to_dense(),
        }
    }

    pub fn into_dense(self) -> Option<DenseVector<T>> {
        match self {
            Vector::Dense(v) => Some(v),
            Vector::Sparse(_) => None,
        }
    }

    pub fn into_sparse(self) -> Option<SparseVector<T>> {
        match self {
            Vector::Sparse(v) => Some(v),
            Vector::Dense(_) => None,
        }
    }
}
