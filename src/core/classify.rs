//! Capability classification of operands.
//!
//! Every operand of an expression is classified along four axes:
//!
//! - *class*: vector or matrix, carried at the type level by the [`MatrixClass`] and
//!   [`VectorClass`] markers so that, for example, adding a vector to a matrix does not
//!   compile;
//! - *storage*: dense or sparse;
//! - *layout*: row-major or column-major for matrices, row or column orientation for vectors;
//! - *origin*: a concrete container or an unevaluated expression.
//!
//! Containers know their storage at compile time ([`Classify::STORAGE`]); an expression
//! node only knows it once the result-type resolver has run, which happens when the
//! node is built.

use num_complex::Complex;
use num_traits::NumAssign;
use std::fmt;
use std::ops::Neg;

/// Vector or matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Class {
    Vector,
    Matrix,
}

/// Dense or sparse element storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Storage {
    Dense,
    Sparse,
}

/// Storage order. For vectors `RowMajor` marks a row (transposed) vector and
/// `ColumnMajor` a column vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Layout {
    #[default]
    RowMajor,
    ColumnMajor,
}

impl Layout {
    /// Orientation of a row vector.
    pub const ROW_VECTOR: Layout = Layout::RowMajor;
    /// Orientation of a column vector.
    pub const COLUMN_VECTOR: Layout = Layout::ColumnMajor;

    pub fn flipped(self) -> Layout {
        match self {
            Layout::RowMajor => Layout::ColumnMajor,
            Layout::ColumnMajor => Layout::RowMajor,
        }
    }
}

/// Resolved kind of an operand or expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Kind {
    pub class: Class,
    pub storage: Storage,
    pub layout: Layout,
}

impl Kind {
    pub const fn new(class: Class, storage: Storage, layout: Layout) -> Self {
        Self { class, storage, layout }
    }

    pub fn is_dense(&self) -> bool {
        self.storage == Storage::Dense
    }

    pub fn is_sparse(&self) -> bool {
        self.storage == Storage::Sparse
    }

    pub fn is_vector(&self) -> bool {
        self.class == Class::Vector
    }

    pub fn transposed(self) -> Kind {
        Kind { layout: self.layout.flipped(), ..self }
    }
}

/// Logical shape. A column vector of length `n` is `n x 1`, a row vector `1 x n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape {
    pub rows: usize,
    pub cols: usize,
}

impl Shape {
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    pub fn vector(len: usize, layout: Layout) -> Self {
        match layout {
            Layout::RowMajor => Shape::new(1, len),
            Layout::ColumnMajor => Shape::new(len, 1),
        }
    }

    pub fn transposed(self) -> Shape {
        Shape::new(self.cols, self.rows)
    }

    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// Scalar element kinds, totally ordered by promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScalarKind {
    F32,
    F64,
    C32,
    C64,
}

impl ScalarKind {
    /// Kind produced by mixing `self` and `other`.
    ///
    /// Mixing single-precision complex with double-precision real widens to
    /// double-precision complex.
    pub fn promote(self, other: ScalarKind) -> ScalarKind {
        match (self, other) {
            (ScalarKind::C32, ScalarKind::F64) | (ScalarKind::F64, ScalarKind::C32) => ScalarKind::C64,
            (a, b) => a.max(b),
        }
    }

    pub fn is_complex(self) -> bool {
        matches!(self, ScalarKind::C32 | ScalarKind::C64)
    }
}

/// Element type of every container and expression.
pub trait Scalar:
    Copy + fmt::Debug + PartialEq + Send + Sync + 'static + NumAssign + Neg<Output = Self>
{
    const KIND: ScalarKind;
}

impl Scalar for f32 {
    const KIND: ScalarKind = ScalarKind::F32;
}

impl Scalar for f64 {
    const KIND: ScalarKind = ScalarKind::F64;
}

impl Scalar for Complex<f32> {
    const KIND: ScalarKind = ScalarKind::C32;
}

impl Scalar for Complex<f64> {
    const KIND: ScalarKind = ScalarKind::C64;
}

/// Type-level class marker.
pub trait ExprClass: 'static {
    const CLASS: Class;
}

/// Marker for matrix operands.
#[derive(Debug, Clone, Copy)]
pub enum MatrixClass {}

/// Marker for vector operands.
#[derive(Debug, Clone, Copy)]
pub enum VectorClass {}

impl ExprClass for MatrixClass {
    const CLASS: Class = Class::Matrix;
}

impl ExprClass for VectorClass {
    const CLASS: Class = Class::Vector;
}

/// Class of `Self x Rhs`. Pairs without an impl cannot be multiplied.
pub trait ProductClass<Rhs: ExprClass>: ExprClass {
    type Output: ExprClass;
}

impl ProductClass<MatrixClass> for MatrixClass {
    type Output = MatrixClass;
}

impl ProductClass<VectorClass> for MatrixClass {
    type Output = VectorClass;
}

impl ProductClass<MatrixClass> for VectorClass {
    type Output = VectorClass;
}

/// Vector times vector is an outer product (column x row) or a 1x1 inner
/// product (row x column).
impl ProductClass<VectorClass> for VectorClass {
    type Output = MatrixClass;
}

/// Classification of a concrete container or an expression.
pub trait Classify {
    type Class: ExprClass;
    type Elem: Scalar;
    /// `Some` for containers, `None` for expressions whose storage is resolved per node.
    const STORAGE: Option<Storage>;
    const IS_EXPRESSION: bool;

    fn kind(&self) -> Kind;
    fn shape(&self) -> Shape;

    fn scalar_kind(&self) -> ScalarKind {
        Self::Elem::KIND
    }

    fn is_row_major(&self) -> bool {
        self.kind().layout == Layout::RowMajor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotion_is_a_total_order() {
        assert_eq!(ScalarKind::F32.promote(ScalarKind::F64), ScalarKind::F64);
        assert_eq!(ScalarKind::F64.promote(ScalarKind::F32), ScalarKind::F64);
        assert_eq!(ScalarKind::C32.promote(ScalarKind::F32), ScalarKind::C32);
        assert_eq!(ScalarKind::C32.promote(ScalarKind::F64), ScalarKind::C64);
        assert_eq!(ScalarKind::C64.promote(ScalarKind::F32), ScalarKind::C64);
        assert!(ScalarKind::C64.is_complex());
    }

    #[test]
    fn vector_shapes_follow_orientation() {
        assert_eq!(Shape::vector(4, Layout::COLUMN_VECTOR), Shape::new(4, 1));
        assert_eq!(Shape::vector(4, Layout::ROW_VECTOR), Shape::new(1, 4));
        assert_eq!(Shape::new(2, 3).transposed(), Shape::new(3, 2));
    }
}
