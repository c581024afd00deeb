//! Dense vector and matrix containers.
//!
//! A [`DenseMatrix`] owns one contiguous buffer. Each major line (a row for
//! row-major storage, a column for column-major storage) starts at a multiple of the
//! leading dimension, which may be padded past the logical minor extent for
//! alignment. Padding elements are kept at zero and are never part of the
//! logical matrix.

use std::ops::{Index, IndexMut};

use crate::core::classify::{Class, Classify, Kind, Layout, MatrixClass, Scalar, Shape, Storage, VectorClass};
use crate::error::LaError;

/// Dense matrix with row- or column-major storage.
#[derive(Debug, Clone)]
pub struct DenseMatrix<T> {
    rows: usize,
    cols: usize,
    ld: usize,
    align: usize,
    layout: Layout,
    data: Vec<T>,
}

impl<T: Scalar> DenseMatrix<T> {
    /// Row-major matrix of zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::zeros_with_layout(rows, cols, Layout::RowMajor)
    }

    pub fn zeros_with_layout(rows: usize, cols: usize, layout: Layout) -> Self {
        Self::padded(rows, cols, layout, 1)
    }

    /// Matrix of zeros whose leading dimension is rounded up to a multiple of `align`.
    pub fn padded(rows: usize, cols: usize, layout: Layout, align: usize) -> Self {
        let align = align.max(1);
        let (major, minor) = match layout {
            Layout::RowMajor => (rows, cols),
            Layout::ColumnMajor => (cols, rows),
        };
        let ld = minor.div_ceil(align) * align;
        Self {
            rows,
            cols,
            ld,
            align,
            layout,
            data: vec![T::zero(); major * ld],
        }
    }

    pub fn from_fn<F>(rows: usize, cols: usize, layout: Layout, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> T,
    {
        let mut m = Self::zeros_with_layout(rows, cols, layout);
        for i in 0..rows {
            for j in 0..cols {
                let k = m.offset(i, j);
                m.data[k] = f(i, j);
            }
        }
        m
    }

    /// Row-major matrix from a list of equally long rows.
    pub fn from_rows(rows: &[Vec<T>]) -> Result<Self, LaError> {
        let ncols = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().position(|r| r.len() != ncols) {
            return Err(LaError::InvalidStructure(format!(
                "row {} has {} entries, expected {}",
                bad,
                rows[bad].len(),
                ncols
            )));
        }
        Ok(Self::from_fn(rows.len(), ncols, Layout::RowMajor, |i, j| rows[i][j]))
    }

    pub fn identity(n: usize) -> Self {
        Self::from_fn(n, n, Layout::RowMajor, |i, j| if i == j { T::one() } else { T::zero() })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> Shape {
        Shape::new(self.rows, self.cols)
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Distance between the starts of two consecutive major lines.
    pub fn leading_dim(&self) -> usize {
        self.ld
    }

    /// Multiple the leading dimension is rounded up to.
    pub fn alignment(&self) -> usize {
        self.align
    }

    /// Buffer position of element `(i, j)`; no bounds check.
    #[inline]
    pub fn offset(&self, i: usize, j: usize) -> usize {
        match self.layout {
            Layout::RowMajor => i * self.ld + j,
            Layout::ColumnMajor => j * self.ld + i,
        }
    }

    /// `(row stride, column stride)` of the buffer.
    pub fn strides(&self) -> (usize, usize) {
        match self.layout {
            Layout::RowMajor => (self.ld, 1),
            Layout::ColumnMajor => (1, self.ld),
        }
    }

    pub fn get(&self, i: usize, j: usize) -> Option<&T> {
        if i < self.rows && j < self.cols {
            self.data.get(self.offset(i, j))
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, i: usize, j: usize) -> Option<&mut T> {
        if i < self.rows && j < self.cols {
            let k = self.offset(i, j);
            self.data.get_mut(k)
        } else {
            None
        }
    }

    /// # Safety
    /// `i < rows` and `j < cols`.
    #[inline]
    pub unsafe fn get_unchecked(&self, i: usize, j: usize) -> &T {
        let k = self.offset(i, j);
        unsafe { self.data.get_unchecked(k) }
    }

    /// # Safety
    /// `i < rows` and `j < cols`.
    #[inline]
    pub unsafe fn get_unchecked_mut(&mut self, i: usize, j: usize) -> &mut T {
        let k = self.offset(i, j);
        unsafe { self.data.get_unchecked_mut(k) }
    }

    /// Raw buffer including padding.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn as_ptr(&self) -> *const T {
        self.data.as_ptr()
    }

    /// Sets every logical element to `value`; padding stays zero.
    pub fn fill(&mut self, value: T) {
        for i in 0..self.rows {
            for j in 0..self.cols {
                let k = self.offset(i, j);
                self.data[k] = value;
            }
        }
    }

    /// Changes the shape, keeping the layout and the leading-dimension alignment.
    /// Contents are reset to zero.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        *self = Self::padded(rows, cols, self.layout, self.align);
    }

    /// Physically transposed copy with the same layout.
    pub fn transpose(&self) -> Self {
        Self::from_fn(self.cols, self.rows, self.layout, |i, j| self[(j, i)])
    }

    /// Copy of the same logical matrix stored in `layout`.
    pub fn to_layout(&self, layout: Layout) -> Self {
        if layout == self.layout {
            return self.clone();
        }
        Self::from_fn(self.rows, self.cols, layout, |i, j| self[(i, j)])
    }

    /// Iterates `(i, j, value)` over the logical elements in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        let (major, minor) = match self.layout {
            Layout::RowMajor => (self.rows, self.cols),
            Layout::ColumnMajor => (self.cols, self.rows),
        };
        (0..major).flat_map(move |p| {
            (0..minor).map(move |q| {
                let (i, j) = match self.layout {
                    Layout::RowMajor => (p, q),
                    Layout::ColumnMajor => (q, p),
                };
                (i, j, self.data[p * self.ld + q])
            })
        })
    }
}

/// Equal shape, layout and logical elements; padding is ignored.
impl<T: PartialEq> PartialEq for DenseMatrix<T> {
    fn eq(&self, other: &Self) -> bool {
        if (self.rows, self.cols, self.layout) != (other.rows, other.cols, other.layout) {
            return false;
        }
        let (major, minor) = match self.layout {
            Layout::RowMajor => (self.rows, self.cols),
            Layout::ColumnMajor => (self.cols, self.rows),
        };
        (0..major).all(|p| {
            self.data[p * self.ld..p * self.ld + minor] == other.data[p * other.ld..p * other.ld + minor]
        })
    }
}

impl<T: Scalar> Index<(usize, usize)> for DenseMatrix<T> {
    type Output = T;

    fn index(&self, (i, j): (usize, usize)) -> &T {
        assert!(
            i < self.rows && j < self.cols,
            "index ({}, {}) out of bounds for {}x{}",
            i,
            j,
            self.rows,
            self.cols
        );
        &self.data[self.offset(i, j)]
    }
}

impl<T: Scalar> IndexMut<(usize, usize)> for DenseMatrix<T> {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut T {
        assert!(
            i < self.rows && j < self.cols,
            "index ({}, {}) out of bounds for {}x{}",
            i,
            j,
            self.rows,
            self.cols
        );
        let k = self.offset(i, j);
        &mut self.data[k]
    }
}

/// Dense row or column vector.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseVector<T> {
    data: Vec<T>,
    layout: Layout,
}

impl<T: Scalar> DenseVector<T> {
    /// Column vector of zeros.
    pub fn zeros(len: usize) -> Self {
        Self::from_vec(vec![T::zero(); len])
    }

    /// Column vector owning `data`.
    pub fn from_vec(data: Vec<T>) -> Self {
        Self {
            data,
            layout: Layout::COLUMN_VECTOR,
        }
    }

    /// Row vector owning `data`.
    pub fn row(data: Vec<T>) -> Self {
        Self {
            data,
            layout: Layout::ROW_VECTOR,
        }
    }

    pub fn from_fn<F: FnMut(usize) -> T>(len: usize, f: F) -> Self {
        Self::from_vec((0..len).map(f).collect())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn shape(&self) -> Shape {
        Shape::vector(self.data.len(), self.layout)
    }

    /// Same data with flipped orientation.
    pub fn transposed(mut self) -> Self {
        self.layout = self.layout.flipped();
        self
    }

    pub fn get(&self, i: usize) -> Option<&T> {
        self.data.get(i)
    }

    pub fn get_mut(&mut self, i: usize) -> Option<&mut T> {
        self.data.get_mut(i)
    }

    /// # Safety
    /// `i < len`.
    #[inline]
    pub unsafe fn get_unchecked(&self, i: usize) -> &T {
        unsafe { self.data.get_unchecked(i) }
    }

    /// # Safety
    /// `i < len`.
    #[inline]
    pub unsafe fn get_unchecked_mut(&mut self, i: usize) -> &mut T {
        unsafe { self.data.get_unchecked_mut(i) }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn as_ptr(&self) -> *const T {
        self.data.as_ptr()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// Changes the length; contents are reset to zero.
    pub fn resize(&mut self, len: usize) {
        self.data.clear();
        self.data.resize(len, T::zero());
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

impl<T: Scalar> From<Vec<T>> for DenseVector<T> {
    fn from(data: Vec<T>) -> Self {
        Self::from_vec(data)
    }
}

impl<T> AsRef<[T]> for DenseVector<T> {
    fn as_ref(&self) -> &[T] {
        &self.data
    }
}

impl<T> AsMut<[T]> for DenseVector<T> {
    fn as_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T> Index<usize> for DenseVector<T> {
    type Output = T;

    fn index(&self, i: usize) -> &T {
        &self.data[i]
    }
}

impl<T> IndexMut<usize> for DenseVector<T> {
    fn index_mut(&mut self, i: usize) -> &mut T {
        &mut self.data[i]
    }
}

impl<T: Scalar> Classify for DenseMatrix<T> {
    type Class = MatrixClass;
    type Elem = T;
    const STORAGE: Option<Storage> = Some(Storage::Dense);
    const IS_EXPRESSION: bool = false;

    fn kind(&self) -> Kind {
        Kind::new(Class::Matrix, Storage::Dense, self.layout)
    }

    fn shape(&self) -> Shape {
        DenseMatrix::shape(self)
    }
}

impl<T: Scalar> Classify for DenseVector<T> {
    type Class = VectorClass;
    type Elem = T;
    const STORAGE: Option<Storage> = Some(Storage::Dense);
    const IS_EXPRESSION: bool = false;

    fn kind(&self) -> Kind {
        Kind::new(Class::Vector, Storage::Dense, self.layout)
    }

    fn shape(&self) -> Shape {
        DenseVector::shape(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padded_leading_dimension() {
        let m = DenseMatrix::<f64>::padded(3, 5, Layout::RowMajor, 4);
        assert_eq!(m.leading_dim(), 8);
        assert_eq!(m.as_slice().len(), 24);
        let c = DenseMatrix::<f64>::padded(3, 5, Layout::ColumnMajor, 4);
        assert_eq!(c.leading_dim(), 4);
        assert_eq!(c.as_slice().len(), 20);
    }

    #[test]
    fn resize_keeps_padding() {
        let mut m = DenseMatrix::<f64>::padded(3, 5, Layout::RowMajor, 4);
        m[(2, 4)] = 1.0;
        m.resize(2, 6);
        assert_eq!((m.rows(), m.cols()), (2, 6));
        assert_eq!(m.alignment(), 4);
        assert_eq!(m.leading_dim(), 8);
        assert!(m.as_slice().iter().all(|&v| v == 0.0));
        assert_eq!(m, DenseMatrix::zeros(2, 6));
    }

    #[test]
    fn layouts_agree_on_logical_elements() {
        let a = DenseMatrix::from_fn(2, 3, Layout::RowMajor, |i, j| (i * 3 + j) as f64);
        let b = a.to_layout(Layout::ColumnMajor);
        for i in 0..2 {
            for j in 0..3 {
                assert_eq!(a[(i, j)], b[(i, j)]);
            }
        }
        assert_eq!(b.as_slice(), &[0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
    }

    #[test]
    fn checked_access() {
        let mut m = DenseMatrix::<f64>::zeros(2, 2);
        assert!(m.get(2, 0).is_none());
        *m.get_mut(1, 0).unwrap() = 7.0;
        assert_eq!(m[(1, 0)], 7.0);
        assert_eq!(unsafe { *m.get_unchecked(1, 0) }, 7.0);
    }

    #[test]
    fn fill_leaves_padding_alone() {
        let mut m = DenseMatrix::<f64>::padded(2, 3, Layout::RowMajor, 4);
        m.fill(1.0);
        assert_eq!(m.as_slice(), &[1.0, 1.0, 1.0, 0.0, 1.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        assert!(DenseMatrix::from_rows(&[vec![1.0, 2.0], vec![3.0]]).is_err());
    }
}
