// Read-only views over leaves and temporaries, and mutable destination blocks.
//
// Every operand is seen as a matrix: a column vector of length n is n x 1, a row
// vector 1 x n. Transposing a view swaps its shape and strides (dense) or flips
// its layout (sparse) without touching the data.

use crate::core::classify::{Layout, Scalar, Shape};
use crate::expr::node::Leaf;
use crate::matrix::{DenseMatrix, DenseVector, SparseMatrix, SparseVector};

#[derive(Debug, Clone, Copy)]
pub(crate) struct DenseView<'v, T> {
    data: &'v [T],
    rows: usize,
    cols: usize,
    rs: usize,
    cs: usize,
}

impl<'v, T: Scalar> DenseView<'v, T> {
    pub(crate) fn of_matrix(m: &'v DenseMatrix<T>) -> Self {
        let (rs, cs) = m.strides();
        Self {
            data: m.as_slice(),
            rows: m.rows(),
            cols: m.cols(),
            rs,
            cs,
        }
    }

    pub(crate) fn of_vector(v: &'v DenseVector<T>) -> Self {
        let shape = v.shape();
        let (rs, cs) = match v.layout() {
            Layout::ColumnMajor => (1, 0),
            Layout::RowMajor => (0, 1),
        };
        Self {
            data: v.as_slice(),
            rows: shape.rows,
            cols: shape.cols,
            rs,
            cs,
        }
    }

    #[inline]
    pub(crate) fn get(&self, i: usize, j: usize) -> T {
        self.data[i * self.rs + j * self.cs]
    }

    pub(crate) fn rows(&self) -> usize {
        self.rows
    }

    pub(crate) fn cols(&self) -> usize {
        self.cols
    }

    fn transpose(self) -> Self {
        Self {
            rows: self.cols,
            cols: self.rows,
            rs: self.cs,
            cs: self.rs,
            ..self
        }
    }
}

/// Pointer array of a compressed view; sparse vectors are a single line.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Ptr<'v> {
    Lines(&'v [usize]),
    Single,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SparseView<'v, T> {
    rows: usize,
    cols: usize,
    layout: Layout,
    ptr: Ptr<'v>,
    idx: &'v [usize],
    vals: &'v [T],
}

impl<'v, T: Scalar> SparseView<'v, T> {
    pub(crate) fn of_matrix(m: &'v SparseMatrix<T>) -> Self {
        let (ptr, idx, vals) = m.raw_parts();
        Self {
            rows: m.rows(),
            cols: m.cols(),
            layout: m.layout(),
            ptr: Ptr::Lines(ptr),
            idx,
            vals,
        }
    }

    pub(crate) fn of_vector(v: &'v SparseVector<T>) -> Self {
        let shape = v.shape();
        Self {
            rows: shape.rows,
            cols: shape.cols,
            layout: v.layout(),
            ptr: Ptr::Single,
            idx: v.indices(),
            vals: v.values(),
        }
    }

    pub(crate) fn rows(&self) -> usize {
        self.rows
    }

    pub(crate) fn cols(&self) -> usize {
        self.cols
    }

    pub(crate) fn layout(&self) -> Layout {
        self.layout
    }

    pub(crate) fn major_len(&self) -> usize {
        match self.layout {
            Layout::RowMajor => self.rows,
            Layout::ColumnMajor => self.cols,
        }
    }

    pub(crate) fn minor_len(&self) -> usize {
        match self.layout {
            Layout::RowMajor => self.cols,
            Layout::ColumnMajor => self.rows,
        }
    }

    /// Minor indices and values of major line `k`.
    #[inline]
    pub(crate) fn line(&self, k: usize) -> (&'v [usize], &'v [T]) {
        let r = match self.ptr {
            Ptr::Lines(p) => p[k]..p[k + 1],
            Ptr::Single => 0..self.idx.len(),
        };
        (&self.idx[r.clone()], &self.vals[r])
    }

    /// Owned pointer array, materializing the single-line form.
    pub(crate) fn ptr_vec(&self) -> Vec<usize> {
        match self.ptr {
            Ptr::Lines(p) => p.to_vec(),
            Ptr::Single => vec![0, self.idx.len()],
        }
    }

    pub(crate) fn arrays(&self) -> (&'v [usize], &'v [T]) {
        (self.idx, self.vals)
    }

    /// Entries of a vector-shaped view as `(position, value)`, ascending.
    pub(crate) fn vector_entries(&self) -> Vec<(usize, T)> {
        let mut out = Vec::with_capacity(self.idx.len());
        for k in 0..self.major_len() {
            let (idx, vals) = self.line(k);
            for (&q, &v) in idx.iter().zip(vals) {
                // one of (k, q) is always zero for a vector
                out.push((k + q, v));
            }
        }
        out
    }

    fn transpose(self) -> Self {
        Self {
            rows: self.cols,
            cols: self.rows,
            layout: self.layout.flipped(),
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum View<'v, T> {
    Dense(DenseView<'v, T>),
    Sparse(SparseView<'v, T>),
}

impl<'v, T: Scalar> View<'v, T> {
    pub(crate) fn shape(&self) -> Shape {
        match self {
            View::Dense(d) => Shape::new(d.rows, d.cols),
            View::Sparse(s) => Shape::new(s.rows, s.cols),
        }
    }

    pub(crate) fn transpose(self) -> Self {
        match self {
            View::Dense(d) => View::Dense(d.transpose()),
            View::Sparse(s) => View::Sparse(s.transpose()),
        }
    }

    pub(crate) fn of_dense_matrix(m: &'v DenseMatrix<T>) -> Self {
        View::Dense(DenseView::of_matrix(m))
    }

    pub(crate) fn of_sparse_matrix(m: &'v SparseMatrix<T>) -> Self {
        View::Sparse(SparseView::of_matrix(m))
    }

    pub(crate) fn of_dense_vector(v: &'v DenseVector<T>) -> Self {
        View::Dense(DenseView::of_vector(v))
    }

    pub(crate) fn of_sparse_vector(v: &'v SparseVector<T>) -> Self {
        View::Sparse(SparseView::of_vector(v))
    }

    /// Element at position `p` of a vector-shaped view.
    pub(crate) fn vector_get(&self, p: usize) -> T {
        match self {
            View::Dense(d) if d.rows == 1 => d.get(0, p),
            View::Dense(d) => d.get(p, 0),
            View::Sparse(s) => {
                let (k, q) = if s.rows == 1 { (0, p) } else { (p, 0) };
                let (major, minor) = match s.layout {
                    Layout::RowMajor => (k, q),
                    Layout::ColumnMajor => (q, k),
                };
                let (idx, vals) = s.line(major);
                idx.binary_search(&minor).map(|i| vals[i]).unwrap_or_else(|_| T::zero())
            }
        }
    }
}

impl<'a, T: Scalar> Leaf<'a, T> {
    /// View over a borrowed container; `None` for alias handles.
    pub(crate) fn view(&self) -> Option<View<'a, T>> {
        match *self {
            Leaf::DenseMatrix(m) => Some(View::of_dense_matrix(m)),
            Leaf::SparseMatrix(m) => Some(View::of_sparse_matrix(m)),
            Leaf::DenseVector(v) => Some(View::of_dense_vector(v)),
            Leaf::SparseVector(v) => Some(View::of_sparse_vector(v)),
            Leaf::Alias(_) => None,
        }
    }
}

/// Mutable window over the rows `row0..row0 + rows` and columns
/// `col0..col0 + cols` of a dense destination. `data` starts at the first
/// element of the window's first major line.
#[derive(Debug)]
pub(crate) struct BlockMut<'d, T> {
    data: &'d mut [T],
    row0: usize,
    rows: usize,
    col0: usize,
    cols: usize,
    rs: usize,
    cs: usize,
}

impl<'d, T: Scalar> BlockMut<'d, T> {
    pub(crate) fn of_matrix(m: &'d mut DenseMatrix<T>) -> Self {
        let (rs, cs) = m.strides();
        let (rows, cols) = (m.rows(), m.cols());
        Self {
            data: m.as_mut_slice(),
            row0: 0,
            rows,
            col0: 0,
            cols,
            rs,
            cs,
        }
    }

    pub(crate) fn of_vector(v: &'d mut DenseVector<T>) -> Self {
        let shape = v.shape();
        let (rs, cs) = match v.layout() {
            Layout::ColumnMajor => (1, 0),
            Layout::RowMajor => (0, 1),
        };
        Self {
            data: v.as_mut_slice(),
            row0: 0,
            rows: shape.rows,
            col0: 0,
            cols: shape.cols,
            rs,
            cs,
        }
    }

    pub(crate) fn rows(&self) -> std::ops::Range<usize> {
        self.row0..self.row0 + self.rows
    }

    pub(crate) fn cols(&self) -> std::ops::Range<usize> {
        self.col0..self.col0 + self.cols
    }

    pub(crate) fn len(&self) -> usize {
        self.rows * self.cols
    }

    #[inline]
    pub(crate) fn at(&mut self, i: usize, j: usize) -> &mut T {
        &mut self.data[(i - self.row0) * self.rs + (j - self.col0) * self.cs]
    }

    pub(crate) fn for_each_mut<F: FnMut(&mut T)>(&mut self, mut f: F) {
        for i in self.rows() {
            for j in self.cols() {
                f(self.at(i, j));
            }
        }
    }

    /// Splits into at most `parts` disjoint blocks along whichever axis keeps
    /// every block inside one contiguous run of the buffer.
    pub(crate) fn split(self, parts: usize) -> Vec<BlockMut<'d, T>> {
        let rows_contiguous = self.cols <= 1 || (self.cols - 1) * self.cs < self.rs;
        let cols_contiguous = self.rows <= 1 || (self.rows - 1) * self.rs < self.cs;
        if parts <= 1 {
            return vec![self];
        }
        if rows_contiguous && self.rows >= 2 {
            let per = self.rows.div_ceil(parts);
            let mut rest = self.data;
            let mut out = Vec::with_capacity(parts);
            let mut r = self.row0;
            let end = self.row0 + self.rows;
            while r < end {
                let n = per.min(end - r);
                let len = (n * self.rs).min(rest.len());
                let (head, tail) = std::mem::take(&mut rest).split_at_mut(len);
                rest = tail;
                out.push(BlockMut {
                    data: head,
                    row0: r,
                    rows: n,
                    col0: self.col0,
                    cols: self.cols,
                    rs: self.rs,
                    cs: self.cs,
                });
                r += n;
            }
            out
        } else if cols_contiguous && self.cols >= 2 {
            let per = self.cols.div_ceil(parts);
            let mut rest = self.data;
            let mut out = Vec::with_capacity(parts);
            let mut c = self.col0;
            let end = self.col0 + self.cols;
            while c < end {
                let n = per.min(end - c);
                let len = (n * self.cs).min(rest.len());
                let (head, tail) = std::mem::take(&mut rest).split_at_mut(len);
                rest = tail;
                out.push(BlockMut {
                    data: head,
                    row0: self.row0,
                    rows: self.rows,
                    col0: c,
                    cols: n,
                    rs: self.rs,
                    cs: self.cs,
                });
                c += n;
            }
            out
        } else {
            vec![self]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transposed_dense_view_reads_swapped() {
        let m = DenseMatrix::from_fn(2, 3, Layout::RowMajor, |i, j| (10 * i + j) as f64);
        let v = View::of_dense_matrix(&m).transpose();
        assert_eq!(v.shape(), Shape::new(3, 2));
        match v {
            View::Dense(d) => assert_eq!(d.get(2, 1), 12.0),
            View::Sparse(_) => panic!("expected a dense view"),
        }
    }

    #[test]
    fn split_row_major_padded() {
        let mut m = DenseMatrix::<f64>::padded(5, 3, Layout::RowMajor, 4);
        let blocks = BlockMut::of_matrix(&mut m).split(2);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].rows(), 0..3);
        assert_eq!(blocks[1].rows(), 3..5);
        for mut b in blocks {
            let r0 = b.rows().start;
            for i in b.rows() {
                for j in b.cols() {
                    *b.at(i, j) = (i * 3 + j) as f64 + 0.0 * r0 as f64;
                }
            }
        }
        assert_eq!(m[(4, 2)], 14.0);
        assert_eq!(m[(3, 0)], 9.0);
    }

    #[test]
    fn split_column_major_by_columns() {
        let mut m = DenseMatrix::<f64>::zeros_with_layout(2, 4, Layout::ColumnMajor);
        let blocks = BlockMut::of_matrix(&mut m).split(4);
        assert_eq!(blocks.len(), 4);
        for mut b in blocks {
            let j = b.cols().start;
            *b.at(1, j) = j as f64;
        }
        assert_eq!(m[(1, 3)], 3.0);
    }

    #[test]
    fn split_column_vector_by_rows() {
        let mut v = DenseVector::<f64>::zeros(7);
        let blocks = BlockMut::of_vector(&mut v).split(3);
        assert_eq!(blocks.len(), 3);
        for mut b in blocks {
            for i in b.rows() {
                *b.at(i, 0) = i as f64;
            }
        }
        assert_eq!(v.as_slice(), &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn sparse_vector_view_lookup() {
        let v = SparseVector::from_entries(5, &[(1, 2.0), (4, 3.0)]).unwrap();
        let view = View::of_sparse_vector(&v);
        assert_eq!(view.vector_get(4), 3.0);
        assert_eq!(view.vector_get(2), 0.0);
        assert_eq!(view.transpose().vector_get(1), 2.0);
    }
}
