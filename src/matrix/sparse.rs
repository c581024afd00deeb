// Compressed sparse containers (CSR/CSC matrices, sparse vectors)

use crate::core::classify::{Class, Classify, Kind, Layout, MatrixClass, Scalar, Shape, Storage, VectorClass};
use crate::error::LaError;
use crate::matrix::dense::{DenseMatrix, DenseVector};

/// Compressed sparse matrix.
///
/// Row-major storage is CSR, column-major storage is CSC. Within every major line
/// the minor indices are strictly increasing. Explicitly stored zeros are kept
/// until the caller removes them with [`SparseMatrix::prune_zeros`] or
/// [`SparseMatrix::retain`].
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix<T> {
    rows: usize,
    cols: usize,
    layout: Layout,
    ptr: Vec<usize>,
    idx: Vec<usize>,
    vals: Vec<T>,
}

fn major_minor(rows: usize, cols: usize, layout: Layout) -> (usize, usize) {
    match layout {
        Layout::RowMajor => (rows, cols),
        Layout::ColumnMajor => (cols, rows),
    }
}

/// Reindexes a compressed structure so that minor lines become major lines.
/// Output lines are sorted because input lines are visited in order.
pub(crate) fn transpose_compressed<T: Copy>(
    minor_len: usize,
    ptr: &[usize],
    idx: &[usize],
    vals: &[T],
) -> (Vec<usize>, Vec<usize>, Vec<T>) {
    let nnz = idx.len();
    let mut tptr = vec![0usize; minor_len + 1];
    for &m in idx {
        tptr[m + 1] += 1;
    }
    for k in 0..minor_len {
        tptr[k + 1] += tptr[k];
    }
    let mut next = tptr.clone();
    let mut tidx = vec![0usize; nnz];
    let mut tvals = Vec::with_capacity(nnz);
    // placeholder values, overwritten below
    tvals.extend_from_slice(vals);
    for major in 0..ptr.len().saturating_sub(1) {
        for p in ptr[major]..ptr[major + 1] {
            let m = idx[p];
            let dst = next[m];
            tidx[dst] = major;
            tvals[dst] = vals[p];
            next[m] += 1;
        }
    }
    (tptr, tidx, tvals)
}

/// Sorts entries by index and sums duplicates.
fn compress_line<T: Scalar>(mut entries: Vec<(usize, T)>) -> Vec<(usize, T)> {
    entries.sort_by_key(|&(i, _)| i);
    let mut out: Vec<(usize, T)> = Vec::with_capacity(entries.len());
    for (i, v) in entries {
        match out.last_mut() {
            Some((last, acc)) if *last == i => *acc += v,
            _ => out.push((i, v)),
        }
    }
    out
}

impl<T: Scalar> SparseMatrix<T> {
    /// Empty pattern.
    pub fn new(rows: usize, cols: usize, layout: Layout) -> Self {
        let (major, _) = major_minor(rows, cols, layout);
        Self {
            rows,
            cols,
            layout,
            ptr: vec![0; major + 1],
            idx: Vec::new(),
            vals: Vec::new(),
        }
    }

    /// Validates and adopts raw compressed arrays.
    pub fn from_compressed(
        rows: usize,
        cols: usize,
        layout: Layout,
        ptr: Vec<usize>,
        idx: Vec<usize>,
        vals: Vec<T>,
    ) -> Result<Self, LaError> {
        let (major, minor) = major_minor(rows, cols, layout);
        if ptr.len() != major + 1 {
            return Err(LaError::InvalidStructure(format!(
                "pointer array has {} entries, expected {}",
                ptr.len(),
                major + 1
            )));
        }
        if ptr[0] != 0 || ptr[major] != idx.len() || idx.len() != vals.len() {
            return Err(LaError::InvalidStructure(
                "pointer array does not span the index and value arrays".into(),
            ));
        }
        if let Some(k) = ptr.windows(2).position(|w| w[0] > w[1]) {
            return Err(LaError::InvalidStructure(format!("pointer array decreases at line {}", k)));
        }
        for k in 0..major {
            let line = &idx[ptr[k]..ptr[k + 1]];
            if line.iter().any(|&m| m >= minor) {
                return Err(LaError::InvalidStructure(format!("index out of range in line {}", k)));
            }
            if line.windows(2).any(|w| w[0] >= w[1]) {
                return Err(LaError::InvalidStructure(format!(
                    "indices of line {} are not strictly increasing",
                    k
                )));
            }
        }
        Ok(Self {
            rows,
            cols,
            layout,
            ptr,
            idx,
            vals,
        })
    }

    /// Build a CSR from raw row-ptr, col-idx, and values.
    pub fn from_csr(
        nrows: usize,
        ncols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<T>,
    ) -> Result<Self, LaError> {
        Self::from_compressed(nrows, ncols, Layout::RowMajor, row_ptr, col_idx, values)
    }

    /// Build a CSC from raw col-ptr, row-idx, and values.
    pub fn from_csc(
        nrows: usize,
        ncols: usize,
        col_ptr: Vec<usize>,
        row_idx: Vec<usize>,
        values: Vec<T>,
    ) -> Result<Self, LaError> {
        Self::from_compressed(nrows, ncols, Layout::ColumnMajor, col_ptr, row_idx, values)
    }

    /// Builds from `(row, col, value)` triplets in any order; duplicates are summed.
    pub fn from_triplets(
        rows: usize,
        cols: usize,
        layout: Layout,
        triplets: &[(usize, usize, T)],
    ) -> Result<Self, LaError> {
        let (major, _) = major_minor(rows, cols, layout);
        let mut lines: Vec<Vec<(usize, T)>> = vec![Vec::new(); major];
        for &(i, j, v) in triplets {
            if i >= rows || j >= cols {
                return Err(LaError::IndexOutOfBounds { row: i, col: j, rows, cols });
            }
            match layout {
                Layout::RowMajor => lines[i].push((j, v)),
                Layout::ColumnMajor => lines[j].push((i, v)),
            }
        }
        let mut m = Self::new(rows, cols, layout);
        m.reserve(triplets.len());
        for (k, line) in lines.into_iter().enumerate() {
            for (minor, v) in compress_line(line) {
                m.idx.push(minor);
                m.vals.push(v);
            }
            m.ptr[k + 1] = m.idx.len();
        }
        Ok(m)
    }

    /// Stores every nonzero element of `dense`.
    pub fn from_dense(dense: &DenseMatrix<T>, layout: Layout) -> Self {
        let (major, minor) = major_minor(dense.rows(), dense.cols(), layout);
        let mut m = Self::new(dense.rows(), dense.cols(), layout);
        for k in 0..major {
            for q in 0..minor {
                let v = match layout {
                    Layout::RowMajor => dense[(k, q)],
                    Layout::ColumnMajor => dense[(q, k)],
                };
                if v != T::zero() {
                    m.idx.push(q);
                    m.vals.push(v);
                }
            }
            m.ptr[k + 1] = m.idx.len();
        }
        m
    }

    pub fn identity(n: usize) -> Self {
        Self::from_diagonal(&vec![T::one(); n])
    }

    pub fn from_diagonal(diag: &[T]) -> Self {
        let n = diag.len();
        Self {
            rows: n,
            cols: n,
            layout: Layout::RowMajor,
            ptr: (0..=n).collect(),
            idx: (0..n).collect(),
            vals: diag.to_vec(),
        }
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

    pub fn nnz(&self) -> usize {
        self.idx.len()
    }

    /// Number of major lines (rows for CSR, columns for CSC).
    pub fn major_len(&self) -> usize {
        self.ptr.len() - 1
    }

    /// Number of stored entries in major line `k`.
    pub fn nnz_in(&self, k: usize) -> usize {
        self.ptr[k + 1] - self.ptr[k]
    }

    /// Minor indices and values of major line `k`.
    pub fn line(&self, k: usize) -> (&[usize], &[T]) {
        let r = self.ptr[k]..self.ptr[k + 1];
        (&self.idx[r.clone()], &self.vals[r])
    }

    /// Ordered `(minor index, value)` pairs of major line `k`.
    pub fn iter_line(&self, k: usize) -> impl Iterator<Item = (usize, T)> + '_ {
        let (idx, vals) = self.line(k);
        idx.iter().copied().zip(vals.iter().copied())
    }

    /// All stored entries as `(row, col, value)` in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        (0..self.major_len()).flat_map(move |k| {
            self.iter_line(k).map(move |(q, v)| match self.layout {
                Layout::RowMajor => (k, q, v),
                Layout::ColumnMajor => (q, k, v),
            })
        })
    }

    pub fn raw_parts(&self) -> (&[usize], &[usize], &[T]) {
        (&self.ptr, &self.idx, &self.vals)
    }

    fn locate(&self, i: usize, j: usize) -> (usize, Result<usize, usize>) {
        let (k, q) = match self.layout {
            Layout::RowMajor => (i, j),
            Layout::ColumnMajor => (j, i),
        };
        let start = self.ptr[k];
        let found = self.idx[start..self.ptr[k + 1]]
            .binary_search(&q)
            .map(|p| p + start)
            .map_err(|p| p + start);
        (k, found)
    }

    /// Stored entry at `(i, j)`, if any.
    pub fn find(&self, i: usize, j: usize) -> Option<&T> {
        if i >= self.rows || j >= self.cols {
            return None;
        }
        match self.locate(i, j).1 {
            Ok(p) => Some(&self.vals[p]),
            Err(_) => None,
        }
    }

    /// Element `(i, j)`; structural zeros read as zero.
    ///
    /// # Panics
    /// If `(i, j)` is out of bounds.
    pub fn get(&self, i: usize, j: usize) -> T {
        assert!(
            i < self.rows && j < self.cols,
            "index ({}, {}) out of bounds for {}x{}",
            i,
            j,
            self.rows,
            self.cols
        );
        self.find(i, j).copied().unwrap_or_else(T::zero)
    }

    /// Sets `(i, j)`, creating the entry if it is not stored yet. Appending at the
    /// end of the last line is O(1); other positions shift the tail.
    pub fn insert(&mut self, i: usize, j: usize, value: T) -> Result<(), LaError> {
        if i >= self.rows || j >= self.cols {
            return Err(LaError::IndexOutOfBounds {
                row: i,
                col: j,
                rows: self.rows,
                cols: self.cols,
            });
        }
        let (k, found) = self.locate(i, j);
        match found {
            Ok(p) => self.vals[p] = value,
            Err(p) => {
                let q = match self.layout {
                    Layout::RowMajor => j,
                    Layout::ColumnMajor => i,
                };
                self.idx.insert(p, q);
                self.vals.insert(p, value);
                for e in &mut self.ptr[k + 1..] {
                    *e += 1;
                }
            }
        }
        Ok(())
    }

    /// Capacity hint for `additional` more entries.
    pub fn reserve(&mut self, additional: usize) {
        self.idx.reserve(additional);
        self.vals.reserve(additional);
    }

    /// Keeps only the entries for which `keep(row, col, value)` holds.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(usize, usize, T) -> bool,
    {
        let mut w = 0;
        let mut start = 0;
        for k in 0..self.major_len() {
            let end = self.ptr[k + 1];
            for p in start..end {
                let (i, j) = match self.layout {
                    Layout::RowMajor => (k, self.idx[p]),
                    Layout::ColumnMajor => (self.idx[p], k),
                };
                if keep(i, j, self.vals[p]) {
                    self.idx[w] = self.idx[p];
                    self.vals[w] = self.vals[p];
                    w += 1;
                }
            }
            start = end;
            self.ptr[k + 1] = w;
        }
        self.idx.truncate(w);
        self.vals.truncate(w);
    }

    /// Drops explicitly stored zeros.
    pub fn prune_zeros(&mut self) {
        self.retain(|_, _, v| v != T::zero());
    }

    /// Physically transposed copy with the same layout.
    pub fn transpose(&self) -> Self {
        // The same arrays read in the flipped layout already describe the
        // transpose; reindexing restores the original layout.
        let (_, minor) = major_minor(self.rows, self.cols, self.layout);
        let (ptr, idx, vals) = transpose_compressed(minor, &self.ptr, &self.idx, &self.vals);
        Self {
            rows: self.cols,
            cols: self.rows,
            layout: self.layout,
            ptr,
            idx,
            vals,
        }
    }

    /// Copy stored in `layout`.
    pub fn to_layout(&self, layout: Layout) -> Self {
        if layout == self.layout {
            return self.clone();
        }
        let (_, minor) = major_minor(self.rows, self.cols, self.layout);
        let (ptr, idx, vals) = transpose_compressed(minor, &self.ptr, &self.idx, &self.vals);
        Self {
            rows: self.rows,
            cols: self.cols,
            layout,
            ptr,
            idx,
            vals,
        }
    }

    pub fn to_dense(&self) -> DenseMatrix<T> {
        let mut d = DenseMatrix::zeros_with_layout(self.rows, self.cols, self.layout);
        for (i, j, v) in self.iter() {
            d[(i, j)] = v;
        }
        d
    }

    /// Replaces shape and contents with already validated compressed arrays.
    pub(crate) fn install(&mut self, rows: usize, cols: usize, ptr: Vec<usize>, idx: Vec<usize>, vals: Vec<T>) {
        self.rows = rows;
        self.cols = cols;
        self.ptr = ptr;
        self.idx = idx;
        self.vals = vals;
    }
}

/// Sparse row or column vector with strictly increasing indices.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseVector<T> {
    len: usize,
    layout: Layout,
    idx: Vec<usize>,
    vals: Vec<T>,
}

impl<T: Scalar> SparseVector<T> {
    /// Empty column vector.
    pub fn new(len: usize) -> Self {
        Self::with_layout(len, Layout::COLUMN_VECTOR)
    }

    pub fn with_layout(len: usize, layout: Layout) -> Self {
        Self {
            len,
            layout,
            idx: Vec::new(),
            vals: Vec::new(),
        }
    }

    /// Column vector from `(index, value)` pairs in any order; duplicates are summed.
    pub fn from_entries(len: usize, entries: &[(usize, T)]) -> Result<Self, LaError> {
        if let Some(&(i, _)) = entries.iter().find(|&&(i, _)| i >= len) {
            return Err(LaError::IndexOutOfBounds { row: i, col: 0, rows: len, cols: 1 });
        }
        let (idx, vals) = compress_line(entries.to_vec()).into_iter().unzip();
        Ok(Self {
            len,
            layout: Layout::COLUMN_VECTOR,
            idx,
            vals,
        })
    }

    pub fn from_dense(dense: &DenseVector<T>) -> Self {
        let mut v = Self::with_layout(dense.len(), dense.layout());
        for (i, &x) in dense.iter().enumerate() {
            if x != T::zero() {
                v.idx.push(i);
                v.vals.push(x);
            }
        }
        v
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn nnz(&self) -> usize {
        self.idx.len()
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn shape(&self) -> Shape {
        Shape::vector(self.len, self.layout)
    }

    /// Same entries with flipped orientation.
    pub fn transposed(mut self) -> Self {
        self.layout = self.layout.flipped();
        self
    }

    pub fn indices(&self) -> &[usize] {
        &self.idx
    }

    pub fn values(&self) -> &[T] {
        &self.vals
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, T)> + '_ {
        self.idx.iter().copied().zip(self.vals.iter().copied())
    }

    pub fn find(&self, i: usize) -> Option<&T> {
        self.idx.binary_search(&i).ok().map(|p| &self.vals[p])
    }

    /// # Panics
    /// If `i >= len`.
    pub fn get(&self, i: usize) -> T {
        assert!(i < self.len, "index {} out of bounds for length {}", i, self.len);
        self.find(i).copied().unwrap_or_else(T::zero)
    }

    pub fn insert(&mut self, i: usize, value: T) -> Result<(), LaError> {
        if i >= self.len {
            return Err(LaError::IndexOutOfBounds { row: i, col: 0, rows: self.len, cols: 1 });
        }
        match self.idx.binary_search(&i) {
            Ok(p) => self.vals[p] = value,
            Err(p) => {
                self.idx.insert(p, i);
                self.vals.insert(p, value);
            }
        }
        Ok(())
    }

    pub fn reserve(&mut self, additional: usize) {
        self.idx.reserve(additional);
        self.vals.reserve(additional);
    }

    pub fn retain<F: FnMut(usize, T) -> bool>(&mut self, mut keep: F) {
        let mut w = 0;
        for p in 0..self.idx.len() {
            if keep(self.idx[p], self.vals[p]) {
                self.idx[w] = self.idx[p];
                self.vals[w] = self.vals[p];
                w += 1;
            }
        }
        self.idx.truncate(w);
        self.vals.truncate(w);
    }

    pub fn prune_zeros(&mut self) {
        self.retain(|_, v| v != T::zero());
    }

    pub fn to_dense(&self) -> DenseVector<T> {
        let mut d = DenseVector::zeros(self.len);
        for (i, v) in self.iter() {
            d[i] = v;
        }
        match self.layout {
            Layout::ColumnMajor => d,
            Layout::RowMajor => d.transposed(),
        }
    }

    pub(crate) fn install(&mut self, idx: Vec<usize>, vals: Vec<T>) {
        self.idx = idx;
        self.vals = vals;
    }
}

impl<T: Scalar> Classify for SparseMatrix<T> {
    type Class = MatrixClass;
    type Elem = T;
    const STORAGE: Option<Storage> = Some(Storage::Sparse);
    const IS_EXPRESSION: bool = false;

    fn kind(&self) -> Kind {
        Kind::new(Class::Matrix, Storage::Sparse, self.layout)
    }

    fn shape(&self) -> Shape {
        SparseMatrix::shape(self)
    }
}

impl<T: Scalar> Classify for SparseVector<T> {
    type Class = VectorClass;
    type Elem = T;
    const STORAGE: Option<Storage> = Some(Storage::Sparse);
    const IS_EXPRESSION: bool = false;

    fn kind(&self) -> Kind {
        Kind::new(Class::Vector, Storage::Sparse, self.layout)
    }

    fn shape(&self) -> Shape {
        SparseVector::shape(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SparseMatrix<f64> {
        // [[1,2,0],[0,3,4]]
        SparseMatrix::from_csr(2, 3, vec![0, 2, 4], vec![0, 1, 1, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap()
    }

    #[test]
    fn rejects_unsorted_lines() {
        let r = SparseMatrix::from_csr(1, 3, vec![0, 2], vec![2, 1], vec![1.0, 2.0]);
        assert!(matches!(r, Err(LaError::InvalidStructure(_))));
    }

    #[test]
    fn rejects_pointer_overshooting_the_index_array() {
        // ends at idx.len() but passes beyond it on the way
        let r = SparseMatrix::<f64>::from_csr(2, 3, vec![0, 5, 2], vec![0, 1], vec![1.0, 2.0]);
        assert!(matches!(r, Err(LaError::InvalidStructure(_))));
        let r = SparseMatrix::<f64>::from_csc(3, 2, vec![0, 3, 1], vec![0], vec![1.0]);
        assert!(matches!(r, Err(LaError::InvalidStructure(_))));
    }

    #[test]
    fn triplets_sum_duplicates() {
        let m = SparseMatrix::from_triplets(
            2,
            2,
            Layout::RowMajor,
            &[(1, 1, 1.0), (0, 1, 2.0), (1, 1, 3.0)],
        )
        .unwrap();
        assert_eq!(m.nnz(), 2);
        assert_eq!(m.get(1, 1), 4.0);
        assert_eq!(m.get(1, 0), 0.0);
    }

    #[test]
    fn insert_keeps_lines_sorted() {
        let mut m = sample();
        m.insert(0, 2, 9.0).unwrap();
        m.insert(1, 0, 5.0).unwrap();
        m.insert(0, 0, -1.0).unwrap();
        assert_eq!(m.nnz(), 6);
        assert_eq!(m.line(0).0, &[0, 1, 2]);
        assert_eq!(m.line(1).0, &[0, 1, 2]);
        assert_eq!(m.get(0, 0), -1.0);
        assert!(m.insert(2, 0, 1.0).is_err());
    }

    #[test]
    fn layout_conversion_reindexes() {
        let m = sample();
        let c = m.to_layout(Layout::ColumnMajor);
        assert_eq!(c.nnz_in(1), 2);
        assert_eq!(c.line(2), (&[1usize][..], &[4.0][..]));
        for i in 0..2 {
            for j in 0..3 {
                assert_eq!(m.get(i, j), c.get(i, j));
            }
        }
    }

    #[test]
    fn transpose_is_an_involution() {
        let m = sample();
        let t = m.transpose();
        assert_eq!(t.shape(), Shape::new(3, 2));
        assert_eq!(t.layout(), Layout::RowMajor);
        assert_eq!(t.get(2, 1), 4.0);
        assert_eq!(t.transpose(), m);
    }

    #[test]
    fn prune_removes_explicit_zeros() {
        let mut m = SparseMatrix::from_csr(1, 3, vec![0, 3], vec![0, 1, 2], vec![1.0, 0.0, 2.0]).unwrap();
        m.prune_zeros();
        assert_eq!(m.nnz(), 2);
        assert_eq!(m.line(0).0, &[0, 2]);
    }

    #[test]
    fn sparse_vector_entries() {
        let mut v = SparseVector::from_entries(5, &[(3, 1.0), (1, 2.0), (3, 1.0)]).unwrap();
        assert_eq!(v.indices(), &[1, 3]);
        assert_eq!(v.get(3), 2.0);
        v.insert(0, 7.0).unwrap();
        assert_eq!(v.indices(), &[0, 1, 3]);
        assert_eq!(v.to_dense().as_slice(), &[7.0, 2.0, 0.0, 2.0, 0.0]);
    }
}
