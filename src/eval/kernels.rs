// Accumulation kernels over resolved views.
//
// Sparse product operands always arrive row-major, so a product is computed
// row by row: row i of L*R is the combination of the rows k of R weighted by
// L[i, k]. Dense destinations accumulate straight into their buffer, sparse
// destinations are produced one major line at a time.

use crate::core::classify::{Layout, Scalar};

use super::view::{BlockMut, View};

/// Starting value of a dense destination block.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Init<T> {
    Zero,
    /// Keep the current contents, multiplied by the factor.
    Scale(T),
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Resolved<'v, T> {
    Single(View<'v, T>),
    Product(View<'v, T>, View<'v, T>),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ResolvedTerm<'v, T> {
    pub(crate) coeff: T,
    pub(crate) body: Resolved<'v, T>,
}

/// `block = init(block) + sum coeff * body` over the block's window.
pub(crate) fn fill_block<T: Scalar>(block: &mut BlockMut<'_, T>, init: Init<T>, terms: &[ResolvedTerm<'_, T>]) {
    match init {
        Init::Zero => block.for_each_mut(|v| *v = T::zero()),
        Init::Scale(c) if c == T::one() => {}
        Init::Scale(c) => block.for_each_mut(|v| *v *= c),
    }
    for term in terms {
        accumulate(block, term);
    }
}

fn accumulate<T: Scalar>(block: &mut BlockMut<'_, T>, term: &ResolvedTerm<'_, T>) {
    let c = term.coeff;
    let (rows, cols) = (block.rows(), block.cols());
    match term.body {
        Resolved::Single(View::Dense(d)) => {
            for i in rows {
                for j in cols.clone() {
                    *block.at(i, j) += c * d.get(i, j);
                }
            }
        }
        Resolved::Single(View::Sparse(s)) => match s.layout() {
            Layout::RowMajor => {
                for i in rows {
                    let (idx, vals) = s.line(i);
                    for (&j, &v) in idx.iter().zip(vals) {
                        if cols.contains(&j) {
                            *block.at(i, j) += c * v;
                        }
                    }
                }
            }
            Layout::ColumnMajor => {
                for j in cols {
                    let (idx, vals) = s.line(j);
                    for (&i, &v) in idx.iter().zip(vals) {
                        if rows.contains(&i) {
                            *block.at(i, j) += c * v;
                        }
                    }
                }
            }
        },
        Resolved::Product(l, r) => {
            for i in rows {
                match l {
                    View::Dense(a) => {
                        for k in 0..a.cols() {
                            row_axpy(block, i, c * a.get(i, k), &r, k);
                        }
                    }
                    View::Sparse(a) => {
                        debug_assert_eq!(a.layout(), Layout::RowMajor);
                        let (idx, vals) = a.line(i);
                        for (&k, &v) in idx.iter().zip(vals) {
                            row_axpy(block, i, c * v, &r, k);
                        }
                    }
                }
            }
        }
    }
}

/// `block[i, :] += s * r[k, :]` restricted to the block's columns.
#[inline]
fn row_axpy<T: Scalar>(block: &mut BlockMut<'_, T>, i: usize, s: T, r: &View<'_, T>, k: usize) {
    let cols = block.cols();
    match r {
        View::Dense(b) => {
            for j in cols {
                *block.at(i, j) += s * b.get(k, j);
            }
        }
        View::Sparse(b) => {
            debug_assert_eq!(b.layout(), Layout::RowMajor);
            let (idx, vals) = b.line(k);
            let start = idx.partition_point(|&j| j < cols.start);
            for (&j, &v) in idx[start..].iter().zip(&vals[start..]) {
                if j >= cols.end {
                    break;
                }
                *block.at(i, j) += s * v;
            }
        }
    }
}

/// Sparse accumulator for one output line.
struct Accumulator<T> {
    vals: Vec<T>,
    seen: Vec<bool>,
    touched: Vec<usize>,
}

impl<T: Scalar> Accumulator<T> {
    fn new(width: usize) -> Self {
        Self {
            vals: vec![T::zero(); width],
            seen: vec![false; width],
            touched: Vec::new(),
        }
    }

    #[inline]
    fn add(&mut self, j: usize, v: T) {
        if self.seen[j] {
            self.vals[j] += v;
        } else {
            self.seen[j] = true;
            self.vals[j] = v;
            self.touched.push(j);
        }
    }

    /// Adds `s * r[k, :]`; dense rows contribute their nonzeros only.
    fn scatter_row(&mut self, s: T, r: &View<'_, T>, k: usize) {
        match r {
            View::Dense(b) => {
                for j in 0..b.cols() {
                    let v = b.get(k, j);
                    if v != T::zero() {
                        self.add(j, s * v);
                    }
                }
            }
            View::Sparse(b) => {
                let (idx, vals) = b.line(k);
                for (&j, &v) in idx.iter().zip(vals) {
                    self.add(j, s * v);
                }
            }
        }
    }

    /// Drains the accumulated entries into `out` in index order.
    fn gather(&mut self, out: &mut Vec<(usize, T)>) {
        self.touched.sort_unstable();
        for &j in &self.touched {
            out.push((j, self.vals[j]));
            self.seen[j] = false;
        }
        self.touched.clear();
    }
}

/// Line `i` of one term, scaled by its coefficient, sorted by index.
fn term_line<T: Scalar>(term: &ResolvedTerm<'_, T>, i: usize, spa: &mut Accumulator<T>, out: &mut Vec<(usize, T)>) {
    let c = term.coeff;
    match term.body {
        Resolved::Single(View::Dense(d)) => {
            for j in 0..d.cols() {
                let v = d.get(i, j);
                if v != T::zero() {
                    out.push((j, c * v));
                }
            }
        }
        Resolved::Single(View::Sparse(s)) => {
            debug_assert_eq!(s.layout(), Layout::RowMajor);
            let (idx, vals) = s.line(i);
            out.extend(idx.iter().zip(vals).map(|(&j, &v)| (j, c * v)));
        }
        Resolved::Product(l, r) => {
            match l {
                View::Dense(a) => {
                    for k in 0..a.cols() {
                        let v = a.get(i, k);
                        if v != T::zero() {
                            spa.scatter_row(c * v, &r, k);
                        }
                    }
                }
                View::Sparse(a) => {
                    let (idx, vals) = a.line(i);
                    for (&k, &v) in idx.iter().zip(vals) {
                        spa.scatter_row(c * v, &r, k);
                    }
                }
            }
            spa.gather(out);
        }
    }
}

/// Union of two sorted entry streams; coinciding entries are summed and kept
/// even when the sum is zero.
fn merge_lines<T: Scalar>(a: &[(usize, T)], b: &[(usize, T)], out: &mut Vec<(usize, T)>) {
    out.clear();
    out.reserve(a.len() + b.len());
    let (mut p, mut q) = (0, 0);
    while p < a.len() && q < b.len() {
        let (ja, va) = a[p];
        let (jb, vb) = b[q];
        if ja < jb {
            out.push((ja, va));
            p += 1;
        } else if jb < ja {
            out.push((jb, vb));
            q += 1;
        } else {
            out.push((ja, va + vb));
            p += 1;
            q += 1;
        }
    }
    out.extend_from_slice(&a[p..]);
    out.extend_from_slice(&b[q..]);
}

/// Compressed arrays of `sum coeff * body`, one major line per row of the
/// (row-major) terms. `ptr`, `idx` and `vals` are appended to.
pub(crate) fn sparse_lines<T: Scalar>(
    terms: &[ResolvedTerm<'_, T>],
    major: usize,
    minor: usize,
    ptr: &mut Vec<usize>,
    idx: &mut Vec<usize>,
    vals: &mut Vec<T>,
) {
    let mut spa = Accumulator::new(minor);
    let mut acc = Vec::new();
    let mut line = Vec::new();
    let mut merged = Vec::new();
    ptr.push(idx.len());
    for i in 0..major {
        acc.clear();
        for term in terms {
            line.clear();
            term_line(term, i, &mut spa, &mut line);
            if acc.is_empty() {
                std::mem::swap(&mut acc, &mut line);
            } else {
                merge_lines(&acc, &line, &mut merged);
                std::mem::swap(&mut acc, &mut merged);
            }
        }
        for &(j, v) in &acc {
            idx.push(j);
            vals.push(v);
        }
        ptr.push(idx.len());
    }
}

/// Unconjugated inner product of two vector-shaped views.
pub(crate) fn dot<T: Scalar>(l: &View<'_, T>, r: &View<'_, T>) -> T {
    match (l, r) {
        (View::Sparse(a), View::Sparse(b)) => {
            let (a, b) = (a.vector_entries(), b.vector_entries());
            let (mut p, mut q) = (0, 0);
            let mut sum = T::zero();
            while p < a.len() && q < b.len() {
                if a[p].0 < b[q].0 {
                    p += 1;
                } else if b[q].0 < a[p].0 {
                    q += 1;
                } else {
                    sum += a[p].1 * b[q].1;
                    p += 1;
                    q += 1;
                }
            }
            sum
        }
        (View::Sparse(a), d) | (d, View::Sparse(a)) => a
            .vector_entries()
            .into_iter()
            .fold(T::zero(), |acc, (p, v)| acc + v * d.vector_get(p)),
        (a, b) => (0..a.shape().len()).fold(T::zero(), |acc, p| acc + a.vector_get(p) * b.vector_get(p)),
    }
}
