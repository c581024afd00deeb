//! Evaluation of expressions into destinations.
//!
//! [`Engine::assign`] is the single entry point that writes: it checks the
//! destination shape, analyses whether the destination reads itself through an
//! [`Alias`](crate::expr::Alias), lowers the tree into a flat sum of terms and
//! runs the kernels. Nothing is written before every check has passed.
//!
//! The chosen [`Strategy`] is returned and logged at `debug` level.

mod kernels;
pub(crate) mod plan;
pub(crate) mod view;

use crate::config::options::EvalOptions;
use crate::core::classify::{Classify, Layout, Scalar, Shape, VectorClass};
use crate::error::LaError;
use crate::expr::node::{AliasHandle, Node};
use crate::expr::{IntoExpr, MatExpr, VecExpr, container_id};
use crate::matrix::{DenseMatrix, DenseVector, Matrix, SparseMatrix, SparseVector, Vector};
use crate::parallel::{Job, WorkerPool};

use kernels::{Init, ResolvedTerm};
use plan::{AliasUse, Lowering, Temp};
use view::{BlockMut, View};

/// How an assignment was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Dense kernels straight into the destination; a destination that appears
    /// only at its own position is scaled in place first.
    Direct,
    /// Evaluated into a temporary that then replaced the destination contents,
    /// because the destination was read under a product or a transpose.
    Buffered,
    /// Sparse operands were traversed by their patterns in one pass, without
    /// densifying them.
    Fused,
}

/// Containers that can receive an assignment.
pub trait Destination<T: Scalar>: Classify<Elem = T> {
    #[doc(hidden)]
    fn sink(&mut self) -> Sink<'_, T>;
}

/// Mutable access to a destination, handed to the engine.
#[doc(hidden)]
pub struct Sink<'d, T>(SinkKind<'d, T>);

enum SinkKind<'d, T> {
    DenseMatrix(&'d mut DenseMatrix<T>),
    SparseMatrix(&'d mut SparseMatrix<T>),
    DenseVector(&'d mut DenseVector<T>),
    SparseVector(&'d mut SparseVector<T>),
}

macro_rules! destination {
    ($container:ident) => {
        impl<T: Scalar> Destination<T> for $container<T> {
            fn sink(&mut self) -> Sink<'_, T> {
                Sink(SinkKind::$container(self))
            }
        }
    };
}

destination!(DenseMatrix);
destination!(SparseMatrix);
destination!(DenseVector);
destination!(SparseVector);

/// Evaluation engine. Serial unless built over a worker pool, in which case
/// large dense destinations are split into blocks evaluated concurrently.
#[derive(Clone, Copy)]
pub struct Engine<'p> {
    pool: Option<&'p dyn WorkerPool>,
    options: EvalOptions,
}

impl std::fmt::Debug for Engine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("workers", &self.pool.map_or(1, |p| p.size()))
            .field("options", &self.options)
            .finish()
    }
}

impl Engine<'static> {
    pub fn serial() -> Self {
        Self {
            pool: None,
            options: EvalOptions::default(),
        }
    }
}

impl Default for Engine<'static> {
    fn default() -> Self {
        Self::serial()
    }
}

impl<'p> Engine<'p> {
    pub fn with_pool(pool: &'p dyn WorkerPool, options: EvalOptions) -> Self {
        Self {
            pool: Some(pool),
            options,
        }
    }

    pub fn options(&self) -> &EvalOptions {
        &self.options
    }

    /// Evaluates `expr` into `dest`.
    ///
    /// Fails with [`LaError::ShapeMismatch`] if the shapes differ and with
    /// [`LaError::AliasMismatch`] if the expression holds an alias handle of
    /// any container other than `dest`; in both cases `dest` is untouched.
    pub fn assign<'a, T, D, E>(&self, dest: &mut D, expr: E) -> Result<Strategy, LaError>
    where
        T: Scalar,
        D: Destination<T>,
        E: IntoExpr<'a, T, Class = <D as Classify>::Class>,
    {
        let node = expr.into_expr().into_node();
        let target = AliasHandle {
            id: container_id(&*dest),
            kind: dest.kind(),
            shape: dest.shape(),
            scalar: T::KIND,
        };
        if node.shape() != target.shape {
            return Err(LaError::shape("assign", target.shape, node.shape()));
        }
        let usage = plan::alias_use(&node, &target)?;
        let strategy = match usage {
            AliasUse::Hazard => Strategy::Buffered,
            AliasUse::InPlace if target.kind.is_sparse() => Strategy::Buffered,
            _ if target.kind.is_sparse() || node.has_sparse_leaf() => Strategy::Fused,
            _ => Strategy::Direct,
        };
        log::debug!(
            "assign {} ({} nodes) into {:?} destination: {:?}",
            target.shape,
            node.size(),
            target.kind.storage,
            strategy
        );
        let buffered = strategy == Strategy::Buffered;
        let in_place = usage == AliasUse::InPlace;
        match dest.sink().0 {
            SinkKind::DenseMatrix(m) => {
                if buffered {
                    let mut tmp = DenseMatrix::padded(m.rows(), m.cols(), m.layout(), m.alignment());
                    self.write_dense(BlockMut::of_matrix(&mut tmp), node, Some(View::of_dense_matrix(m)), false)?;
                    *m = tmp;
                } else {
                    self.write_dense(BlockMut::of_matrix(m), node, None, in_place)?;
                }
            }
            SinkKind::DenseVector(v) => {
                if buffered {
                    let mut tmp = DenseVector::zeros(v.len());
                    if v.layout() == Layout::ROW_VECTOR {
                        tmp = tmp.transposed();
                    }
                    self.write_dense(BlockMut::of_vector(&mut tmp), node, Some(View::of_dense_vector(v)), false)?;
                    *v = tmp;
                } else {
                    self.write_dense(BlockMut::of_vector(v), node, None, in_place)?;
                }
            }
            SinkKind::SparseMatrix(m) => {
                let (shape, layout) = (m.shape(), m.layout());
                let snapshot = buffered.then(|| View::of_sparse_matrix(&*m));
                let (ptr, idx, vals) = self.write_sparse(node, snapshot, shape, layout, m.nnz())?;
                m.install(shape.rows, shape.cols, ptr, idx, vals);
            }
            SinkKind::SparseVector(v) => {
                let (shape, layout) = (v.shape(), v.layout());
                let snapshot = buffered.then(|| View::of_sparse_vector(&*v));
                let (_, idx, vals) = self.write_sparse(node, snapshot, shape, layout, v.nnz())?;
                v.install(idx, vals);
            }
        }
        Ok(strategy)
    }

    /// Materializes a matrix expression into a fresh container of its resolved kind.
    pub fn eval_matrix<T: Scalar>(&self, expr: MatExpr<'_, T>) -> Result<Matrix<T>, LaError> {
        let (kind, shape) = (expr.kind(), expr.shape());
        if kind.is_dense() {
            let mut m = DenseMatrix::zeros_with_layout(shape.rows, shape.cols, kind.layout);
            self.assign(&mut m, expr)?;
            Ok(Matrix::Dense(m))
        } else {
            let mut m = SparseMatrix::new(shape.rows, shape.cols, kind.layout);
            self.assign(&mut m, expr)?;
            Ok(Matrix::Sparse(m))
        }
    }

    /// Materializes a vector expression into a fresh container of its resolved kind.
    pub fn eval_vector<T: Scalar>(&self, expr: VecExpr<'_, T>) -> Result<Vector<T>, LaError> {
        let (kind, len) = (expr.kind(), expr.shape().len());
        if kind.is_dense() {
            let mut v = DenseVector::zeros(len);
            if kind.layout == Layout::ROW_VECTOR {
                v = v.transposed();
            }
            self.assign(&mut v, expr)?;
            Ok(Vector::Dense(v))
        } else {
            let mut v = SparseVector::with_layout(len, kind.layout);
            self.assign(&mut v, expr)?;
            Ok(Vector::Sparse(v))
        }
    }

    /// Inner product of two vector expressions of equal length, ignoring
    /// orientation. Complex entries are not conjugated.
    pub fn dot<'a, T, L, R>(&self, lhs: L, rhs: R) -> Result<T, LaError>
    where
        T: Scalar,
        L: IntoExpr<'a, T, Class = VectorClass>,
        R: IntoExpr<'a, T, Class = VectorClass>,
    {
        let l = lhs.into_expr().into_node();
        let r = rhs.into_expr().into_node();
        if l.shape().len() != r.shape().len() {
            return Err(LaError::shape("dot", l.shape(), r.shape()));
        }
        let mut lowering = Lowering::new(self, None, false, false);
        let (lo, lf) = lowering.operand(l, false)?;
        let (ro, rf) = lowering.operand(r, false)?;
        let plan = lowering.finish();
        let value = kernels::dot(&plan.view(&lo, None)?, &plan.view(&ro, None)?);
        Ok(lf * rf * value)
    }

    /// Evaluates a sub-expression into an owned temporary of its resolved kind.
    pub(crate) fn materialize<'a, 's, T: Scalar>(
        &self,
        node: Node<'a, T>,
        snapshot: Option<View<'s, T>>,
    ) -> Result<Temp<T>, LaError> {
        let (kind, shape) = (node.kind(), node.shape());
        if kind.is_dense() {
            let mut m = DenseMatrix::zeros_with_layout(shape.rows, shape.cols, kind.layout);
            self.write_dense(BlockMut::of_matrix(&mut m), node, snapshot, false)?;
            Ok(Temp::Dense(m))
        } else {
            let (ptr, idx, vals) = self.write_sparse(node, snapshot, shape, kind.layout, 0)?;
            let mut m = SparseMatrix::new(shape.rows, shape.cols, kind.layout);
            m.install(shape.rows, shape.cols, ptr, idx, vals);
            Ok(Temp::Sparse(m))
        }
    }

    fn write_dense<'a, 's, T: Scalar>(
        &self,
        block: BlockMut<'_, T>,
        node: Node<'a, T>,
        snapshot: Option<View<'s, T>>,
        in_place: bool,
    ) -> Result<(), LaError> {
        let plan = Lowering::new(self, snapshot, false, in_place).run(node, false)?;
        let terms = plan.resolve(snapshot)?;
        let init = plan.alias_coeff.map_or(Init::Zero, Init::Scale);
        self.fill(block, init, &terms);
        Ok(())
    }

    /// Compressed arrays of `node` in `layout`. Column-major results are
    /// produced as the rows of the transposed expression.
    fn write_sparse<'a, 's, T: Scalar>(
        &self,
        node: Node<'a, T>,
        snapshot: Option<View<'s, T>>,
        shape: Shape,
        layout: Layout,
        nnz_hint: usize,
    ) -> Result<(Vec<usize>, Vec<usize>, Vec<T>), LaError> {
        let transposed = layout == Layout::ColumnMajor;
        let (major, minor) = if transposed {
            (shape.cols, shape.rows)
        } else {
            (shape.rows, shape.cols)
        };
        let plan = Lowering::new(self, snapshot, true, false).run(node, transposed)?;
        let terms = plan.resolve(snapshot)?;
        let mut ptr = Vec::with_capacity(major + 1);
        let mut idx = Vec::with_capacity(nnz_hint);
        let mut vals = Vec::with_capacity(nnz_hint);
        kernels::sparse_lines(&terms, major, minor, &mut ptr, &mut idx, &mut vals);
        Ok((ptr, idx, vals))
    }

    fn fill<T: Scalar>(&self, block: BlockMut<'_, T>, init: Init<T>, terms: &[ResolvedTerm<'_, T>]) {
        match self.pool {
            Some(pool) if block.len() >= self.options.parallel_threshold => {
                let parts = match self.options.max_blocks {
                    0 => pool.size(),
                    n => n,
                };
                let jobs: Vec<Job<'_>> = block
                    .split(parts)
                    .into_iter()
                    .map(|mut b| Box::new(move || kernels::fill_block(&mut b, init, terms)) as Job<'_>)
                    .collect();
                log::trace!("dense fill split into {} blocks", jobs.len());
                pool.join_all(jobs);
            }
            _ => {
                let mut block = block;
                kernels::fill_block(&mut block, init, terms);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::SerialPool;
    use approx::assert_relative_eq;

    #[test]
    fn sum_into_dense_vector() {
        let x = DenseVector::from_vec(vec![1.0, 2.0]);
        let y = DenseVector::from_vec(vec![10.0, 20.0]);
        let mut z = DenseVector::zeros(2);
        let s = Engine::serial().assign(&mut z, x.expr().add(y.expr().scale(0.5)).unwrap()).unwrap();
        assert_eq!(s, Strategy::Direct);
        assert_eq!(z.as_slice(), &[6.0, 12.0]);
    }

    #[test]
    fn in_place_update_keeps_direct_strategy() {
        let d = DenseVector::from_vec(vec![1.0, 1.0]);
        let mut x = DenseVector::from_vec(vec![2.0, 3.0]);
        let e: VecExpr<'_, f64> = x.alias().into_expr();
        let e = e.scale(2.0).sub(&d).unwrap();
        let s = Engine::serial().assign(&mut x, e).unwrap();
        assert_eq!(s, Strategy::Direct);
        assert_eq!(x.as_slice(), &[3.0, 5.0]);
    }

    #[test]
    fn product_alias_is_buffered() {
        let a = DenseMatrix::from_rows(&[vec![0.0, 1.0], vec![1.0, 0.0]]).unwrap();
        let mut x = DenseVector::from_vec(vec![1.0, 2.0]);
        let e = a.expr().mul(x.alias()).unwrap();
        let s = Engine::serial().assign(&mut x, e).unwrap();
        assert_eq!(s, Strategy::Buffered);
        assert_eq!(x.as_slice(), &[2.0, 1.0]);
    }

    #[test]
    fn sparse_terms_are_fused() {
        let a = SparseMatrix::from_triplets(2, 2, Layout::ColumnMajor, &[(0, 1, 2.0), (1, 0, 3.0)]).unwrap();
        let x = DenseVector::from_vec(vec![1.0, 1.0]);
        let mut y = DenseVector::zeros(2);
        let s = Engine::serial().assign(&mut y, a.expr().mul(&x).unwrap()).unwrap();
        assert_eq!(s, Strategy::Fused);
        assert_eq!(y.as_slice(), &[2.0, 3.0]);
    }

    #[test]
    fn column_major_sparse_destination() {
        let a = SparseMatrix::from_triplets(2, 3, Layout::RowMajor, &[(0, 0, 1.0), (1, 2, 2.0)]).unwrap();
        let b = SparseMatrix::from_triplets(2, 3, Layout::ColumnMajor, &[(0, 0, 1.0), (0, 1, 4.0)]).unwrap();
        let mut c = SparseMatrix::new(2, 3, Layout::ColumnMajor);
        Engine::serial().assign(&mut c, a.expr().add(&b).unwrap()).unwrap();
        assert_eq!(c.layout(), Layout::ColumnMajor);
        assert_eq!(c.nnz(), 3);
        assert_eq!(c.get(0, 0), 2.0);
        assert_eq!(c.get(0, 1), 4.0);
        assert_eq!(c.get(1, 2), 2.0);
    }

    #[test]
    fn nested_product_materializes_operands() {
        let a = DenseMatrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let b = SparseMatrix::<f64>::identity(2);
        let x = DenseVector::from_vec(vec![1.0, -1.0]);
        // (A + B)^T x
        let e = a.expr().add(&b).unwrap().transpose().mul(&x).unwrap();
        match e.eval().unwrap() {
            Vector::Dense(y) => {
                assert_relative_eq!(y[0], -1.0);
                assert_relative_eq!(y[1], -3.0);
            }
            Vector::Sparse(_) => panic!("expected a dense result"),
        }
    }

    #[test]
    fn pooled_engine_matches_serial() {
        let pool = SerialPool;
        let opts = EvalOptions {
            parallel_threshold: 1,
            max_blocks: 4,
        };
        let engine = Engine::with_pool(&pool, opts);
        let a = DenseMatrix::from_fn(6, 5, Layout::ColumnMajor, |i, j| (i + 2 * j) as f64);
        let b = DenseMatrix::from_fn(5, 4, Layout::RowMajor, |i, j| (i * j) as f64 - 1.0);
        let mut c = DenseMatrix::zeros(6, 4);
        let mut d = DenseMatrix::zeros(6, 4);
        engine.assign(&mut c, a.expr().mul(&b).unwrap()).unwrap();
        Engine::serial().assign(&mut d, a.expr().mul(&b).unwrap()).unwrap();
        assert_eq!(c, d);
    }

    #[test]
    fn dot_ignores_orientation() {
        let x = DenseVector::from_vec(vec![1.0, 2.0, 3.0]);
        let y = SparseVector::from_entries(3, &[(0, 2.0), (2, -1.0)]).unwrap();
        let d = Engine::serial().dot(x.expr().transpose(), &y).unwrap();
        assert_relative_eq!(d, -1.0);
    }
}
