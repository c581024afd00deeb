//! Projected Gauss–Seidel (projected SOR) for box-constrained systems.
//!
//! Each sweep updates the components of `x` in turn, always reading the newest
//! values, and clamps every updated component into its bounds:
//!
//! `x_i <- clamp(x_i + ω (b_i - Σ_j a_ij x_j) / a_ii)`
//!
//! With `[0, ∞)` bounds this solves the linear complementarity problem
//! `x >= 0, Ax - b >= 0, xᵀ(Ax - b) = 0` for suitable `A`. Convergence is
//! measured on the natural residual `‖x - clamp(x + (b - A x))‖`, which vanishes
//! exactly at a solution, relative to its value at the initial guess.

use bitflags::bitflags;
use num_traits::Float;

use crate::core::classify::Scalar;
use crate::core::traits::{InnerProduct, SystemMatrix};
use crate::error::LaError;
use crate::eval::Engine;
use crate::matrix::{DenseVector, SparseMatrix};
use crate::solver::{LinearSolver, check_system};
use crate::solver::bounds::Bounds;
use crate::utils::convergence::{Convergence, SolveStats};

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct SweepFlags: u32 {
        const FORWARD   = 0b01;
        const BACKWARD  = 0b10;
        const SYMMETRIC = Self::FORWARD.bits() | Self::BACKWARD.bits();
    }
}

pub struct PgsSolver<'p, T> {
    pub conv: Convergence<T>,
    pub omega: T,
    pub sweep: SweepFlags,
    /// `None` solves the unconstrained system.
    pub bounds: Option<Bounds<T>>,
    pub monitor: Option<Box<dyn FnMut(usize, T)>>,
    pub residual_history: Vec<T>,
    engine: Engine<'p>,
}

impl<T: Scalar + Float> PgsSolver<'static, T> {
    pub fn new(tol: T, max_iters: usize) -> Self {
        Self {
            conv: Convergence { tol, max_iters },
            omega: T::one(),
            sweep: SweepFlags::FORWARD,
            bounds: None,
            monitor: None,
            residual_history: Vec::new(),
            engine: Engine::serial(),
        }
    }
}

impl<'p, T: Scalar + Float> PgsSolver<'p, T> {
    pub fn with_bounds(mut self, bounds: Bounds<T>) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Relaxation factor; 1 is plain Gauss–Seidel.
    pub fn with_omega(mut self, omega: T) -> Self {
        self.omega = omega;
        self
    }

    pub fn with_sweep(mut self, sweep: SweepFlags) -> Self {
        self.sweep = sweep;
        self
    }

    /// Evaluates residual expressions with `engine`.
    pub fn with_engine<'q>(self, engine: Engine<'q>) -> PgsSolver<'q, T> {
        PgsSolver {
            conv: self.conv,
            omega: self.omega,
            sweep: self.sweep,
            bounds: self.bounds,
            monitor: self.monitor,
            residual_history: self.residual_history,
            engine,
        }
    }

    pub fn with_monitor<F>(mut self, f: F) -> Self
    where
        F: FnMut(usize, T) + 'static,
    {
        self.monitor = Some(Box::new(f));
        self
    }

    pub fn clear_history(&mut self) {
        self.residual_history.clear();
    }

    fn record(&mut self, it: usize, res: T) {
        if let Some(ref mut monitor) = self.monitor {
            monitor(it, res);
        }
        self.residual_history.push(res);
    }

    /// One Gauss–Seidel update of component `i`.
    #[inline]
    fn relax(&self, rows: &SparseMatrix<T>, diag: &[T], bounds: &Bounds<T>, b: &[T], x: &mut [T], i: usize) {
        let (idx, vals) = rows.line(i);
        let sigma = idx.iter().zip(vals).fold(T::zero(), |acc, (&j, &a)| acc + a * x[j]);
        let xi = x[i] + self.omega * (b[i] - sigma) / diag[i];
        x[i] = bounds.clamp(i, xi);
    }

    fn sweep_once(&self, rows: &SparseMatrix<T>, diag: &[T], bounds: &Bounds<T>, b: &[T], x: &mut [T]) {
        let n = x.len();
        if self.sweep.contains(SweepFlags::FORWARD) {
            for i in 0..n {
                self.relax(rows, diag, bounds, b, x, i);
            }
        }
        if self.sweep.contains(SweepFlags::BACKWARD) {
            for i in (0..n).rev() {
                self.relax(rows, diag, bounds, b, x, i);
            }
        }
    }

    /// `‖x - clamp(x + r)‖` with `r = b - A x` evaluated by the engine into `r`.
    fn natural_residual<M: SystemMatrix<T>>(
        &self,
        a: &M,
        b: &DenseVector<T>,
        x: &DenseVector<T>,
        bounds: &Bounds<T>,
        r: &mut DenseVector<T>,
    ) -> Result<T, LaError> {
        self.engine.assign(r, b.expr().sub(a.as_expr().mul(x)?)?)?;
        for (i, ri) in r.as_mut_slice().iter_mut().enumerate() {
            *ri = x[i] - bounds.clamp(i, x[i] + *ri);
        }
        Ok(().norm(r))
    }
}

/// Diagonal of a row-major matrix; a missing or zero entry is a zero pivot.
pub(crate) fn diagonal<T: Scalar>(rows: &SparseMatrix<T>) -> Result<Vec<T>, LaError> {
    (0..rows.rows())
        .map(|i| match rows.find(i, i) {
            Some(&d) if d != T::zero() => Ok(d),
            _ => Err(LaError::ZeroPivot(i)),
        })
        .collect()
}

impl<'p, M, T> LinearSolver<M, DenseVector<T>> for PgsSolver<'p, T>
where
    M: SystemMatrix<T>,
    T: Scalar + Float,
{
    type Error = LaError;
    type Scalar = T;

    fn solve(&mut self, a: &M, b: &DenseVector<T>, x: &mut DenseVector<T>) -> Result<SolveStats<T>, LaError> {
        let n = check_system("pgs", a, b, x)?;
        let supplied = self.bounds.take();
        let unbounded;
        let bounds = match &supplied {
            Some(bounds) => bounds,
            None => {
                unbounded = Bounds::unbounded(n);
                &unbounded
            }
        };
        let result = self.run(a, b, x, bounds);
        self.bounds = supplied;
        result
    }
}

impl<'p, T: Scalar + Float> PgsSolver<'p, T> {
    fn run<M: SystemMatrix<T>>(
        &mut self,
        a: &M,
        b: &DenseVector<T>,
        x: &mut DenseVector<T>,
        bounds: &Bounds<T>,
    ) -> Result<SolveStats<T>, LaError> {
        let n = x.len();
        bounds.check_len(n)?;
        let rows = a.row_major();
        let diag = diagonal(&rows)?;
        let mut r = DenseVector::zeros(n);

        bounds.project(x.as_mut_slice());
        let res0 = self.natural_residual(a, b, x, bounds, &mut r)?;
        self.record(0, res0);
        let (stop, mut stats) = self.conv.check(res0, res0, 0);
        if stop {
            return Ok(stats);
        }

        for it in 1..=self.conv.max_iters {
            self.sweep_once(&rows, &diag, bounds, b.as_slice(), x.as_mut_slice());
            let res = self.natural_residual(a, b, x, bounds, &mut r)?;
            self.record(it, res);
            log::trace!("pgs sweep {it}: natural residual {:?}", res);
            let (stop, s) = self.conv.check(res, res0, it);
            stats = s;
            if stop {
                break;
            }
        }
        if stats.converged {
            log::info!("pgs converged after {} sweeps", stats.iterations);
        } else {
            log::warn!("pgs stopped after {} sweeps without converging ({:?})", stats.iterations, stats.reason);
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classify::Layout;
    use crate::utils::convergence::StopReason;
    use approx::assert_relative_eq;

    #[test]
    fn diagonal_system_in_one_sweep() {
        let a = SparseMatrix::from_diagonal(&[4.0, 4.0]);
        let b = DenseVector::from_vec(vec![8.0, 8.0]);
        let mut x = DenseVector::zeros(2);
        let mut solver = PgsSolver::new(1e-10, 50).with_bounds(Bounds::nonnegative(2));
        let stats = solver.solve(&a, &b, &mut x).unwrap();
        assert!(stats.converged);
        assert_eq!(stats.iterations, 1);
        assert_eq!(x.as_slice(), &[2.0, 2.0]);
    }

    #[test]
    fn active_lower_bound() {
        // unconstrained solution (-1, 2); with x >= 0 the first component sticks at 0
        let a = SparseMatrix::from_triplets(2, 2, Layout::RowMajor, &[(0, 0, 2.0), (1, 1, 1.0)]).unwrap();
        let b = DenseVector::from_vec(vec![-2.0, 2.0]);
        let mut x = DenseVector::from_vec(vec![1.0, 1.0]);
        let mut solver = PgsSolver::new(1e-12, 100).with_bounds(Bounds::nonnegative(2));
        let stats = solver.solve(&a, &b, &mut x).unwrap();
        assert!(stats.converged);
        assert_relative_eq!(x[0], 0.0);
        assert_relative_eq!(x[1], 2.0);
    }

    #[test]
    fn zero_diagonal_is_a_zero_pivot() {
        let a = SparseMatrix::from_triplets(2, 2, Layout::RowMajor, &[(0, 1, 1.0), (1, 0, 1.0)]).unwrap();
        let b = DenseVector::from_vec(vec![1.0, 1.0]);
        let mut x = DenseVector::zeros(2);
        let err = PgsSolver::new(1e-8, 10).solve(&a, &b, &mut x).unwrap_err();
        assert_eq!(err, LaError::ZeroPivot(0));
    }

    #[test]
    fn budget_exhaustion_is_reported() {
        let a = SparseMatrix::from_triplets(
            2,
            2,
            Layout::RowMajor,
            &[(0, 0, 1.0), (0, 1, 0.99), (1, 0, 0.99), (1, 1, 1.0)],
        )
        .unwrap();
        let b = DenseVector::from_vec(vec![1.0, 0.0]);
        let mut x = DenseVector::zeros(2);
        let mut solver = PgsSolver::new(1e-14, 3);
        let stats = solver.solve(&a, &b, &mut x).unwrap();
        assert!(!stats.converged);
        assert_eq!(stats.reason, StopReason::MaxIterations);
        assert_eq!(stats.iterations, 3);
        assert_eq!(solver.residual_history.len(), 4);
    }

    #[test]
    fn symmetric_sweep_with_relaxation() {
        let a = crate::matrix::DenseMatrix::from_rows(&[vec![4.0, 1.0, 0.0], vec![1.0, 3.0, 1.0], vec![0.0, 1.0, 2.0]]).unwrap();
        let b = DenseVector::from_vec(vec![6.0, 10.0, 8.0]);
        let mut x = DenseVector::zeros(3);
        let mut solver = PgsSolver::new(1e-12, 200).with_sweep(SweepFlags::SYMMETRIC).with_omega(1.2);
        let stats = solver.solve(&a, &b, &mut x).unwrap();
        assert!(stats.converged);
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(x[1], 2.0, epsilon = 1e-9);
        assert_relative_eq!(x[2], 3.0, epsilon = 1e-9);
    }
}
