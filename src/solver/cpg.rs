//! Constrained (projected) Conjugate Gradient for box-constrained SPD systems.
//!
//! Minimizes `½ xᵀA x - bᵀx` over `lower <= x <= upper`. Components sitting on
//! a bound with the residual `r = b - A x` pushing outward are *binding* and held
//! fixed; plain CG runs on the remaining free components. A step that would
//! leave the box is cut at the first bound it meets, the blocking components are
//! fixed, and CG restarts from the exact residual. Once the free subproblem is
//! solved the binding set is recomputed, releasing components whose residual
//! now points into the box.
//!
//! Convergence is measured on the projected residual: the norm of `r` over the
//! non-binding components, relative to its value at the initial guess. A
//! direction with `pᵀA p < 0` means `A` is indefinite and is reported as
//! [`LaError::IndefiniteMatrix`]. A direction with `pᵀA p = 0` (singular `A`)
//! cannot make progress: the solve stops with `StopReason::Stalled` and the
//! last iterate is kept.

use num_traits::Float;

use crate::core::classify::Scalar;
use crate::core::traits::{InnerProduct, SystemMatrix};
use crate::error::LaError;
use crate::eval::Engine;
use crate::matrix::DenseVector;
use crate::solver::bounds::Bounds;
use crate::solver::{LinearSolver, check_system};
use crate::utils::convergence::{Convergence, SolveStats};

pub struct CpgSolver<'p, T> {
    pub conv: Convergence<T>,
    pub bounds: Option<Bounds<T>>,
    pub monitor: Option<Box<dyn FnMut(usize, T)>>,
    pub residual_history: Vec<T>,
    engine: Engine<'p>,
}

impl<T: Scalar + Float> CpgSolver<'static, T> {
    pub fn new(tol: T, max_iters: usize) -> Self {
        Self {
            conv: Convergence { tol, max_iters },
            bounds: None,
            monitor: None,
            residual_history: Vec::new(),
            engine: Engine::serial(),
        }
    }
}

/// Free/binding state of every component.
struct ActiveSet {
    free: Vec<bool>,
}

impl ActiveSet {
    fn binding<T: Float>(bounds: &Bounds<T>, i: usize, x: T, r: T) -> bool {
        (x <= bounds.lower()[i] && r <= T::zero()) || (x >= bounds.upper()[i] && r >= T::zero())
    }

    fn from_residual<T: Float>(bounds: &Bounds<T>, x: &[T], r: &[T]) -> Self {
        Self {
            free: (0..x.len()).map(|i| !Self::binding(bounds, i, x[i], r[i])).collect(),
        }
    }

    /// `out = r` on the free components, zero elsewhere.
    fn mask<T: Float>(&self, r: &[T], out: &mut [T]) {
        for ((o, &v), &f) in out.iter_mut().zip(r).zip(&self.free) {
            *o = if f { v } else { T::zero() };
        }
    }
}

/// Norm of `r` over the components not held by a bound.
fn projected_residual<T: Float>(bounds: &Bounds<T>, x: &[T], r: &[T]) -> T {
    (0..x.len())
        .filter(|&i| !ActiveSet::binding(bounds, i, x[i], r[i]))
        .fold(T::zero(), |acc, i| acc + r[i] * r[i])
        .sqrt()
}

/// Step length along `p_i` until component `i` meets the bound it moves toward.
fn room<T: Float>(bounds: &Bounds<T>, i: usize, x: T, p: T) -> Option<T> {
    if p > T::zero() {
        Some((bounds.upper()[i] - x) / p)
    } else if p < T::zero() {
        Some((bounds.lower()[i] - x) / p)
    } else {
        None
    }
}

/// Largest feasible step along `p` from `x` over the free components.
fn max_step<T: Float>(bounds: &Bounds<T>, active: &ActiveSet, x: &[T], p: &[T]) -> T {
    (0..x.len())
        .filter(|&i| active.free[i])
        .filter_map(|i| room(bounds, i, x[i], p[i]))
        .fold(T::infinity(), T::min)
        .max(T::zero())
}

impl<'p, T: Scalar + Float> CpgSolver<'p, T> {
    pub fn with_bounds(mut self, bounds: Bounds<T>) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn with_engine<'q>(self, engine: Engine<'q>) -> CpgSolver<'q, T> {
        CpgSolver {
            conv: self.conv,
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

    fn residual<M: SystemMatrix<T>>(
        &self,
        a: &M,
        b: &DenseVector<T>,
        x: &DenseVector<T>,
        r: &mut DenseVector<T>,
    ) -> Result<(), LaError> {
        self.engine.assign(r, b.expr().sub(a.as_expr().mul(x)?)?)?;
        Ok(())
    }

    fn run<M: SystemMatrix<T>>(
        &mut self,
        a: &M,
        b: &DenseVector<T>,
        x: &mut DenseVector<T>,
        bounds: &Bounds<T>,
    ) -> Result<SolveStats<T>, LaError> {
        let n = x.len();
        bounds.check_len(n)?;
        let engine = self.engine;
        let ip = ();

        bounds.project(x.as_mut_slice());
        let mut r = DenseVector::zeros(n);
        self.residual(a, b, x, &mut r)?;
        let mut active = ActiveSet::from_residual(bounds, x.as_slice(), r.as_slice());
        let mut rf = DenseVector::zeros(n);
        active.mask(r.as_slice(), rf.as_mut_slice());
        let mut p = rf.clone();
        let mut ap = DenseVector::zeros(n);
        let mut rr = ip.dot(&rf, &rf);

        let res0 = projected_residual(bounds, x.as_slice(), r.as_slice());
        self.record(0, res0);
        let (stop, mut stats) = self.conv.check(res0, res0, 0);
        if stop {
            return Ok(stats);
        }
        let free_tol = self.conv.tol * res0;

        for it in 1..=self.conv.max_iters {
            engine.assign(&mut ap, a.as_expr().mul(&p)?)?;
            let pap = ip.dot(&p, &ap);
            if pap < T::zero() {
                log::warn!("cpg: negative curvature {:?} at iteration {it}", pap);
                return Err(LaError::IndefiniteMatrix);
            }
            if pap == T::zero() {
                let res = projected_residual(bounds, x.as_slice(), r.as_slice());
                log::warn!("cpg stalled at iteration {it}: search direction has zero curvature");
                return Ok(SolveStats::stalled(it, res));
            }
            let alpha = rr / pap;
            let alpha_max = max_step(bounds, &active, x.as_slice(), p.as_slice());

            if alpha <= alpha_max {
                let step = p.expr().scale(alpha).add(x.alias())?;
                engine.assign(x, step)?;
                let update = ap.expr().scale(-alpha).add(r.alias())?;
                engine.assign(&mut r, update)?;
                active.mask(r.as_slice(), rf.as_mut_slice());
                let rr_new = ip.dot(&rf, &rf);
                let beta = rr_new / rr;
                let direction = rf.expr().add(p.alias().scale(beta))?;
                engine.assign(&mut p, direction)?;
                rr = rr_new;
            } else {
                let blocking: Vec<usize> = (0..n)
                    .filter(|&i| active.free[i])
                    .filter(|&i| room(bounds, i, x[i], p[i]).is_some_and(|t| t <= alpha_max))
                    .collect();
                let step = p.expr().scale(alpha_max).add(x.alias())?;
                engine.assign(x, step)?;
                for &i in &blocking {
                    x[i] = if p[i] > T::zero() { bounds.upper()[i] } else { bounds.lower()[i] };
                    active.free[i] = false;
                }
                let blocked = blocking.len();
                bounds.project(x.as_mut_slice());
                log::trace!("cpg iteration {it}: step cut at {:?}, {blocked} components blocked", alpha_max);
                self.residual(a, b, x, &mut r)?;
                active.mask(r.as_slice(), rf.as_mut_slice());
                p.as_mut_slice().copy_from_slice(rf.as_slice());
                rr = ip.dot(&rf, &rf);
            }

            let res = projected_residual(bounds, x.as_slice(), r.as_slice());
            self.record(it, res);
            log::trace!("cpg iteration {it}: projected residual {:?}", res);
            let (stop, s) = self.conv.check(res, res0, it);
            stats = s;
            if stop {
                break;
            }

            if rr.sqrt() <= free_tol {
                active = ActiveSet::from_residual(bounds, x.as_slice(), r.as_slice());
                active.mask(r.as_slice(), rf.as_mut_slice());
                p.as_mut_slice().copy_from_slice(rf.as_slice());
                rr = ip.dot(&rf, &rf);
            }
        }
        if stats.converged {
            log::info!("cpg converged after {} iterations", stats.iterations);
        } else {
            log::warn!("cpg stopped after {} iterations without converging ({:?})", stats.iterations, stats.reason);
        }
        Ok(stats)
    }
}

impl<'p, M, T> LinearSolver<M, DenseVector<T>> for CpgSolver<'p, T>
where
    M: SystemMatrix<T>,
    T: Scalar + Float,
{
    type Error = LaError;
    type Scalar = T;

    fn solve(&mut self, a: &M, b: &DenseVector<T>, x: &mut DenseVector<T>) -> Result<SolveStats<T>, LaError> {
        let n = check_system("cpg", a, b, x)?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{DenseMatrix, SparseMatrix};
    use crate::utils::convergence::StopReason;
    use approx::assert_relative_eq;

    fn spd() -> DenseMatrix<f64> {
        DenseMatrix::from_rows(&[vec![4.0, 1.0], vec![1.0, 3.0]]).unwrap()
    }

    #[test]
    fn unconstrained_is_plain_cg() {
        let a = spd();
        let b = DenseVector::from_vec(vec![1.0, 2.0]);
        let mut x = DenseVector::zeros(2);
        let mut solver = CpgSolver::new(1e-10, 10);
        let stats = solver.solve(&a, &b, &mut x).unwrap();
        assert!(stats.converged);
        assert!(stats.iterations <= 2);
        assert_relative_eq!(x[0], 1.0 / 11.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 7.0 / 11.0, epsilon = 1e-12);
    }

    #[test]
    fn binding_lower_bound_is_held() {
        // unconstrained minimizer has x0 = -5/11
        let a = spd();
        let b = DenseVector::from_vec(vec![-1.0, 2.0]);
        let mut x = DenseVector::zeros(2);
        let mut solver = CpgSolver::new(1e-10, 20).with_bounds(Bounds::nonnegative(2));
        let stats = solver.solve(&a, &b, &mut x).unwrap();
        assert!(stats.converged);
        assert_relative_eq!(x[0], 0.0);
        assert_relative_eq!(x[1], 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn blocked_step_then_release() {
        // unconstrained solution (1/11, 7/11) leaves the box through x1
        let a = spd();
        let b = DenseVector::from_vec(vec![1.0, 2.0]);
        let mut x = DenseVector::zeros(2);
        let bounds = Bounds::uniform(2, 0.0, 0.5).unwrap();
        let mut solver = CpgSolver::new(1e-10, 50).with_bounds(bounds);
        let stats = solver.solve(&a, &b, &mut x).unwrap();
        assert!(stats.converged);
        // x1 = 0.5 binding, x0 = (1 - 0.5) / 4
        assert_relative_eq!(x[1], 0.5);
        assert_relative_eq!(x[0], 0.125, epsilon = 1e-10);
    }

    #[test]
    fn indefinite_matrix_is_reported() {
        let a = SparseMatrix::from_diagonal(&[1.0, -1.0]);
        let b = DenseVector::from_vec(vec![0.0, 1.0]);
        let mut x = DenseVector::zeros(2);
        let err = CpgSolver::new(1e-8, 10).solve(&a, &b, &mut x).unwrap_err();
        assert_eq!(err, LaError::IndefiniteMatrix);
    }

    #[test]
    fn singular_matrix_stalls_on_a_null_direction() {
        // second direction (1, -1) lies in the null space of A
        let a = DenseMatrix::from_rows(&[vec![1.0, 1.0], vec![1.0, 1.0]]).unwrap();
        let b = DenseVector::from_vec(vec![1.0, 0.0]);
        let mut x = DenseVector::zeros(2);
        let stats = CpgSolver::new(1e-10, 10).solve(&a, &b, &mut x).unwrap();
        assert!(!stats.converged);
        assert_eq!(stats.reason, StopReason::Stalled);
        assert_eq!(stats.iterations, 2);
        assert_relative_eq!(stats.final_residual, 1.0, epsilon = 1e-12);
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn zero_initial_residual_converges_immediately() {
        let a = spd();
        let b = DenseVector::zeros(2);
        let mut x = DenseVector::zeros(2);
        let stats = CpgSolver::new(1e-8, 10).solve(&a, &b, &mut x).unwrap();
        assert!(stats.converged);
        assert_eq!(stats.iterations, 0);
    }
}
