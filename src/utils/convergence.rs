//! Convergence tracking & tolerance checks for iterative solvers.

/// Stopping criteria.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Convergence<T> {
    pub tol: T,
    pub max_iters: usize,
}

/// Why an iteration stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Relative residual at or below the tolerance.
    Converged,
    /// Iteration budget exhausted.
    MaxIterations,
    /// No further progress possible (e.g. a zero search direction).
    Stalled,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SolveStats<T> {
    pub iterations: usize,
    pub final_residual: T,
    pub converged: bool,
    pub reason: StopReason,
}

impl<T: Copy + num_traits::Float> Convergence<T> {
    pub fn new(tol: T, max_iters: usize) -> Self {
        Self { tol, max_iters }
    }

    /// Returns (should_stop, stats) given current `res_norm`, the reference
    /// `res0_norm` and iteration `i`. A zero reference residual counts as converged.
    pub fn check(&self, res_norm: T, res0_norm: T, i: usize) -> (bool, SolveStats<T>) {
        let converged = if res0_norm == T::zero() {
            res_norm == T::zero()
        } else {
            res_norm / res0_norm <= self.tol
        };
        let reason = if converged {
            StopReason::Converged
        } else {
            StopReason::MaxIterations
        };
        (
            converged || i >= self.max_iters,
            SolveStats {
                iterations: i,
                final_residual: res_norm,
                converged,
                reason,
            },
        )
    }
}

impl<T: Copy> SolveStats<T> {
    /// Stats of a run that stopped without progress.
    pub fn stalled(iterations: usize, final_residual: T) -> Self {
        Self {
            iterations,
            final_residual,
            converged: false,
            reason: StopReason::Stalled,
        }
    }
}
