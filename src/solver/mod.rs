//! Iterative solvers for box-constrained linear systems.
//!
//! [`PgsSolver`] (projected Gauss–Seidel) handles general matrices with a
//! nonzero diagonal; [`CpgSolver`] (constrained CG) needs a symmetric positive
//! definite matrix. Both evaluate their residuals through the expression engine.

use crate::core::classify::{Scalar, Shape};
use crate::core::traits::SystemMatrix;
use crate::error::LaError;
use crate::matrix::DenseVector;
use crate::utils::convergence::SolveStats;

/// Common interface for the iterative solvers.
pub trait LinearSolver<M, V> {
    type Error;
    type Scalar: Copy + PartialOrd;
    /// Solve A·x = b starting from `x`, writing the result into `x`.
    /// Returns iteration stats (including convergence info).
    fn solve(&mut self, a: &M, b: &V, x: &mut V) -> Result<SolveStats<Self::Scalar>, Self::Error>;
}

pub mod bounds;
pub use bounds::{Bounds, Side};

pub mod pgs;
pub use pgs::{PgsSolver, SweepFlags};

pub mod cpg;
pub use cpg::CpgSolver;

/// Checks that `a` is square and `b`, `x` match it; returns the system size.
pub(crate) fn check_system<T: Scalar, M: SystemMatrix<T>>(
    name: &'static str,
    a: &M,
    b: &DenseVector<T>,
    x: &DenseVector<T>,
) -> Result<usize, LaError> {
    let n = a.nrows();
    let shape = Shape::new(n, a.ncols());
    if a.ncols() != n {
        return Err(LaError::CapabilityMismatch(format!("{name} needs a square matrix, got {shape}")));
    }
    if b.len() != n {
        return Err(LaError::shape(name, shape, b.shape()));
    }
    if x.len() != n {
        return Err(LaError::shape(name, shape, x.shape()));
    }
    Ok(n)
}
