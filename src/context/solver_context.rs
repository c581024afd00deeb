//! Factory for the projected solvers.

use num_traits::Float;

use crate::config::SolverOptions;
use crate::core::classify::Scalar;
use crate::core::traits::SystemMatrix;
use crate::error::LaError;
use crate::eval::Engine;
use crate::matrix::DenseVector;
use crate::solver::{Bounds, CpgSolver, LinearSolver, PgsSolver};
use crate::utils::convergence::SolveStats;

/// Available solver types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverKind {
    /// Projected Gauss–Seidel / SOR
    Pgs,
    /// Constrained Conjugate Gradient (SPD matrices)
    Cpg,
}

/// Solver configuration: kind and parameters, bounds, and the engine used for
/// residual evaluation.
#[derive(Debug, Clone)]
pub struct SolverContext<'p, T> {
    pub options: SolverOptions,
    /// `None` solves the unconstrained system.
    pub bounds: Option<Bounds<T>>,
    engine: Engine<'p>,
}

impl<T: Scalar + Float> SolverContext<'static, T> {
    pub fn new(options: SolverOptions) -> Self {
        Self {
            options,
            bounds: None,
            engine: Engine::serial(),
        }
    }
}

impl<'p, T: Scalar + Float> SolverContext<'p, T> {
    pub fn with_bounds(mut self, bounds: Bounds<T>) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn with_engine<'q>(self, engine: Engine<'q>) -> SolverContext<'q, T> {
        SolverContext {
            options: self.options,
            bounds: self.bounds,
            engine,
        }
    }

    pub fn kind(&self) -> SolverKind {
        self.options.kind
    }

    fn cast(name: &str, v: f64) -> Result<T, LaError> {
        <T as num_traits::NumCast>::from(v).ok_or_else(|| LaError::InvalidOption(format!("{name}: {v} is not representable")))
    }

    /// Solve `A x = b` within the bounds with the configured solver.
    pub fn solve_context<M: SystemMatrix<T>>(
        &self,
        a: &M,
        b: &DenseVector<T>,
        x: &mut DenseVector<T>,
    ) -> Result<SolveStats<T>, LaError> {
        let tol = Self::cast("-tol", self.options.tol)?;
        let max_it = self.options.max_it;
        log::debug!("solving {}x{} system with {:?}", a.nrows(), a.ncols(), self.options.kind);
        match self.options.kind {
            SolverKind::Pgs => {
                let mut solver = PgsSolver::new(tol, max_it)
                    .with_omega(Self::cast("-omega", self.options.omega)?)
                    .with_sweep(self.options.sweep)
                    .with_engine(self.engine);
                solver.bounds = self.bounds.clone();
                solver.solve(a, b, x)
            }
            SolverKind::Cpg => {
                let mut solver = CpgSolver::new(tol, max_it).with_engine(self.engine);
                solver.bounds = self.bounds.clone();
                solver.solve(a, b, x)
            }
        }
    }
}
