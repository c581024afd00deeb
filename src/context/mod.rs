//! Solver selection from options.
//!
//! [`SolverContext`] holds a [`SolverOptions`](crate::config::SolverOptions)
//! set, optional bounds and an evaluation engine, and builds the matching
//! solver for each solve:
//!
//! ```rust,ignore
//! let opts = SolverOptions::from_args(["-solver_type", "cpg", "-tol", "1e-10"])?;
//! let ctx = SolverContext::new(opts).with_bounds(Bounds::nonnegative(n));
//! let stats = ctx.solve_context(&a, &b, &mut x)?;
//! ```

pub mod solver_context;
pub use solver_context::{SolverContext, SolverKind};
