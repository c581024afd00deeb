//! Options for the evaluation engine and the solvers.

pub mod options;
pub use options::{EvalOptions, SolverOptions};
