//! lazla: lazily evaluated dense/sparse linear algebra with projected solvers
//!
//! Matrix and vector expressions are built as trees and evaluated in a single
//! assignment by an [`Engine`], which chooses between direct, buffered and
//! fused strategies depending on aliasing and storage. Projected Gauss–Seidel
//! and constrained CG solve box-constrained systems on top of the engine.

pub mod parallel;

pub mod config;
pub mod context;
pub mod core;
pub mod error;
pub mod eval;
pub mod expr;
pub mod matrix;
pub mod solver;
pub mod utils;

// Re-exports for convenience
pub use config::*;
pub use context::*;
pub use core::*;
pub use error::*;
pub use eval::{Destination, Engine, Strategy};
pub use expr::{Alias, Expr, IntoExpr, MatExpr, VecExpr};
pub use matrix::*;
pub use parallel::{SerialPool, WorkerPool, Workers};
#[cfg(feature = "rayon")]
pub use parallel::RayonPool;
pub use solver::*;
pub use utils::*;

// Re-export SolveStats at the crate root for convenience
pub use utils::convergence::SolveStats;
