//! Command-line or API options for evaluation and solvers.
//!
//! [`EvalOptions`] decides when the engine splits a dense assignment into
//! blocks for a worker pool. [`SolverOptions`] selects and parameterizes a
//! solver, and can be read from PETSc-style arguments:
//!
//! ```rust,ignore
//! let opts = SolverOptions::from_args(["-solver_type", "pgs", "-tol", "1e-10", "-sweep", "symmetric"])?;
//! ```

use crate::context::solver_context::SolverKind;
use crate::error::LaError;
use crate::solver::pgs::SweepFlags;

/// Parallel evaluation thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalOptions {
    /// Dense destinations with at least this many elements are split into
    /// blocks when the engine has a worker pool.
    pub parallel_threshold: usize,
    /// Number of blocks per split; 0 means one block per worker.
    pub max_blocks: usize,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            parallel_threshold: 65_536,
            max_blocks: 0,
        }
    }
}

/// Solver type & parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    /// Solver to run (pgs, cpg)
    pub kind: SolverKind,
    /// Relative tolerance on the solver's residual measure
    pub tol: f64,
    /// Maximum number of iterations (sweeps for PGS)
    pub max_it: usize,
    /// Relaxation factor ω for PGS
    pub omega: f64,
    /// Sweep direction for PGS
    pub sweep: SweepFlags,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            kind: SolverKind::Pgs,
            tol: 1e-8,
            max_it: 1000,
            omega: 1.0,
            sweep: SweepFlags::FORWARD,
        }
    }
}

fn parse_value<V: std::str::FromStr>(key: &str, value: &str) -> Result<V, LaError> {
    value
        .parse()
        .map_err(|_| LaError::InvalidOption(format!("{key}: cannot parse '{value}'")))
}

impl SolverOptions {
    /// Reads `-key value` pairs over the defaults. Recognized keys are
    /// `-solver_type`, `-tol`, `-max_it`, `-omega` and `-sweep`.
    pub fn from_args<I, S>(args: I) -> Result<Self, LaError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut opts = Self::default();
        let mut it = args.into_iter();
        while let Some(key) = it.next() {
            let key = key.as_ref();
            let value = it
                .next()
                .ok_or_else(|| LaError::InvalidOption(format!("{key}: missing value")))?;
            let value = value.as_ref();
            match key {
                "-solver_type" => {
                    opts.kind = match value {
                        "pgs" => SolverKind::Pgs,
                        "cpg" => SolverKind::Cpg,
                        other => return Err(LaError::InvalidOption(format!("unknown solver type '{other}'"))),
                    }
                }
                "-tol" => {
                    opts.tol = parse_value(key, value)?;
                    if opts.tol.is_nan() || opts.tol < 0.0 {
                        return Err(LaError::InvalidOption(format!("-tol must be nonnegative, got {value}")));
                    }
                }
                "-max_it" => opts.max_it = parse_value(key, value)?,
                "-omega" => {
                    opts.omega = parse_value(key, value)?;
                    if opts.omega.is_nan() || opts.omega <= 0.0 || opts.omega >= 2.0 {
                        return Err(LaError::InvalidOption(format!("-omega must lie in (0, 2), got {value}")));
                    }
                }
                "-sweep" => {
                    opts.sweep = match value {
                        "forward" => SweepFlags::FORWARD,
                        "backward" => SweepFlags::BACKWARD,
                        "symmetric" => SweepFlags::SYMMETRIC,
                        other => return Err(LaError::InvalidOption(format!("unknown sweep '{other}'"))),
                    }
                }
                other => return Err(LaError::InvalidOption(format!("unknown option '{other}'"))),
            }
        }
        Ok(opts)
    }
}
