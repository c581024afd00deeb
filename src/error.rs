use thiserror::Error;

use crate::core::classify::Shape;

// Unified error type for lazla

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LaError {
    #[error("shape mismatch in {op}: {lhs} vs {rhs}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Shape,
        rhs: Shape,
    },
    #[error("capability mismatch: {0}")]
    CapabilityMismatch(String),
    #[error("alias handle does not refer to the assignment destination")]
    AliasMismatch,
    #[error("invalid sparse structure: {0}")]
    InvalidStructure(String),
    #[error("index ({row}, {col}) out of bounds for {rows}x{cols}")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
    #[error("invalid bounds: {0}")]
    InvalidBounds(String),
    #[error("zero pivot at row {0}")]
    ZeroPivot(usize),
    #[error("indefinite matrix detected (p^T A p <= 0)")]
    IndefiniteMatrix,
    #[error("invalid option: {0}")]
    InvalidOption(String),
    #[error("worker pool error: {0}")]
    Pool(String),
}

impl LaError {
    pub(crate) fn shape(op: &'static str, lhs: Shape, rhs: Shape) -> Self {
        LaError::ShapeMismatch { op, lhs, rhs }
    }
}
