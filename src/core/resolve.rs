//! Result-type resolution.
//!
//! [`resolve`] maps an operator and the kinds of its operands to the kind of the
//! materialized result; [`resolve_shape`] does the same for shapes. Both are pure
//! and are evaluated once, when an expression node is built.
//!
//! | operator     | operands              | result                                   |
//! |--------------|-----------------------|------------------------------------------|
//! | add / sub    | dense, dense          | dense, layout of lhs                     |
//! | add / sub    | sparse, sparse        | sparse, layout of lhs                    |
//! | add / sub    | dense, sparse (either)| dense, layout of lhs                     |
//! | mul          | sparse, sparse        | sparse                                   |
//! | mul          | anything with dense   | dense                                    |
//! | scale        | x                     | kind of x                                |
//! | transpose    | x                     | kind of x with flipped layout            |

use crate::core::classify::{Class, Kind, Layout, Shape, Storage};
use crate::error::LaError;

/// Operator tags known to the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Add,
    Sub,
    Mul,
    Scale,
    Transpose,
}

impl OpKind {
    pub fn name(self) -> &'static str {
        match self {
            OpKind::Add => "add",
            OpKind::Sub => "sub",
            OpKind::Mul => "mul",
            OpKind::Scale => "scale",
            OpKind::Transpose => "transpose",
        }
    }

    pub fn is_binary(self) -> bool {
        matches!(self, OpKind::Add | OpKind::Sub | OpKind::Mul)
    }
}

fn denser(lhs: Storage, rhs: Storage) -> Storage {
    if lhs == Storage::Sparse && rhs == Storage::Sparse {
        Storage::Sparse
    } else {
        Storage::Dense
    }
}

/// Kind of `op(lhs, rhs)`. Unary operators ignore `rhs`.
pub fn resolve(op: OpKind, lhs: Kind, rhs: Option<Kind>) -> Result<Kind, LaError> {
    match op {
        OpKind::Scale => Ok(lhs),
        OpKind::Transpose => Ok(lhs.transposed()),
        OpKind::Add | OpKind::Sub => {
            let rhs = binary_rhs(op, rhs)?;
            if lhs.class != rhs.class {
                return Err(LaError::CapabilityMismatch(format!(
                    "cannot {} a {:?} and a {:?}",
                    op.name(),
                    lhs.class,
                    rhs.class
                )));
            }
            if lhs.class == Class::Vector && lhs.layout != rhs.layout {
                return Err(LaError::CapabilityMismatch(format!(
                    "cannot {} a row vector and a column vector",
                    op.name()
                )));
            }
            Ok(Kind::new(lhs.class, denser(lhs.storage, rhs.storage), lhs.layout))
        }
        OpKind::Mul => {
            let rhs = binary_rhs(op, rhs)?;
            let storage = denser(lhs.storage, rhs.storage);
            match (lhs.class, rhs.class) {
                (Class::Matrix, Class::Matrix) => Ok(Kind::new(Class::Matrix, storage, lhs.layout)),
                (Class::Matrix, Class::Vector) => {
                    if rhs.layout != Layout::COLUMN_VECTOR {
                        return Err(LaError::CapabilityMismatch(
                            "matrix times row vector; transpose the vector first".into(),
                        ));
                    }
                    Ok(Kind::new(Class::Vector, storage, Layout::COLUMN_VECTOR))
                }
                (Class::Vector, Class::Matrix) => {
                    if lhs.layout != Layout::ROW_VECTOR {
                        return Err(LaError::CapabilityMismatch(
                            "column vector times matrix; transpose the vector first".into(),
                        ));
                    }
                    Ok(Kind::new(Class::Vector, storage, Layout::ROW_VECTOR))
                }
                // outer (column x row) or 1x1 inner (row x column) product
                (Class::Vector, Class::Vector) => Ok(Kind::new(Class::Matrix, storage, Layout::RowMajor)),
            }
        }
    }
}

fn binary_rhs(op: OpKind, rhs: Option<Kind>) -> Result<Kind, LaError> {
    rhs.ok_or_else(|| LaError::CapabilityMismatch(format!("{} needs two operands", op.name())))
}

/// Shape of `op(lhs, rhs)`; no broadcasting.
pub fn resolve_shape(op: OpKind, lhs: Shape, rhs: Option<Shape>) -> Result<Shape, LaError> {
    match op {
        OpKind::Scale => Ok(lhs),
        OpKind::Transpose => Ok(lhs.transposed()),
        OpKind::Add | OpKind::Sub => {
            let rhs = rhs.ok_or_else(|| LaError::CapabilityMismatch(format!("{} needs two operands", op.name())))?;
            if lhs != rhs {
                return Err(LaError::shape(op.name(), lhs, rhs));
            }
            Ok(lhs)
        }
        OpKind::Mul => {
            let rhs = rhs.ok_or_else(|| LaError::CapabilityMismatch("mul needs two operands".into()))?;
            if lhs.cols != rhs.rows {
                return Err(LaError::shape(op.name(), lhs, rhs));
            }
            Ok(Shape::new(lhs.rows, rhs.cols))
        }
    }
}
