// Alias analysis and lowering of an expression tree into a flat sum of terms.
//
// A lowered plan is `alias_coeff * dest + sum_k coeff_k * body_k`, where every
// body is a single operand or a product of two operands. Transposes are pushed
// onto the operands, scalings into the coefficients, and non-leaf product
// factors are evaluated into owned temporaries first.

use crate::core::classify::{Layout, Scalar};
use crate::core::resolve::OpKind;
use crate::error::LaError;
use crate::expr::node::{AliasHandle, Leaf, Node};
use crate::matrix::sparse::transpose_compressed;
use crate::matrix::{DenseMatrix, SparseMatrix};

use super::Engine;
use super::kernels::{Resolved, ResolvedTerm};
use super::view::{SparseView, View};

/// How the destination itself appears in an expression assigned to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum AliasUse {
    None,
    /// Only under sums and scalings, at its own position.
    InPlace,
    /// Under a product or transposed; elements would be read after being written.
    Hazard,
}

/// Finds every alias leaf and classifies its use. A handle that does not
/// describe `dest` (another container, or `dest` after a resize) is an error.
pub(crate) fn alias_use<T: Scalar>(node: &Node<'_, T>, dest: &AliasHandle) -> Result<AliasUse, LaError> {
    let mut found = AliasUse::None;
    scan(node, dest, false, false, &mut found)?;
    Ok(found)
}

fn scan<T: Scalar>(
    node: &Node<'_, T>,
    dest: &AliasHandle,
    in_product: bool,
    transposed: bool,
    found: &mut AliasUse,
) -> Result<(), LaError> {
    match node {
        Node::Leaf(Leaf::Alias(handle)) => {
            if handle != dest {
                return Err(LaError::AliasMismatch);
            }
            let usage = if in_product || transposed {
                AliasUse::Hazard
            } else {
                AliasUse::InPlace
            };
            *found = (*found).max(usage);
            Ok(())
        }
        Node::Leaf(_) => Ok(()),
        Node::Binary(b) => {
            let in_product = in_product || b.op == OpKind::Mul;
            scan(&b.lhs, dest, in_product, transposed, found)?;
            scan(&b.rhs, dest, in_product, transposed, found)
        }
        Node::Transpose(t) => scan(&t.operand, dest, in_product, !transposed, found),
        Node::Scale(s) => scan(&s.operand, dest, in_product, transposed, found),
    }
}

#[derive(Debug)]
pub(crate) enum Source<'a, T> {
    Leaf(Leaf<'a, T>),
    Temp(usize),
}

#[derive(Debug)]
pub(crate) struct Operand<'a, T> {
    source: Source<'a, T>,
    transposed: bool,
}

#[derive(Debug)]
enum Body<'a, T> {
    Single(Operand<'a, T>),
    Product(Operand<'a, T>, Operand<'a, T>),
}

#[derive(Debug)]
struct Term<'a, T> {
    coeff: T,
    body: Body<'a, T>,
}

/// Owned intermediate result. Vectors are stored as n x 1 or 1 x n matrices.
#[derive(Debug)]
pub(crate) enum Temp<T> {
    Dense(DenseMatrix<T>),
    Sparse(SparseMatrix<T>),
}

#[derive(Debug)]
pub(crate) struct Plan<'a, T> {
    terms: Vec<Term<'a, T>>,
    temps: Vec<Temp<T>>,
    pub(crate) alias_coeff: Option<T>,
}

impl<'a, T: Scalar> Plan<'a, T> {
    /// Number of lowered terms.
    pub(crate) fn len(&self) -> usize {
        self.terms.len()
    }

    /// View of one operand; alias leaves read `snapshot`.
    pub(crate) fn view<'s>(&'s self, op: &'s Operand<'a, T>, snapshot: Option<View<'s, T>>) -> Result<View<'s, T>, LaError> {
        operand_view(op, &self.temps, snapshot)
    }

    pub(crate) fn resolve<'s>(&'s self, snapshot: Option<View<'s, T>>) -> Result<Vec<ResolvedTerm<'s, T>>, LaError> {
        self.terms
            .iter()
            .map(|term| {
                let body = match &term.body {
                    Body::Single(op) => Resolved::Single(self.view(op, snapshot)?),
                    Body::Product(l, r) => Resolved::Product(self.view(l, snapshot)?, self.view(r, snapshot)?),
                };
                Ok(ResolvedTerm { coeff: term.coeff, body })
            })
            .collect()
    }
}

fn operand_view<'s, T: Scalar>(
    op: &'s Operand<'_, T>,
    temps: &'s [Temp<T>],
    snapshot: Option<View<'s, T>>,
) -> Result<View<'s, T>, LaError> {
    let view = match &op.source {
        Source::Leaf(leaf) => match leaf.view() {
            Some(v) => v,
            None => snapshot.ok_or(LaError::AliasMismatch)?,
        },
        Source::Temp(k) => match &temps[*k] {
            Temp::Dense(m) => View::of_dense_matrix(m),
            Temp::Sparse(m) => View::of_sparse_matrix(m),
        },
    };
    Ok(if op.transposed { view.transpose() } else { view })
}

/// Row-major copy of a compressed view, reindexed physically.
fn row_major_copy<T: Scalar>(s: &SparseView<'_, T>) -> SparseMatrix<T> {
    let ptr = s.ptr_vec();
    let (idx, vals) = s.arrays();
    let (tptr, tidx, tvals) = transpose_compressed(s.minor_len(), &ptr, idx, vals);
    let mut m = SparseMatrix::new(s.rows(), s.cols(), Layout::RowMajor);
    m.install(s.rows(), s.cols(), tptr, tidx, tvals);
    m
}

pub(crate) struct Lowering<'e, 'p, 'a, 's, T> {
    engine: &'e Engine<'p>,
    snapshot: Option<View<'s, T>>,
    row_major_singles: bool,
    alias_in_place: bool,
    plan: Plan<'a, T>,
}

impl<'e, 'p, 'a, 's, T: Scalar> Lowering<'e, 'p, 'a, 's, T> {
    /// `row_major_singles` makes every sparse operand row-major, as needed when
    /// the result is produced row by row. With `alias_in_place`, alias leaves
    /// are folded into [`Plan::alias_coeff`] instead of being read.
    pub(crate) fn new(
        engine: &'e Engine<'p>,
        snapshot: Option<View<'s, T>>,
        row_major_singles: bool,
        alias_in_place: bool,
    ) -> Self {
        Self {
            engine,
            snapshot,
            row_major_singles,
            alias_in_place,
            plan: Plan {
                terms: Vec::new(),
                temps: Vec::new(),
                alias_coeff: None,
            },
        }
    }

    /// Lowers `node` (or its transpose) and returns the finished plan.
    pub(crate) fn run(mut self, node: Node<'a, T>, transposed: bool) -> Result<Plan<'a, T>, LaError> {
        self.lower(node, T::one(), transposed)?;
        Ok(self.plan)
    }

    pub(crate) fn finish(self) -> Plan<'a, T> {
        self.plan
    }

    fn lower(&mut self, node: Node<'a, T>, coeff: T, transposed: bool) -> Result<(), LaError> {
        match node {
            Node::Leaf(Leaf::Alias(_)) if self.alias_in_place => {
                *self.plan.alias_coeff.get_or_insert(T::zero()) += coeff;
                Ok(())
            }
            Node::Leaf(leaf) => {
                let op = Operand {
                    source: Source::Leaf(leaf),
                    transposed,
                };
                let op = if self.row_major_singles { self.row_major(op)? } else { op };
                self.plan.terms.push(Term {
                    coeff,
                    body: Body::Single(op),
                });
                Ok(())
            }
            Node::Scale(s) => {
                let s = *s;
                self.lower(s.operand, coeff * s.factor, transposed)
            }
            Node::Transpose(t) => {
                let t = *t;
                self.lower(t.operand, coeff, !transposed)
            }
            Node::Binary(b) => {
                let b = *b;
                match b.op {
                    OpKind::Add => {
                        self.lower(b.lhs, coeff, transposed)?;
                        self.lower(b.rhs, coeff, transposed)
                    }
                    OpKind::Sub => {
                        self.lower(b.lhs, coeff, transposed)?;
                        self.lower(b.rhs, -coeff, transposed)
                    }
                    OpKind::Mul => {
                        // (A B)^T = B^T A^T
                        let (first, second) = if transposed { (b.rhs, b.lhs) } else { (b.lhs, b.rhs) };
                        let (l, fl) = self.operand(first, transposed)?;
                        let (r, fr) = self.operand(second, transposed)?;
                        let l = self.row_major(l)?;
                        let r = self.row_major(r)?;
                        self.plan.terms.push(Term {
                            coeff: coeff * fl * fr,
                            body: Body::Product(l, r),
                        });
                        Ok(())
                    }
                    op => Err(LaError::CapabilityMismatch(format!("{} is not a binary operator", op.name()))),
                }
            }
        }
    }

    /// Reduces a product factor to a leaf or temporary plus a scalar factor.
    pub(crate) fn operand(&mut self, node: Node<'a, T>, transposed: bool) -> Result<(Operand<'a, T>, T), LaError> {
        match node {
            Node::Leaf(leaf) => Ok((
                Operand {
                    source: Source::Leaf(leaf),
                    transposed,
                },
                T::one(),
            )),
            Node::Transpose(t) => {
                let t = *t;
                self.operand(t.operand, !transposed)
            }
            Node::Scale(s) => {
                let s = *s;
                let (op, f) = self.operand(s.operand, transposed)?;
                Ok((op, f * s.factor))
            }
            other => {
                let temp = self.engine.materialize(other, self.snapshot)?;
                Ok((self.push_temp(temp, transposed), T::one()))
            }
        }
    }

    fn push_temp(&mut self, temp: Temp<T>, transposed: bool) -> Operand<'a, T> {
        self.plan.temps.push(temp);
        Operand {
            source: Source::Temp(self.plan.temps.len() - 1),
            transposed,
        }
    }

    /// Replaces a column-major sparse operand by a row-major copy.
    fn row_major(&mut self, op: Operand<'a, T>) -> Result<Operand<'a, T>, LaError> {
        let copy = match operand_view(&op, &self.plan.temps, self.snapshot)? {
            View::Sparse(s) if s.layout() == Layout::ColumnMajor => Some(row_major_copy(&s)),
            _ => None,
        };
        Ok(match copy {
            Some(m) => self.push_temp(Temp::Sparse(m), false),
            None => op,
        })
    }
}
