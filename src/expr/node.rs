// Untyped expression tree shared by matrix and vector expressions

use crate::core::classify::{Class, Kind, Scalar, ScalarKind, Shape, Storage};
use crate::core::resolve::{OpKind, resolve, resolve_shape};
use crate::error::LaError;
use crate::matrix::{DenseMatrix, DenseVector, SparseMatrix, SparseVector};

/// Identity, kind and shape of a container standing in for the assignment
/// destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AliasHandle {
    pub(crate) id: usize,
    pub(crate) kind: Kind,
    pub(crate) shape: Shape,
    pub(crate) scalar: ScalarKind,
}

/// Leaf operand. Named containers are borrowed and must outlive the expression.
#[derive(Debug, Clone)]
pub(crate) enum Leaf<'a, T> {
    DenseMatrix(&'a DenseMatrix<T>),
    SparseMatrix(&'a SparseMatrix<T>),
    DenseVector(&'a DenseVector<T>),
    SparseVector(&'a SparseVector<T>),
    Alias(AliasHandle),
}

impl<T: Scalar> Leaf<'_, T> {
    pub(crate) fn kind(&self) -> Kind {
        match self {
            Leaf::DenseMatrix(m) => Kind::new(Class::Matrix, Storage::Dense, m.layout()),
            Leaf::SparseMatrix(m) => Kind::new(Class::Matrix, Storage::Sparse, m.layout()),
            Leaf::DenseVector(v) => Kind::new(Class::Vector, Storage::Dense, v.layout()),
            Leaf::SparseVector(v) => Kind::new(Class::Vector, Storage::Sparse, v.layout()),
            Leaf::Alias(a) => a.kind,
        }
    }

    pub(crate) fn shape(&self) -> Shape {
        match self {
            Leaf::DenseMatrix(m) => m.shape(),
            Leaf::SparseMatrix(m) => m.shape(),
            Leaf::DenseVector(v) => v.shape(),
            Leaf::SparseVector(v) => v.shape(),
            Leaf::Alias(a) => a.shape,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct BinaryNode<'a, T> {
    pub(crate) op: OpKind,
    pub(crate) lhs: Node<'a, T>,
    pub(crate) rhs: Node<'a, T>,
    kind: Kind,
    shape: Shape,
}

#[derive(Debug, Clone)]
pub(crate) struct TransposeNode<'a, T> {
    pub(crate) operand: Node<'a, T>,
    kind: Kind,
    shape: Shape,
}

#[derive(Debug, Clone)]
pub(crate) struct ScaleNode<'a, T> {
    pub(crate) operand: Node<'a, T>,
    pub(crate) factor: T,
    kind: Kind,
    shape: Shape,
}

/// One node of an expression tree. Sub-expressions are owned, leaves borrowed.
/// Kind and shape are resolved when the node is built and never change.
#[derive(Debug, Clone)]
pub(crate) enum Node<'a, T> {
    Leaf(Leaf<'a, T>),
    Binary(Box<BinaryNode<'a, T>>),
    Transpose(Box<TransposeNode<'a, T>>),
    Scale(Box<ScaleNode<'a, T>>),
}

impl<'a, T: Scalar> Node<'a, T> {
    pub(crate) fn kind(&self) -> Kind {
        match self {
            Node::Leaf(l) => l.kind(),
            Node::Binary(b) => b.kind,
            Node::Transpose(t) => t.kind,
            Node::Scale(s) => s.kind,
        }
    }

    pub(crate) fn shape(&self) -> Shape {
        match self {
            Node::Leaf(l) => l.shape(),
            Node::Binary(b) => b.shape,
            Node::Transpose(t) => t.shape,
            Node::Scale(s) => s.shape,
        }
    }

    /// Builds `lhs op rhs`, checking kinds and shapes. Nothing is computed.
    pub(crate) fn binary(op: OpKind, lhs: Node<'a, T>, rhs: Node<'a, T>) -> Result<Self, LaError> {
        let kind = resolve(op, lhs.kind(), Some(rhs.kind()))?;
        let shape = resolve_shape(op, lhs.shape(), Some(rhs.shape()))?;
        Ok(Node::Binary(Box::new(BinaryNode { op, lhs, rhs, kind, shape })))
    }

    pub(crate) fn transpose(operand: Node<'a, T>) -> Self {
        let kind = operand.kind().transposed();
        let shape = operand.shape().transposed();
        Node::Transpose(Box::new(TransposeNode { operand, kind, shape }))
    }

    pub(crate) fn scale(operand: Node<'a, T>, factor: T) -> Self {
        // fold nested scalings into one node
        if let Node::Scale(mut s) = operand {
            s.factor *= factor;
            return Node::Scale(s);
        }
        let kind = operand.kind();
        let shape = operand.shape();
        Node::Scale(Box::new(ScaleNode { operand, factor, kind, shape }))
    }

    /// Number of nodes in the tree.
    pub(crate) fn size(&self) -> usize {
        match self {
            Node::Leaf(_) => 1,
            Node::Binary(b) => 1 + b.lhs.size() + b.rhs.size(),
            Node::Transpose(t) => 1 + t.operand.size(),
            Node::Scale(s) => 1 + s.operand.size(),
        }
    }

    /// Whether any leaf is stored sparsely.
    pub(crate) fn has_sparse_leaf(&self) -> bool {
        match self {
            Node::Leaf(l) => l.kind().is_sparse(),
            Node::Binary(b) => b.lhs.has_sparse_leaf() || b.rhs.has_sparse_leaf(),
            Node::Transpose(t) => t.operand.has_sparse_leaf(),
            Node::Scale(s) => s.operand.has_sparse_leaf(),
        }
    }
}
