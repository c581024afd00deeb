//! Lazily evaluated matrix and vector expressions.
//!
//! Applying an operator builds an [`Expr`] node; nothing is computed until the
//! expression is handed to [`Engine::assign`](crate::eval::Engine::assign) or
//! materialized with `eval`. Named containers enter an expression by reference,
//! sub-expressions by value:
//!
//! ```rust,ignore
//! let a = SparseMatrix::identity(3);
//! let x = DenseVector::from_vec(vec![1.0, 2.0, 3.0]);
//! let b = DenseVector::from_vec(vec![1.0, 1.0, 1.0]);
//! // r = b - A x
//! let r = b.expr().sub(a.expr().mul(&x)?)?.eval()?;
//! ```
//!
//! Vector/matrix compatibility is checked by the type system; dense/sparse and
//! layout are resolved per node by [`resolve`](crate::core::resolve::resolve), and
//! shapes are checked when the node is built.

pub(crate) mod node;

use std::marker::PhantomData;

use crate::core::classify::{
    Classify, ExprClass, Kind, MatrixClass, ProductClass, Scalar, Shape, Storage, VectorClass,
};
use crate::core::resolve::OpKind;
use crate::error::LaError;
use crate::eval::Engine;
use crate::matrix::{DenseMatrix, DenseVector, Matrix, SparseMatrix, SparseVector, Vector};
use node::{AliasHandle, Leaf, Node};

/// An unevaluated computation of class `C` (matrix or vector).
#[derive(Debug, Clone)]
pub struct Expr<'a, T, C> {
    node: Node<'a, T>,
    _class: PhantomData<C>,
}

pub type MatExpr<'a, T> = Expr<'a, T, MatrixClass>;
pub type VecExpr<'a, T> = Expr<'a, T, VectorClass>;

/// Anything that can enter an expression: containers by reference, expressions,
/// and alias handles.
pub trait IntoExpr<'a, T: Scalar> {
    type Class: ExprClass;
    fn into_expr(self) -> Expr<'a, T, Self::Class>;
}

/// Stand-in for the current contents of a container inside an expression that is
/// assigned back into that same container, e.g. `x = A * x`.
///
/// The handle records the container's address; it is only valid as long as the
/// container is not moved, and only inside an assignment whose destination is
/// that container.
#[derive(Debug, Clone, Copy)]
pub struct Alias<C> {
    handle: AliasHandle,
    _class: PhantomData<C>,
}

impl<C> Alias<C> {
    pub fn kind(&self) -> Kind {
        self.handle.kind
    }

    pub fn shape(&self) -> Shape {
        self.handle.shape
    }
}

impl<C: ExprClass> Alias<C> {
    /// `factor * dest`.
    pub fn scale<'a, T: Scalar>(self, factor: T) -> Expr<'a, T, C> {
        Expr::wrap(Node::scale(Node::Leaf(Leaf::Alias(self.handle)), factor))
    }
}

fn alias_of<C, D: Classify>(container: &D) -> Alias<C> {
    Alias {
        handle: AliasHandle {
            id: container as *const D as usize,
            kind: container.kind(),
            shape: container.shape(),
            scalar: container.scalar_kind(),
        },
        _class: PhantomData,
    }
}

pub(crate) fn container_id<D>(container: &D) -> usize {
    container as *const D as usize
}

impl<'a, T: Scalar, C: ExprClass> Expr<'a, T, C> {
    fn wrap(node: Node<'a, T>) -> Self {
        Self {
            node,
            _class: PhantomData,
        }
    }

    pub(crate) fn node(&self) -> &Node<'a, T> {
        &self.node
    }

    pub(crate) fn into_node(self) -> Node<'a, T> {
        self.node
    }

    pub fn kind(&self) -> Kind {
        self.node.kind()
    }

    pub fn shape(&self) -> Shape {
        self.node.shape()
    }

    pub fn storage(&self) -> Storage {
        self.node.kind().storage
    }

    /// `self + rhs`.
    #[allow(clippy::should_implement_trait)]
    pub fn add<R>(self, rhs: R) -> Result<Self, LaError>
    where
        R: IntoExpr<'a, T, Class = C>,
    {
        Node::binary(OpKind::Add, self.node, rhs.into_expr().node).map(Self::wrap)
    }

    /// `self - rhs`.
    #[allow(clippy::should_implement_trait)]
    pub fn sub<R>(self, rhs: R) -> Result<Self, LaError>
    where
        R: IntoExpr<'a, T, Class = C>,
    {
        Node::binary(OpKind::Sub, self.node, rhs.into_expr().node).map(Self::wrap)
    }

    /// `self * rhs`; the class of the result follows [`ProductClass`].
    #[allow(clippy::should_implement_trait)]
    pub fn mul<R>(self, rhs: R) -> Result<Expr<'a, T, <C as ProductClass<R::Class>>::Output>, LaError>
    where
        R: IntoExpr<'a, T>,
        C: ProductClass<R::Class>,
    {
        Node::binary(OpKind::Mul, self.node, rhs.into_expr().node).map(Expr::wrap)
    }

    /// `factor * self`. Scaling keeps the sparsity pattern, including for a zero factor.
    pub fn scale(self, factor: T) -> Self {
        Self::wrap(Node::scale(self.node, factor))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn neg(self) -> Self {
        self.scale(-T::one())
    }

    pub fn transpose(self) -> Self {
        Self::wrap(Node::transpose(self.node))
    }
}

impl<'a, T: Scalar> MatExpr<'a, T> {
    /// Materializes into a fresh matrix of the resolved kind.
    pub fn eval(self) -> Result<Matrix<T>, LaError> {
        Engine::serial().eval_matrix(self)
    }
}

impl<'a, T: Scalar> VecExpr<'a, T> {
    /// Materializes into a fresh vector of the resolved kind.
    pub fn eval(self) -> Result<Vector<T>, LaError> {
        Engine::serial().eval_vector(self)
    }

    /// Inner product, ignoring orientation.
    pub fn dot<R>(self, rhs: R) -> Result<T, LaError>
    where
        R: IntoExpr<'a, T, Class = VectorClass>,
    {
        Engine::serial().dot(self, rhs)
    }
}

impl<'a, T: Scalar, C: ExprClass> IntoExpr<'a, T> for Expr<'a, T, C> {
    type Class = C;
    fn into_expr(self) -> Expr<'a, T, C> {
        self
    }
}

impl<'a, T: Scalar, C: ExprClass> IntoExpr<'a, T> for Alias<C> {
    type Class = C;
    fn into_expr(self) -> Expr<'a, T, C> {
        Expr::wrap(Node::Leaf(Leaf::Alias(self.handle)))
    }
}

impl<'a, T: Scalar, C: ExprClass> Classify for Expr<'a, T, C> {
    type Class = C;
    type Elem = T;
    const STORAGE: Option<Storage> = None;
    const IS_EXPRESSION: bool = true;

    fn kind(&self) -> Kind {
        self.node.kind()
    }

    fn shape(&self) -> Shape {
        self.node.shape()
    }
}

macro_rules! leaf_operand {
    ($container:ident, $variant:ident, $class:ty) => {
        impl<'a, T: Scalar> IntoExpr<'a, T> for &'a $container<T> {
            type Class = $class;
            fn into_expr(self) -> Expr<'a, T, $class> {
                Expr::wrap(Node::Leaf(Leaf::$variant(self)))
            }
        }

        impl<T: Scalar> $container<T> {
            /// Borrowing leaf expression over this container.
            pub fn expr(&self) -> Expr<'_, T, $class> {
                self.into_expr()
            }

            /// Handle standing for this container when it is also the assignment destination.
            pub fn alias(&self) -> Alias<$class> {
                alias_of(self)
            }
        }
    };
}

leaf_operand!(DenseMatrix, DenseMatrix, MatrixClass);
leaf_operand!(SparseMatrix, SparseMatrix, MatrixClass);
leaf_operand!(DenseVector, DenseVector, VectorClass);
leaf_operand!(SparseVector, SparseVector, VectorClass);
