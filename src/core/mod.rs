//! Classification, result-type resolution, and the traits solvers are written against.

pub mod classify;
pub mod resolve;
pub mod traits;
pub mod wrappers;

pub use classify::{Class, Classify, ExprClass, Kind, Layout, MatrixClass, Scalar, ScalarKind, Shape, Storage, VectorClass};
pub use resolve::{OpKind, resolve, resolve_shape};
pub use traits::{Indexing, InnerProduct, SystemMatrix};
