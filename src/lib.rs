//! # opgraph
//!
//! The operator contract of a symbolic tensor-computation graph.
//!
//! Every operation in a graph (addition, reductions, constants, ...) implements [`Op`](op::Op).
//! The contract is what lets a graph of operations be
//!
//! * type-checked and shape-inferred as it is built ([`Op::type_of`](op::Op::type_of),
//!   [`Op::infer_shape`](op::Op::infer_shape)),
//! * differentiated symbolically in reverse mode ([`Op::diff_wrt`](op::Op::diff_wrt),
//!   [`Op::sym_diff`](op::Op::sym_diff)),
//! * executed, optionally in place ([`Op::do_op`](op::Op::do_op) and the
//!   [`IncrDoer`](op::IncrDoer), [`UsePreallocDoer`](op::UsePreallocDoer) and
//!   [`UnsafeDoer`](op::UnsafeDoer) capabilities),
//! * deduplicated by a structural hash ([`Op::hashcode`](op::Op::hashcode)).
//!
//! # Example
//!
//! Build `a + b` from two constants, evaluate it, and differentiate it.
//!
//! ```rust
//! use opgraph::prelude::*;
//!
//! let mut g = ExprGraph::new();
//! let a = g.constant(3.0f64)?;
//! let b = g.constant(4.0f64)?;
//! let c = g.apply(Add, &[a, b])?;
//!
//! // Types and shapes are resolved when the node is built
//! assert_eq!(g.node(c)?.type_of(), &Type::from(Dtype::Float64));
//! assert!(g.node(c)?.shape().is_scalar());
//!
//! assert_eq!(evaluate(&mut g, c)?, Value::from(7.0f64));
//!
//! // d(a + b)/da = d(a + b)/db = 1: both gradients are the seed itself
//! let grads = grad(&mut g, c, &[a, b])?;
//! assert_eq!(grads[0], grads[1]);
//! assert_eq!(evaluate(&mut g, grads[0])?, Value::from(1.0f64));
//! # Ok::<(), OpError>(())
//! ```
//!
//! # Aliasing
//!
//! A [`Tensor`](tensor::Tensor) is a handle: clones share storage. Ops report whether their
//! result may share storage with their inputs through [`Op::returns_ptr`](op::Op::returns_ptr),
//! and which input an in-place variant overwrites through
//! [`Op::overwrite_input`](op::Op::overwrite_input). Scheduling execution so that no live value
//! is overwritten is the caller's responsibility.

pub mod dtype;
pub mod error;
pub mod hash;
pub mod shape;
pub mod tensor;
pub mod types;
pub mod value;

pub mod op;

pub mod graph;

pub mod prelude {
    //! The types needed to build, evaluate and differentiate graphs.
    pub use crate::dtype::Dtype;
    pub use crate::error::{OpError, Result};
    pub use crate::graph::*;
    pub use crate::op::*;
    pub use crate::shape::Shape;
    pub use crate::tensor::{Buffer, Element, Tensor};
    pub use crate::types::{Type, TypeVar};
    pub use crate::value::{Scalar, Typed, Value};
}
