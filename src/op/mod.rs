//! The operator contract.
//!
//! An [`Op`] is a symbolic representation of an operation: think of it as a function taking some
//! inputs and producing an output. Every op has a type signature, for example
//!
//! ```text
//! Add :: a → a → a
//! ```
//!
//! and answers four families of questions using only its own construction-time parameters:
//!
//! 1. graph building: [`Op::type_of`] and [`Op::infer_shape`]
//! 2. differentiation: [`Op::diff_wrt`] and [`Op::sym_diff`]
//! 3. execution: [`Op::do_op`]
//! 4. analysis: [`Op::returns_ptr`], [`Op::calls_extern`], [`Op::overwrite_input`] and the
//!    structural hash ([`Op::write_hash`], [`Op::hashcode`])
//!
//! Optional capabilities (fixed arity, accumulate-in-place, and so on) are separate traits. An op
//! advertises one by overriding the matching `as_*` accessor to return `Some(self)`.
pub mod arith;
pub mod constant;
pub mod identity;
pub mod reduce;

pub use arith::*;
pub use constant::*;
pub use identity::*;
pub use reduce::*;

use crate::error::{OpError, Result};
use crate::graph::{ExprGraph, Node, NodeId};
use crate::hash::Fnv32a;
use crate::shape::Shape;
use crate::types::Type;
use crate::value::Value;

use core::fmt::{Debug, Display};
use core::hash::Hasher;

pub trait Op: Debug + Display + Send + Sync {
    /// The type of the op (not of the node). The graph builder unifies it with the input types
    /// to find the type of a node.
    fn type_of(&self) -> Type;

    /// The output shape as a function of the input nodes' types and shapes.
    ///
    /// # Errors
    ///
    /// [`OpError::ShapeMismatch`] if the input shapes are incompatible.
    fn infer_shape(&self, hint: &Type, inputs: &[&Node]) -> Result<Shape>;

    /// Which of `inputs` inputs the op is differentiable with respect to.
    fn diff_wrt(&self, inputs: usize) -> Vec<bool>;

    /// One reverse-mode chain-rule step.
    ///
    /// Given the forward `inputs`, the forward `output` and the upstream gradient `grad`, add
    /// the gradient sub-graphs to `g` and return one node per *differentiable* input, in input
    /// order.
    fn sym_diff(
        &self,
        g: &mut ExprGraph,
        inputs: &[NodeId],
        output: NodeId,
        grad: NodeId,
    ) -> Result<Vec<NodeId>>;

    /// Execute the op.
    ///
    /// If [`Op::returns_ptr`] is false the result is always freshly allocated.
    fn do_op(&self, inputs: &[Value]) -> Result<Value>;

    /// True if the result of [`Op::do_op`] may share storage with an input (or with the op).
    fn returns_ptr(&self) -> bool;

    /// True if execution crosses into a native or accelerated kernel. A cost hint only.
    fn calls_extern(&self) -> bool;

    /// The input whose storage [`UnsafeDoer::unsafe_do`] overwrites, if any.
    ///
    /// The scheduler must make sure no other live reference to that input exists before running
    /// the op in overwrite mode.
    fn overwrite_input(&self) -> Option<usize>;

    /// Write a canonical encoding of the op's identity: a kind tag and every parameter that
    /// affects the output.
    fn write_hash(&self, h: &mut dyn Hasher);

    fn hashcode(&self) -> u32 {
        let mut h = Fnv32a::new();
        self.write_hash(&mut h);
        h.sum32()
    }

    fn as_unary(&self) -> Option<&dyn UnaryOp> {
        None
    }

    fn as_binary(&self) -> Option<&dyn BinaryOp> {
        None
    }

    fn as_no_ret(&self) -> Option<&dyn NoRetOp> {
        None
    }

    fn as_ad_op(&self) -> Option<&dyn AdOp> {
        None
    }

    fn as_reduction(&self) -> Option<&dyn ReductionOp> {
        None
    }

    fn as_incr_doer(&self) -> Option<&dyn IncrDoer> {
        None
    }

    fn as_prealloc_doer(&self) -> Option<&dyn UsePreallocDoer> {
        None
    }

    fn as_unsafe_doer(&self) -> Option<&dyn UnsafeDoer> {
        None
    }

    fn as_constant(&self) -> Option<&dyn Constant> {
        None
    }
}

/// An op taking exactly one input.
pub trait UnaryOp: Op {}

/// An op taking exactly two inputs.
pub trait BinaryOp: Op {}

/// An op run for its side effect only. Its output must not feed other ops.
pub trait NoRetOp: Op {}

/// An op that changes the rank of its input.
pub trait ReductionOp: Op {
    /// The rank of the input being reduced.
    fn reduced_dims(&self) -> usize;
}

/// An op that differentiates itself at execution time instead of emitting a gradient graph.
pub trait AdOp: Op {
    /// Propagate the gradient bound to `output` into the gradients of `inputs`.
    ///
    /// # Errors
    ///
    /// [`OpError::GradientAbsent`] if `output` has no gradient bound.
    fn do_diff(&self, g: &mut ExprGraph, inputs: &[NodeId], output: NodeId) -> Result<()>;
}

/// Accumulate the result into an existing value.
pub trait IncrDoer {
    fn incr_do(&self, incr: &mut Value, inputs: &[Value]) -> Result<()>;
}

/// Write the result into a caller-provided buffer.
pub trait UsePreallocDoer {
    fn use_prealloc_do(&self, prealloc: Value, inputs: &[Value]) -> Result<Value>;
}

/// Write the result over the storage of input [`Op::overwrite_input`].
///
/// Only fails on arity or type mismatch: checking that the overwrite is safe is the caller's job.
pub trait UnsafeDoer {
    fn unsafe_do(&self, inputs: Vec<Value>) -> Result<Value>;
}

/// A zero-input op wrapping a literal.
pub trait Constant: Op {
    fn value(&self) -> Value;
}

/// Fail with [`OpError::ArityMismatch`] unless exactly `n` inputs were supplied.
pub(crate) fn check_arity<T>(op: &dyn Op, n: usize, inputs: &[T]) -> Result<()> {
    if inputs.len() == n {
        Ok(())
    } else {
        Err(OpError::arity(op, n, inputs.len()))
    }
}
