//! Constant leaf operators.
//!
//! A constant is an op with no inputs that produces a fixed literal. These are the ops every
//! other op composes with, and the way literals enter a graph.
use super::{check_arity, Constant, Op};
use crate::error::Result;
use crate::graph::{ExprGraph, Node, NodeId};
use crate::hash::write_str;
use crate::shape::Shape;
use crate::tensor::Tensor;
use crate::types::Type;
use crate::value::{Scalar, Typed, Value};

use core::fmt;
use core::hash::Hasher;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantScalar {
    v: Scalar,
}

impl ConstantScalar {
    pub fn new(v: impl Into<Scalar>) -> Self {
        ConstantScalar { v: v.into() }
    }
}

impl Op for ConstantScalar {
    fn type_of(&self) -> Type {
        self.v.type_of()
    }

    fn infer_shape(&self, _hint: &Type, _inputs: &[&Node]) -> Result<Shape> {
        Ok(Shape::scalar())
    }

    fn diff_wrt(&self, _inputs: usize) -> Vec<bool> {
        vec![]
    }

    fn sym_diff(&self, _: &mut ExprGraph, _: &[NodeId], _: NodeId, _: NodeId) -> Result<Vec<NodeId>> {
        Ok(vec![])
    }

    /// Returns a copy of the literal. Supplying any input is an error.
    fn do_op(&self, inputs: &[Value]) -> Result<Value> {
        check_arity(self, 0, inputs)?;
        Ok(Value::Scalar(self.v))
    }

    fn returns_ptr(&self) -> bool {
        false
    }

    fn calls_extern(&self) -> bool {
        false
    }

    fn overwrite_input(&self) -> Option<usize> {
        None
    }

    fn write_hash(&self, h: &mut dyn Hasher) {
        write_str(h, "const ");
        h.write(&[self.v.dtype().tag()]);
        write_str(h, "of ");
        self.v.write_bits(h);
    }

    fn as_constant(&self) -> Option<&dyn Constant> {
        Some(self)
    }
}

impl Constant for ConstantScalar {
    fn value(&self) -> Value {
        Value::Scalar(self.v)
    }
}

impl fmt::Display for ConstantScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "const {}", self.v)
    }
}

/// A constant tensor.
///
/// Copying a large tensor on every read is too costly, so [`Op::do_op`] hands out a handle
/// sharing the wrapped storage and [`Op::returns_ptr`] is true. Callers must treat that value as
/// read-only. [`ConstantTensor::value_ref`] is the borrow-checked way to read it.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantTensor {
    v: Tensor,
}

impl ConstantTensor {
    pub fn new(v: Tensor) -> Self {
        ConstantTensor { v }
    }

    pub fn value_ref(&self) -> &Tensor {
        &self.v
    }
}

impl Op for ConstantTensor {
    fn type_of(&self) -> Type {
        self.v.type_of()
    }

    fn infer_shape(&self, _hint: &Type, _inputs: &[&Node]) -> Result<Shape> {
        Ok(self.v.shape().clone())
    }

    fn diff_wrt(&self, _inputs: usize) -> Vec<bool> {
        vec![]
    }

    fn sym_diff(&self, _: &mut ExprGraph, _: &[NodeId], _: NodeId, _: NodeId) -> Result<Vec<NodeId>> {
        Ok(vec![])
    }

    fn do_op(&self, inputs: &[Value]) -> Result<Value> {
        check_arity(self, 0, inputs)?;
        Ok(Value::Tensor(self.v.clone()))
    }

    fn returns_ptr(&self) -> bool {
        true
    }

    fn calls_extern(&self) -> bool {
        false
    }

    fn overwrite_input(&self) -> Option<usize> {
        None
    }

    fn write_hash(&self, h: &mut dyn Hasher) {
        write_str(h, &format!("const {}", self.type_of()));
        self.v.write_hash(h);
    }

    fn as_constant(&self) -> Option<&dyn Constant> {
        Some(self)
    }
}

impl Constant for ConstantTensor {
    fn value(&self) -> Value {
        Value::Tensor(self.v.clone())
    }
}

impl fmt::Display for ConstantTensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "const {}", self.type_of())
    }
}

/// The constant op producing `v`.
pub fn constant(v: impl Into<Value>) -> Arc<dyn Op> {
    match v.into() {
        Value::Scalar(s) => Arc::new(ConstantScalar::new(s)),
        Value::Tensor(t) => Arc::new(ConstantTensor::new(t)),
    }
}
