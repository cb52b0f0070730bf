//! Full reduction and its adjoint, broadcasting.
use super::{check_arity, Op, ReductionOp, UnaryOp};
use crate::dtype::Dtype;
use crate::error::{OpError, Result};
use crate::graph::{ExprGraph, Node, NodeId};
use crate::hash::{write_len, write_str};
use crate::shape::Shape;
use crate::tensor::Buffer;
use crate::types::Type;
use crate::value::{Scalar, Typed, Value};

use core::fmt;
use core::hash::Hasher;
use num_traits::{Float, PrimInt};

fn sum_float<T: Float>(xs: &[T]) -> T {
    xs.iter().fold(T::zero(), |acc, x| acc + *x)
}

fn sum_int<T: PrimInt>(xs: &[T]) -> Option<T> {
    xs.iter().try_fold(T::zero(), |acc, x| acc.checked_add(x))
}

fn sum_buffer(op: &str, buf: &Buffer) -> Result<Scalar> {
    let overflow = || OpError::Computation {
        op: op.to_string(),
        reason: "integer overflow".to_string(),
    };
    match buf {
        Buffer::F64(v) => Ok(Scalar::F64(sum_float(v))),
        Buffer::F32(v) => Ok(Scalar::F32(sum_float(v))),
        Buffer::I64(v) => sum_int(v).map(Scalar::I64).ok_or_else(overflow),
        Buffer::I32(v) => sum_int(v).map(Scalar::I32).ok_or_else(overflow),
        Buffer::U8(v) => sum_int(v).map(Scalar::U8).ok_or_else(overflow),
        Buffer::Bool(_) => Err(OpError::TypeMismatch {
            op: op.to_string(),
            expected: "a numeric type".to_string(),
            actual: Dtype::Bool.to_string(),
        }),
    }
}

/// Sum every element of a rank-`dims` tensor into a scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sum {
    dims: usize,
}

impl Sum {
    pub fn new(dims: usize) -> Self {
        Sum { dims }
    }
}

impl Op for Sum {
    fn type_of(&self) -> Type {
        let a = Type::var('a');
        let input = if self.dims == 0 {
            a.clone()
        } else {
            Type::tensor(self.dims, a.clone())
        };
        Type::function(vec![input], a)
    }

    fn infer_shape(&self, _hint: &Type, inputs: &[&Node]) -> Result<Shape> {
        check_arity(self, 1, inputs)?;
        let input = inputs[0].shape();
        if input.dims() != self.dims {
            return Err(OpError::shape(
                self,
                format!("of rank {}", self.dims),
                input.clone(),
            ));
        }
        Ok(Shape::scalar())
    }

    fn diff_wrt(&self, inputs: usize) -> Vec<bool> {
        vec![true; inputs]
    }

    fn sym_diff(
        &self,
        g: &mut ExprGraph,
        inputs: &[NodeId],
        _output: NodeId,
        grad: NodeId,
    ) -> Result<Vec<NodeId>> {
        check_arity(self, 1, inputs)?;
        let shape = g.node(inputs[0])?.shape().clone();
        if shape.is_scalar() {
            return Ok(vec![grad]);
        }
        Ok(vec![g.apply(Broadcast::new(shape), &[grad])?])
    }

    fn do_op(&self, inputs: &[Value]) -> Result<Value> {
        check_arity(self, 1, inputs)?;
        let input = &inputs[0];
        if input.shape().dims() != self.dims {
            return Err(OpError::shape(
                self,
                format!("of rank {}", self.dims),
                input.shape(),
            ));
        }
        let op = self.to_string();
        let sum = input.read_buffer(|b| sum_buffer(&op, b))?;
        if self.dims == 0 {
            // `a → a`: a 0-d tensor sums to a 0-d tensor.
            return input.from_buffer_like(&op, Shape::scalar(), Buffer::from_scalar(sum));
        }
        Ok(Value::Scalar(sum))
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
        write_str(h, "Σ");
        write_len(h, self.dims);
    }

    fn as_unary(&self) -> Option<&dyn UnaryOp> {
        Some(self)
    }

    fn as_reduction(&self) -> Option<&dyn ReductionOp> {
        Some(self)
    }
}

impl UnaryOp for Sum {}

impl ReductionOp for Sum {
    fn reduced_dims(&self) -> usize {
        self.dims
    }
}

impl fmt::Display for Sum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Σ{}", self.dims)
    }
}

/// Fill a tensor of a fixed shape with a scalar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broadcast {
    shape: Shape,
}

impl Broadcast {
    pub fn new(shape: impl Into<Shape>) -> Self {
        Broadcast {
            shape: shape.into(),
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }
}

impl Op for Broadcast {
    fn type_of(&self) -> Type {
        let a = Type::var('a');
        let ret = if self.shape.is_scalar() {
            a.clone()
        } else {
            Type::tensor(self.shape.dims(), a.clone())
        };
        Type::function(vec![a], ret)
    }

    fn infer_shape(&self, _hint: &Type, inputs: &[&Node]) -> Result<Shape> {
        check_arity(self, 1, inputs)?;
        let input = inputs[0].shape();
        if !input.is_scalar() {
            return Err(OpError::shape(self, Shape::scalar(), input.clone()));
        }
        Ok(self.shape.clone())
    }

    fn diff_wrt(&self, inputs: usize) -> Vec<bool> {
        vec![true; inputs]
    }

    fn sym_diff(
        &self,
        g: &mut ExprGraph,
        inputs: &[NodeId],
        _output: NodeId,
        grad: NodeId,
    ) -> Result<Vec<NodeId>> {
        check_arity(self, 1, inputs)?;
        if self.shape.is_scalar() {
            return Ok(vec![grad]);
        }
        Ok(vec![g.apply(Sum::new(self.shape.dims()), &[grad])?])
    }

    fn do_op(&self, inputs: &[Value]) -> Result<Value> {
        check_arity(self, 1, inputs)?;
        let input = &inputs[0];
        let x = input
            .read_buffer(|b| if b.len() == 1 { b.get(0) } else { None })
            .ok_or_else(|| OpError::shape(self, Shape::scalar(), input.shape()))?;
        let buf = Buffer::filled(x, self.shape.size());
        input.from_buffer_like(&self.to_string(), self.shape.clone(), buf)
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
        write_str(h, "broadcast");
        write_len(h, self.shape.dims());
        for d in self.shape.as_slice() {
            write_len(h, *d);
        }
    }

    fn as_unary(&self) -> Option<&dyn UnaryOp> {
        Some(self)
    }
}

impl UnaryOp for Broadcast {}

impl fmt::Display for Broadcast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "broadcast{}", self.shape)
    }
}
