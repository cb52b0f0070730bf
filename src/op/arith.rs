//! Elementwise arithmetic.
use super::{check_arity, AdOp, BinaryOp, IncrDoer, NoRetOp, Op, UnaryOp, UnsafeDoer, UsePreallocDoer};
use crate::dtype::Dtype;
use crate::error::{OpError, Result};
use crate::graph::{ExprGraph, Node, NodeId};
use crate::hash::write_str;
use crate::shape::Shape;
use crate::tensor::{Buffer, Tensor};
use crate::types::Type;
use crate::value::{Typed, Value};

use core::fmt;
use core::hash::Hasher;
use num_traits::{CheckedNeg, Float, PrimInt};

////////////////////////////////////////////////////////////////////////////////
// Kernels

fn overflow(op: &str) -> OpError {
    OpError::Computation {
        op: op.to_string(),
        reason: "integer overflow".to_string(),
    }
}

fn not_numeric(op: &str, dtype: Dtype) -> OpError {
    OpError::TypeMismatch {
        op: op.to_string(),
        expected: "a numeric type".to_string(),
        actual: dtype.to_string(),
    }
}

fn add_float<T: Float>(acc: &mut [T], rhs: &[T]) {
    for (a, b) in acc.iter_mut().zip(rhs) {
        *a = *a + *b;
    }
}

// All-or-nothing: `acc` is untouched if any element overflows.
fn add_int<T: PrimInt>(op: &str, acc: &mut [T], rhs: &[T]) -> Result<()> {
    let sum = acc
        .iter()
        .zip(rhs)
        .map(|(a, b)| a.checked_add(b))
        .collect::<Option<Vec<T>>>()
        .ok_or_else(|| overflow(op))?;
    acc.copy_from_slice(&sum);
    Ok(())
}

/// `acc += rhs`, elementwise.
pub(crate) fn add_assign(op: &str, acc: &mut Buffer, rhs: &Buffer) -> Result<()> {
    match (acc, rhs) {
        (Buffer::F64(a), Buffer::F64(b)) => {
            add_float(a, b);
            Ok(())
        }
        (Buffer::F32(a), Buffer::F32(b)) => {
            add_float(a, b);
            Ok(())
        }
        (Buffer::I64(a), Buffer::I64(b)) => add_int(op, a, b),
        (Buffer::I32(a), Buffer::I32(b)) => add_int(op, a, b),
        (Buffer::U8(a), Buffer::U8(b)) => add_int(op, a, b),
        (a, b) if a.dtype() == b.dtype() => Err(not_numeric(op, a.dtype())),
        (a, b) => Err(OpError::dtype(op, a.dtype(), b.dtype())),
    }
}

fn neg_float<T: Float>(xs: &mut [T]) {
    for x in xs {
        *x = -*x;
    }
}

fn neg_int<T: PrimInt + CheckedNeg>(op: &str, xs: &mut [T]) -> Result<()> {
    let neg = xs
        .iter()
        .map(|x| x.checked_neg())
        .collect::<Option<Vec<T>>>()
        .ok_or_else(|| overflow(op))?;
    xs.copy_from_slice(&neg);
    Ok(())
}

pub(crate) fn neg_in_place(op: &str, buf: &mut Buffer) -> Result<()> {
    match buf {
        Buffer::F64(v) => {
            neg_float(v);
            Ok(())
        }
        Buffer::F32(v) => {
            neg_float(v);
            Ok(())
        }
        Buffer::I64(v) => neg_int(op, v),
        Buffer::I32(v) => neg_int(op, v),
        Buffer::U8(v) => neg_int(op, v),
        Buffer::Bool(_) => Err(not_numeric(op, Dtype::Bool)),
    }
}

/// `target += rhs` through a shared handle.
fn add_into(op: &str, target: &Tensor, rhs: &Value) -> Result<()> {
    match rhs {
        Value::Tensor(r) if !r.shares_storage(target) => {
            r.read(|b| target.write(|a| add_assign(op, a, b)))
        }
        _ => {
            let b = rhs.to_buffer();
            target.write(|a| add_assign(op, a, &b))
        }
    }
}

// Inputs of an elementwise binary op must agree in dtype and shape.
fn check_pair(op: &dyn Op, inputs: &[Value]) -> Result<Shape> {
    check_arity(op, 2, inputs)?;
    let (a, b) = (&inputs[0], &inputs[1]);
    if a.dtype() != b.dtype() {
        return Err(OpError::dtype(op, a.dtype(), b.dtype()));
    }
    if !a.dtype().is_numeric() {
        return Err(not_numeric(&op.to_string(), a.dtype()));
    }
    let shape = a.shape();
    if shape != b.shape() {
        return Err(OpError::shape(op, shape, b.shape()));
    }
    Ok(shape)
}

// `target` must be able to hold the result of the op.
fn check_target(op: &dyn Op, target: &Value, dtype: Dtype, shape: &Shape) -> Result<()> {
    if target.dtype() != dtype {
        return Err(OpError::dtype(op, dtype, target.dtype()));
    }
    if &target.shape() != shape {
        return Err(OpError::shape(op, shape, target.shape()));
    }
    Ok(())
}

fn elementwise_type(arity: usize) -> Type {
    let a = Type::var('a');
    Type::function(vec![a.clone(); arity], a)
}

fn same_shapes(op: &dyn Op, inputs: &[&Node]) -> Result<Shape> {
    let first = inputs
        .first()
        .ok_or_else(|| OpError::arity(op, 1, 0))?
        .shape();
    for n in &inputs[1..] {
        if n.shape() != first {
            return Err(OpError::shape(op, first, n.shape().clone()));
        }
    }
    Ok(first.clone())
}

////////////////////////////////////////////////////////////////////////////////
// Add

/// Elementwise addition of two values of the same type and shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Add;

impl Add {
    fn sum(&self, inputs: &[Value]) -> Result<(Shape, Buffer)> {
        let shape = check_pair(self, inputs)?;
        let op = self.to_string();
        let mut out = inputs[0].to_buffer();
        inputs[1].read_buffer(|b| add_assign(&op, &mut out, b))?;
        Ok((shape, out))
    }
}

impl Op for Add {
    fn type_of(&self) -> Type {
        elementwise_type(2)
    }

    fn infer_shape(&self, _hint: &Type, inputs: &[&Node]) -> Result<Shape> {
        check_arity(self, 2, inputs)?;
        same_shapes(self, inputs)
    }

    fn diff_wrt(&self, inputs: usize) -> Vec<bool> {
        vec![true; inputs]
    }

    // d(a + b)/da = d(a + b)/db = 1
    fn sym_diff(
        &self,
        _g: &mut ExprGraph,
        inputs: &[NodeId],
        _output: NodeId,
        grad: NodeId,
    ) -> Result<Vec<NodeId>> {
        check_arity(self, 2, inputs)?;
        Ok(vec![grad, grad])
    }

    fn do_op(&self, inputs: &[Value]) -> Result<Value> {
        let (shape, out) = self.sum(inputs)?;
        inputs[0].from_buffer_like(&self.to_string(), shape, out)
    }

    fn returns_ptr(&self) -> bool {
        false
    }

    fn calls_extern(&self) -> bool {
        false
    }

    fn overwrite_input(&self) -> Option<usize> {
        Some(0)
    }

    fn write_hash(&self, h: &mut dyn Hasher) {
        write_str(h, "+");
    }

    fn as_binary(&self) -> Option<&dyn BinaryOp> {
        Some(self)
    }

    fn as_ad_op(&self) -> Option<&dyn AdOp> {
        Some(self)
    }

    fn as_incr_doer(&self) -> Option<&dyn IncrDoer> {
        Some(self)
    }

    fn as_prealloc_doer(&self) -> Option<&dyn UsePreallocDoer> {
        Some(self)
    }

    fn as_unsafe_doer(&self) -> Option<&dyn UnsafeDoer> {
        Some(self)
    }
}

impl BinaryOp for Add {}

impl AdOp for Add {
    fn do_diff(&self, g: &mut ExprGraph, inputs: &[NodeId], output: NodeId) -> Result<()> {
        check_arity(self, 2, inputs)?;
        let grad = g
            .node(output)?
            .grad()
            .cloned()
            .ok_or(OpError::GradientAbsent(output))?;
        for input in inputs {
            g.accumulate_grad(*input, &grad)?;
        }
        Ok(())
    }
}

impl IncrDoer for Add {
    fn incr_do(&self, incr: &mut Value, inputs: &[Value]) -> Result<()> {
        let (shape, sum) = self.sum(inputs)?;
        check_target(self, incr, sum.dtype(), &shape)?;
        let op = self.to_string();
        match incr {
            Value::Scalar(s) => {
                let mut acc = Buffer::from_scalar(*s);
                add_assign(&op, &mut acc, &sum)?;
                if let Some(x) = acc.get(0) {
                    *s = x;
                }
                Ok(())
            }
            Value::Tensor(t) => t.write(|acc| add_assign(&op, acc, &sum)),
        }
    }
}

impl UsePreallocDoer for Add {
    fn use_prealloc_do(&self, prealloc: Value, inputs: &[Value]) -> Result<Value> {
        let (shape, sum) = self.sum(inputs)?;
        check_target(self, &prealloc, sum.dtype(), &shape)?;
        match prealloc {
            Value::Scalar(_) => inputs[0].from_buffer_like(&self.to_string(), shape, sum),
            Value::Tensor(t) => {
                t.write(|buf| *buf = sum);
                Ok(Value::Tensor(t))
            }
        }
    }
}

impl UnsafeDoer for Add {
    fn unsafe_do(&self, inputs: Vec<Value>) -> Result<Value> {
        check_pair(self, &inputs)?;
        let mut inputs = inputs.into_iter();
        let (lhs, rhs) = match (inputs.next(), inputs.next()) {
            (Some(lhs), Some(rhs)) => (lhs, rhs),
            _ => return Err(OpError::arity(self, 2, 0)),
        };
        match lhs {
            Value::Tensor(t) => {
                add_into(&self.to_string(), &t, &rhs)?;
                Ok(Value::Tensor(t))
            }
            scalar => self.do_op(&[scalar, rhs]),
        }
    }
}

impl fmt::Display for Add {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+")
    }
}

////////////////////////////////////////////////////////////////////////////////
// Neg

/// Elementwise negation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Neg;

impl Op for Neg {
    fn type_of(&self) -> Type {
        elementwise_type(1)
    }

    fn infer_shape(&self, _hint: &Type, inputs: &[&Node]) -> Result<Shape> {
        check_arity(self, 1, inputs)?;
        Ok(inputs[0].shape().clone())
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
        Ok(vec![g.apply(Neg, &[grad])?])
    }

    fn do_op(&self, inputs: &[Value]) -> Result<Value> {
        check_arity(self, 1, inputs)?;
        let op = self.to_string();
        let mut out = inputs[0].to_buffer();
        neg_in_place(&op, &mut out)?;
        inputs[0].from_buffer_like(&op, inputs[0].shape(), out)
    }

    fn returns_ptr(&self) -> bool {
        false
    }

    fn calls_extern(&self) -> bool {
        false
    }

    fn overwrite_input(&self) -> Option<usize> {
        Some(0)
    }

    fn write_hash(&self, h: &mut dyn Hasher) {
        write_str(h, "neg");
    }

    fn as_unary(&self) -> Option<&dyn UnaryOp> {
        Some(self)
    }

    fn as_unsafe_doer(&self) -> Option<&dyn UnsafeDoer> {
        Some(self)
    }
}

impl UnaryOp for Neg {}

impl UnsafeDoer for Neg {
    fn unsafe_do(&self, inputs: Vec<Value>) -> Result<Value> {
        check_arity(self, 1, &inputs)?;
        match inputs.into_iter().next() {
            Some(Value::Tensor(t)) => {
                t.write(|buf| neg_in_place(&self.to_string(), buf))?;
                Ok(Value::Tensor(t))
            }
            Some(scalar) => self.do_op(&[scalar]),
            None => Err(OpError::arity(self, 1, 0)),
        }
    }
}

impl fmt::Display for Neg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "neg")
    }
}

////////////////////////////////////////////////////////////////////////////////
// Incr

/// `x += y` in place, run for its side effect on `x`.
///
/// The result is the handle to `x`, which must not be wired into further computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Incr;

impl Op for Incr {
    fn type_of(&self) -> Type {
        elementwise_type(2)
    }

    fn infer_shape(&self, _hint: &Type, inputs: &[&Node]) -> Result<Shape> {
        check_arity(self, 2, inputs)?;
        same_shapes(self, inputs)
    }

    fn diff_wrt(&self, inputs: usize) -> Vec<bool> {
        vec![false; inputs]
    }

    fn sym_diff(&self, _: &mut ExprGraph, _: &[NodeId], _: NodeId, _: NodeId) -> Result<Vec<NodeId>> {
        Err(OpError::NonDifferentiable {
            op: self.to_string(),
        })
    }

    fn do_op(&self, inputs: &[Value]) -> Result<Value> {
        check_pair(self, inputs)?;
        match &inputs[0] {
            Value::Tensor(t) => {
                add_into(&self.to_string(), t, &inputs[1])?;
                Ok(Value::Tensor(t.clone()))
            }
            Value::Scalar(_) => Err(OpError::TypeMismatch {
                op: self.to_string(),
                expected: "a tensor".to_string(),
                actual: inputs[0].type_of().to_string(),
            }),
        }
    }

    fn returns_ptr(&self) -> bool {
        true
    }

    fn calls_extern(&self) -> bool {
        false
    }

    fn overwrite_input(&self) -> Option<usize> {
        Some(0)
    }

    fn write_hash(&self, h: &mut dyn Hasher) {
        write_str(h, "+=");
    }

    fn as_binary(&self) -> Option<&dyn BinaryOp> {
        Some(self)
    }

    fn as_no_ret(&self) -> Option<&dyn NoRetOp> {
        Some(self)
    }
}

impl BinaryOp for Incr {}

impl NoRetOp for Incr {}

impl fmt::Display for Incr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+=")
    }
}
