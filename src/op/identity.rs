use super::{check_arity, Op, UnaryOp};
use crate::error::{OpError, Result};
use crate::graph::{ExprGraph, Node, NodeId};
use crate::hash::write_str;
use crate::shape::Shape;
use crate::types::Type;
use crate::value::Value;

use core::fmt;
use core::hash::Hasher;

/// The identity on values that blocks gradient flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StopGradient;

impl Op for StopGradient {
    fn type_of(&self) -> Type {
        let a = Type::var('a');
        Type::function(vec![a.clone()], a)
    }

    fn infer_shape(&self, _hint: &Type, inputs: &[&Node]) -> Result<Shape> {
        check_arity(self, 1, inputs)?;
        Ok(inputs[0].shape().clone())
    }

    fn diff_wrt(&self, inputs: usize) -> Vec<bool> {
        vec![false; inputs]
    }

    fn sym_diff(&self, _: &mut ExprGraph, _: &[NodeId], _: NodeId, _: NodeId) -> Result<Vec<NodeId>> {
        Err(OpError::NonDifferentiable {
            op: self.to_string(),
        })
    }

    // Hands back the input itself.
    fn do_op(&self, inputs: &[Value]) -> Result<Value> {
        check_arity(self, 1, inputs)?;
        Ok(inputs[0].clone())
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
        write_str(h, "stopgrad");
    }

    fn as_unary(&self) -> Option<&dyn UnaryOp> {
        Some(self)
    }
}

impl UnaryOp for StopGradient {}

impl fmt::Display for StopGradient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stopgrad")
    }
}
