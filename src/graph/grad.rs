//! Symbolic reverse-mode differentiation.
use super::{ExprGraph, NodeId};
use crate::error::{OpError, Result};
use crate::op::Add;
use crate::shape::Shape;
use crate::value::Scalar;

use std::collections::BTreeMap;

// Sum a non-empty list of gradient contributions.
fn sum_contributions(g: &mut ExprGraph, grads: Vec<NodeId>) -> Result<Option<NodeId>> {
    let mut grads = grads.into_iter();
    let Some(first) = grads.next() else {
        return Ok(None);
    };
    grads
        .try_fold(first, |acc, x| g.apply(Add, &[acc, x]))
        .map(Some)
}

/// Add the gradient graph of `cost` to `g` and return the gradient node of each of `wrt`.
///
/// Walks the nodes `cost` depends on in reverse topological order, calling
/// [`Op::sym_diff`](crate::op::Op::sym_diff) once per node and summing the contributions of
/// nodes used more than once.
///
/// # Errors
///
/// * [`OpError::ShapeMismatch`] if `cost` is not a scalar
/// * [`OpError::NonDifferentiable`] if some node of `wrt` receives no gradient
/// * any error of `sym_diff`, including an op returning a gradient count that does not match
///   its [`Op::diff_wrt`](crate::op::Op::diff_wrt)
pub fn grad(g: &mut ExprGraph, cost: NodeId, wrt: &[NodeId]) -> Result<Vec<NodeId>> {
    let cost_node = g.node(cost)?;
    if !cost_node.shape().is_scalar() {
        return Err(OpError::shape("grad", Shape::scalar(), cost_node.shape().clone()));
    }
    let dtype = cost_node
        .type_of()
        .dtype()
        .ok_or_else(|| OpError::TypeMismatch {
            op: "grad".to_string(),
            expected: "a value type".to_string(),
            actual: cost_node.type_of().to_string(),
        })?;

    let seed = g.constant(Scalar::one(dtype))?;
    let forward = g.ancestors(cost)?;

    let mut pending: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
    pending.insert(cost, vec![seed]);
    let mut grads: BTreeMap<NodeId, NodeId> = BTreeMap::new();

    for id in forward.into_iter().rev() {
        let Some(total) = sum_contributions(g, pending.remove(&id).unwrap_or_default())? else {
            continue;
        };
        grads.insert(id, total);

        let node = g.node(id)?;
        let op = node.op().clone();
        let children = node.children().to_vec();
        let diff = op.diff_wrt(children.len());
        let expected = diff.iter().filter(|d| **d).count();
        if expected == 0 {
            continue;
        }

        log::debug!("differentiating {id:?} = {op}");
        let child_grads = op.sym_diff(g, &children, id, total)?;
        if child_grads.len() != expected {
            return Err(OpError::Computation {
                op: op.to_string(),
                reason: format!(
                    "{} gradients for {expected} differentiable inputs",
                    child_grads.len()
                ),
            });
        }

        let differentiable = children
            .iter()
            .zip(diff)
            .filter_map(|(c, d)| d.then_some(*c));
        for (child, child_grad) in differentiable.zip(child_grads) {
            pending.entry(child).or_default().push(child_grad);
        }
    }

    wrt.iter()
        .map(|w| match grads.get(w) {
            Some(d) => Ok(*d),
            None => Err(OpError::NonDifferentiable {
                op: g.node(*w)?.op().to_string(),
            }),
        })
        .collect()
}
