//! Forward evaluation and differentiation at execution time.
use super::{ExprGraph, NodeId};
use crate::error::{OpError, Result};
use crate::shape::Shape;
use crate::value::{Scalar, Typed, Value};

/// Evaluate `output`, binding the value of every node it depends on.
///
/// Nodes that already have a bound value are not recomputed. Bound values are never written:
/// an op that overwrites one of its inputs receives a private copy of it, so constants and the
/// other readers of that input keep their values.
pub fn evaluate(g: &mut ExprGraph, output: NodeId) -> Result<Value> {
    for id in g.ancestors(output)? {
        let node = g.node(id)?;
        if node.value().is_some() {
            continue;
        }
        let op = node.op().clone();
        let mut inputs = node
            .children()
            .iter()
            .map(|c| {
                g.node(*c)?
                    .value()
                    .cloned()
                    .ok_or(OpError::UnknownNode(*c))
            })
            .collect::<Result<Vec<Value>>>()?;
        if let Some(input) = op.overwrite_input().and_then(|i| inputs.get_mut(i)) {
            log::trace!("{id:?} = {op} overwrites a copy of its input");
            *input = input.deep_clone();
        }

        let value = op.do_op(&inputs)?;
        if op.returns_ptr() {
            log::debug!("{id:?} = {op} may alias its inputs");
        }
        g.bind_value(id, value)?;
    }
    g.node(output)?
        .value()
        .cloned()
        .ok_or(OpError::UnknownNode(output))
}

/// Propagate the gradient bound to `node` into its children using the op's own
/// [`AdOp::do_diff`](crate::op::AdOp::do_diff).
///
/// # Errors
///
/// [`OpError::NonDifferentiable`] if the op does not differentiate itself.
pub fn do_diff(g: &mut ExprGraph, node: NodeId) -> Result<()> {
    let n = g.node(node)?;
    let op = n.op().clone();
    let children = n.children().to_vec();
    match op.as_ad_op() {
        Some(ad) => ad.do_diff(g, &children, node),
        None => Err(OpError::NonDifferentiable { op: op.to_string() }),
    }
}

/// Evaluate `cost`, seed its gradient with one, and run [`do_diff`] over every node it depends
/// on in reverse topological order. Leaves are skipped.
///
/// Gradients accumulate into whatever the nodes already hold.
pub fn backprop(g: &mut ExprGraph, cost: NodeId) -> Result<Value> {
    let value = evaluate(g, cost)?;
    if !value.shape().is_scalar() {
        return Err(OpError::shape("backprop", Shape::scalar(), value.shape()));
    }
    g.bind_grad(cost, Value::Scalar(Scalar::one(value.dtype())))?;
    for id in g.ancestors(cost)?.into_iter().rev() {
        if g.node(id)?.children().is_empty() {
            continue;
        }
        log::debug!("do_diff {id:?}");
        do_diff(g, id)?;
    }
    Ok(value)
}
