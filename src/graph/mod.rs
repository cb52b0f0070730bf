//! Expression graphs of operator applications.
//!
//! An [`ExprGraph`] is an append-only arena of [`Node`]s. Each node pairs an [`Op`] with the
//! nodes it is applied to. Because children must exist before their parents, ascending
//! [`NodeId`] order is a topological order.
//!
//! Nodes are interned: applying an op that hashes identically to an existing node's op, to the
//! same children, returns the existing node.
mod eval;
mod grad;

pub use eval::*;
pub use grad::*;

use crate::error::{OpError, Result};
use crate::op::{constant, Op};
use crate::shape::Shape;
use crate::types::{infer_application, Type};
use crate::value::Value;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// An operator applied to some input nodes, with its resolved type and shape.
#[derive(Debug, Clone)]
pub struct Node {
    op: Arc<dyn Op>,
    children: Vec<NodeId>,
    ty: Type,
    shape: Shape,
    value: Option<Value>,
    grad: Option<Value>,
}

impl Node {
    pub fn op(&self) -> &Arc<dyn Op> {
        &self.op
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn type_of(&self) -> &Type {
        &self.ty
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// The value bound by evaluation, if any.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// The gradient accumulator, if any.
    pub fn grad(&self) -> Option<&Value> {
        self.grad.as_ref()
    }
}

// Interning key. The op's text guards against 32-bit hash collisions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct NodeKey {
    hash: u32,
    op: String,
    children: Vec<NodeId>,
}

#[derive(Debug, Default)]
pub struct ExprGraph {
    nodes: Vec<Node>,
    interned: HashMap<NodeKey, NodeId>,
}

impl ExprGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id.0).ok_or(OpError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(id.0).ok_or(OpError::UnknownNode(id))
    }

    /// Apply `op` to `children`, returning the new (or an existing identical) node.
    pub fn apply<O: Op + 'static>(&mut self, op: O, children: &[NodeId]) -> Result<NodeId> {
        self.apply_shared(Arc::new(op), children)
    }

    /// Like [`ExprGraph::apply`] for an op that is already shared.
    ///
    /// # Errors
    ///
    /// * [`OpError::ArityMismatch`] if `op` is unary or binary and the child count is wrong
    /// * [`OpError::NoReturnValue`] if a child's op returns nothing
    /// * type and shape inference errors of `op`
    pub fn apply_shared(&mut self, op: Arc<dyn Op>, children: &[NodeId]) -> Result<NodeId> {
        let arity = if op.as_unary().is_some() {
            Some(1)
        } else if op.as_binary().is_some() {
            Some(2)
        } else {
            None
        };
        if let Some(n) = arity {
            if children.len() != n {
                return Err(OpError::arity(&op, n, children.len()));
            }
        }

        let inputs = children
            .iter()
            .map(|c| self.node(*c))
            .collect::<Result<Vec<&Node>>>()?;
        if let Some(c) = inputs.iter().find(|c| c.op.as_no_ret().is_some()) {
            return Err(OpError::NoReturnValue {
                op: c.op.to_string(),
            });
        }

        let op_name = op.to_string();
        let input_types: Vec<&Type> = inputs.iter().map(|c| &c.ty).collect();
        let ty = infer_application(&op_name, &op.type_of(), &input_types)?;
        let shape = op.infer_shape(&ty, &inputs)?;

        let key = NodeKey {
            hash: op.hashcode(),
            op: op_name,
            children: children.to_vec(),
        };
        if let Some(id) = self.interned.get(&key) {
            log::debug!("reusing {id:?} for {}", key.op);
            return Ok(*id);
        }

        let id = NodeId(self.nodes.len());
        log::trace!("{id:?} = {op} {children:?} :: {ty} {shape}");
        self.nodes.push(Node {
            op,
            children: children.to_vec(),
            ty,
            shape,
            value: None,
            grad: None,
        });
        self.interned.insert(key, id);
        Ok(id)
    }

    /// Add a constant node producing `v`.
    pub fn constant(&mut self, v: impl Into<Value>) -> Result<NodeId> {
        self.apply_shared(constant(v), &[])
    }

    pub fn bind_value(&mut self, id: NodeId, v: Value) -> Result<()> {
        self.node_mut(id)?.value = Some(v);
        Ok(())
    }

    pub fn bind_grad(&mut self, id: NodeId, grad: Value) -> Result<()> {
        self.node_mut(id)?.grad = Some(grad);
        Ok(())
    }

    /// Add `grad` to the gradient accumulator of `id`, creating it if absent.
    pub fn accumulate_grad(&mut self, id: NodeId, grad: &Value) -> Result<()> {
        let node = self.node_mut(id)?;
        match node.grad.as_mut() {
            None => node.grad = Some(grad.deep_clone()),
            Some(acc) => {
                let sum = crate::op::Add.do_op(&[acc.clone(), grad.clone()])?;
                *acc = sum;
            }
        }
        Ok(())
    }

    /// `id` and every node it transitively depends on, in topological order.
    pub fn ancestors(&self, id: NodeId) -> Result<BTreeSet<NodeId>> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            if seen.insert(n) {
                stack.extend_from_slice(&self.node(n)?.children);
            }
        }
        Ok(seen)
    }
}
