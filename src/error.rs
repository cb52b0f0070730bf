use crate::dtype::Dtype;
use crate::graph::NodeId;
use crate::shape::Shape;
use thiserror::Error;

/// Everything that can go wrong while building, differentiating or executing a graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OpError {
    #[error("{op}: expected shape {expected}, got {actual}")]
    ShapeMismatch {
        op: String,
        expected: String,
        actual: Shape,
    },

    #[error("{op}: expected {expected}, got {actual}")]
    TypeMismatch {
        op: String,
        expected: String,
        actual: String,
    },

    #[error("{op}: expected {expected} inputs, got {actual}")]
    ArityMismatch {
        op: String,
        expected: usize,
        actual: usize,
    },

    #[error("{op} is not differentiable")]
    NonDifferentiable { op: String },

    #[error("no gradient bound to {0:?}")]
    GradientAbsent(NodeId),

    #[error("{op} returns nothing and cannot be used as an input")]
    NoReturnValue { op: String },

    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),

    #[error("{op}: {reason}")]
    Computation { op: String, reason: String },
}

impl OpError {
    pub(crate) fn shape(op: impl ToString, expected: impl ToString, actual: Shape) -> Self {
        OpError::ShapeMismatch {
            op: op.to_string(),
            expected: expected.to_string(),
            actual,
        }
    }

    pub(crate) fn arity(op: impl ToString, expected: usize, actual: usize) -> Self {
        OpError::ArityMismatch {
            op: op.to_string(),
            expected,
            actual,
        }
    }

    pub(crate) fn dtype(op: impl ToString, expected: Dtype, actual: Dtype) -> Self {
        OpError::TypeMismatch {
            op: op.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, OpError>;
