//! Symbolic types of operators and nodes.
//!
//! An operator's type is usually a [`Type::Function`], for example
//!
//! ```text
//! Add :: a → a → a
//! Sum :: Tensor-2 a → a
//! ```
//!
//! where `a` is a [`TypeVar`]. The graph builder resolves the output type of an application by
//! unifying the parameter types against the types of the input nodes.
use crate::dtype::Dtype;
use crate::error::{OpError, Result};

use core::fmt;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TypeVar(pub char);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Type {
    Var(TypeVar),
    Dtype(Dtype),
    /// A tensor of rank `dims` whose elements have type `of`.
    Tensor { dims: usize, of: Box<Type> },
    /// Parameter types and return type.
    Function(Vec<Type>, Box<Type>),
}

/// Bindings of type variables accumulated during unification.
pub type Substitution = BTreeMap<TypeVar, Type>;

impl Type {
    pub fn var(name: char) -> Self {
        Type::Var(TypeVar(name))
    }

    pub fn tensor(dims: usize, of: impl Into<Type>) -> Self {
        Type::Tensor {
            dims,
            of: Box::new(of.into()),
        }
    }

    pub fn function(params: Vec<Type>, ret: impl Into<Type>) -> Self {
        Type::Function(params, Box::new(ret.into()))
    }

    /// The element type of a fully resolved value type.
    pub fn dtype(&self) -> Option<Dtype> {
        match self {
            Type::Dtype(d) => Some(*d),
            Type::Tensor { of, .. } => of.dtype(),
            Type::Var(_) | Type::Function(..) => None,
        }
    }

    /// True if no type variables occur in `self`.
    pub fn is_ground(&self) -> bool {
        match self {
            Type::Var(_) => false,
            Type::Dtype(_) => true,
            Type::Tensor { of, .. } => of.is_ground(),
            Type::Function(params, ret) => params.iter().all(Type::is_ground) && ret.is_ground(),
        }
    }

    fn occurs(&self, v: TypeVar) -> bool {
        match self {
            Type::Var(w) => *w == v,
            Type::Dtype(_) => false,
            Type::Tensor { of, .. } => of.occurs(v),
            Type::Function(params, ret) => params.iter().any(|p| p.occurs(v)) || ret.occurs(v),
        }
    }

    /// Replace every bound variable by its binding.
    pub fn apply(&self, subs: &Substitution) -> Type {
        match self {
            Type::Var(v) => match subs.get(v) {
                Some(t) => t.apply(subs),
                None => self.clone(),
            },
            Type::Dtype(_) => self.clone(),
            Type::Tensor { dims, of } => Type::Tensor {
                dims: *dims,
                of: Box::new(of.apply(subs)),
            },
            Type::Function(params, ret) => Type::Function(
                params.iter().map(|p| p.apply(subs)).collect(),
                Box::new(ret.apply(subs)),
            ),
        }
    }
}

impl From<Dtype> for Type {
    fn from(d: Dtype) -> Self {
        Type::Dtype(d)
    }
}

/// Unify `a` and `b`, extending `subs`. Returns false if they cannot be made equal.
pub fn unify(a: &Type, b: &Type, subs: &mut Substitution) -> bool {
    let a = a.apply(subs);
    let b = b.apply(subs);
    match (&a, &b) {
        (Type::Var(v), Type::Var(w)) if v == w => true,
        (Type::Var(v), t) | (t, Type::Var(v)) => {
            if t.occurs(*v) {
                return false;
            }
            subs.insert(*v, t.clone());
            true
        }
        (Type::Dtype(x), Type::Dtype(y)) => x == y,
        (Type::Tensor { dims: d1, of: o1 }, Type::Tensor { dims: d2, of: o2 }) => {
            d1 == d2 && unify(o1, o2, subs)
        }
        (Type::Function(p1, r1), Type::Function(p2, r2)) => {
            p1.len() == p2.len()
                && p1.iter().zip(p2.iter()).all(|(x, y)| unify(x, y, subs))
                && unify(r1, r2, subs)
        }
        _ => false,
    }
}

/// Resolve the type of applying an operator of type `op_type` to inputs of the given types.
///
/// A non-function type is the type of a zero-input operator (a constant).
pub fn infer_application(op: &str, op_type: &Type, inputs: &[&Type]) -> Result<Type> {
    let (params, ret) = match op_type {
        Type::Function(params, ret) => (params.as_slice(), ret.as_ref()),
        t => {
            if !inputs.is_empty() {
                return Err(OpError::arity(op, 0, inputs.len()));
            }
            return Ok(t.clone());
        }
    };

    if params.len() != inputs.len() {
        return Err(OpError::arity(op, params.len(), inputs.len()));
    }

    let mut subs = Substitution::new();
    for (param, input) in params.iter().zip(inputs.iter()) {
        if !unify(param, input, &mut subs) {
            return Err(OpError::TypeMismatch {
                op: op.to_string(),
                expected: param.apply(&subs).to_string(),
                actual: input.to_string(),
            });
        }
    }
    Ok(ret.apply(&subs))
}

impl fmt::Display for TypeVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Var(v) => write!(f, "{v}"),
            Type::Dtype(d) => write!(f, "{d}"),
            Type::Tensor { dims, of } => write!(f, "Tensor-{dims} {of}"),
            Type::Function(params, ret) => {
                for p in params {
                    match p {
                        Type::Function(..) => write!(f, "({p}) → ")?,
                        _ => write!(f, "{p} → ")?,
                    }
                }
                write!(f, "{ret}")
            }
        }
    }
}
