//! Runtime values passed to and returned from [`Op::do_op`](crate::op::Op::do_op).
use crate::dtype::Dtype;
use crate::error::{OpError, Result};
use crate::shape::Shape;
use crate::tensor::{Buffer, Tensor};
use crate::types::Type;

use core::fmt;
use core::hash::Hasher;

/// The capability set every value offers: it knows its own element type and shape.
pub trait Typed {
    fn dtype(&self) -> Dtype;
    fn shape(&self) -> Shape;
    fn type_of(&self) -> Type;
}

/// A single element.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Scalar {
    F64(f64),
    F32(f32),
    I64(i64),
    I32(i32),
    U8(u8),
    Bool(bool),
}

impl Scalar {
    pub fn zero(dtype: Dtype) -> Self {
        match dtype {
            Dtype::Float64 => Scalar::F64(0.0),
            Dtype::Float32 => Scalar::F32(0.0),
            Dtype::Int64 => Scalar::I64(0),
            Dtype::Int32 => Scalar::I32(0),
            Dtype::Uint8 => Scalar::U8(0),
            Dtype::Bool => Scalar::Bool(false),
        }
    }

    pub fn one(dtype: Dtype) -> Self {
        match dtype {
            Dtype::Float64 => Scalar::F64(1.0),
            Dtype::Float32 => Scalar::F32(1.0),
            Dtype::Int64 => Scalar::I64(1),
            Dtype::Int32 => Scalar::I32(1),
            Dtype::Uint8 => Scalar::U8(1),
            Dtype::Bool => Scalar::Bool(true),
        }
    }

    /// Write the little-endian bit pattern of the value.
    ///
    /// Floats are written by bits, so `0.0` and `-0.0` (and distinct NaN payloads) differ.
    pub fn write_bits(&self, h: &mut dyn Hasher) {
        match *self {
            Scalar::F64(x) => h.write(&x.to_bits().to_le_bytes()),
            Scalar::F32(x) => h.write(&x.to_bits().to_le_bytes()),
            Scalar::I64(x) => h.write(&x.to_le_bytes()),
            Scalar::I32(x) => h.write(&x.to_le_bytes()),
            Scalar::U8(x) => h.write(&[x]),
            Scalar::Bool(x) => h.write(&[u8::from(x)]),
        }
    }
}

impl Typed for Scalar {
    fn dtype(&self) -> Dtype {
        match self {
            Scalar::F64(_) => Dtype::Float64,
            Scalar::F32(_) => Dtype::Float32,
            Scalar::I64(_) => Dtype::Int64,
            Scalar::I32(_) => Dtype::Int32,
            Scalar::U8(_) => Dtype::Uint8,
            Scalar::Bool(_) => Dtype::Bool,
        }
    }

    fn shape(&self) -> Shape {
        Shape::scalar()
    }

    fn type_of(&self) -> Type {
        Type::Dtype(self.dtype())
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::F64(x) => write!(f, "{x}"),
            Scalar::F32(x) => write!(f, "{x}"),
            Scalar::I64(x) => write!(f, "{x}"),
            Scalar::I32(x) => write!(f, "{x}"),
            Scalar::U8(x) => write!(f, "{x}"),
            Scalar::Bool(x) => write!(f, "{x}"),
        }
    }
}

macro_rules! scalar_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Scalar {
                fn from(x: $t) -> Self {
                    Scalar::$variant(x)
                }
            }

            impl From<$t> for Value {
                fn from(x: $t) -> Self {
                    Value::Scalar(Scalar::$variant(x))
                }
            }
        )*
    };
}

scalar_from!(f64 => F64, f32 => F32, i64 => I64, i32 => I32, u8 => U8, bool => Bool);

/// A scalar or a tensor.
///
/// Cloning a `Value::Tensor` clones the handle, not the storage.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Tensor(Tensor),
}

impl Value {
    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Value::Scalar(s) => Some(*s),
            Value::Tensor(_) => None,
        }
    }

    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            Value::Scalar(_) => None,
            Value::Tensor(t) => Some(t),
        }
    }

    /// A copy of the elements of this value.
    pub(crate) fn to_buffer(&self) -> Buffer {
        match self {
            Value::Scalar(s) => Buffer::from_scalar(*s),
            Value::Tensor(t) => t.read(|b| b.clone()),
        }
    }

    pub(crate) fn read_buffer<R>(&self, f: impl FnOnce(&Buffer) -> R) -> R {
        match self {
            Value::Scalar(s) => f(&Buffer::from_scalar(*s)),
            Value::Tensor(t) => t.read(f),
        }
    }

    /// Build a fresh value of shape `shape` holding `buf`. A scalar shape gives a
    /// [`Value::Scalar`].
    pub(crate) fn from_buffer(op: &str, shape: Shape, buf: Buffer) -> Result<Value> {
        if shape.is_scalar() {
            match buf.get(0) {
                Some(s) if buf.len() == 1 => Ok(Value::Scalar(s)),
                _ => Err(OpError::shape(op, shape, Shape(vec![buf.len()]))),
            }
        } else {
            Tensor::new(shape, buf).map(Value::Tensor)
        }
    }

    /// Like [`Value::from_buffer`] for a result of the same type as `self`: a 0-d tensor stays
    /// a tensor, so the value agrees with the node's `Tensor-0` type.
    pub(crate) fn from_buffer_like(&self, op: &str, shape: Shape, buf: Buffer) -> Result<Value> {
        match self {
            Value::Tensor(_) => Tensor::new(shape, buf).map(Value::Tensor),
            Value::Scalar(_) => Value::from_buffer(op, shape, buf),
        }
    }

    /// An independently-owned copy.
    pub fn deep_clone(&self) -> Value {
        match self {
            Value::Scalar(s) => Value::Scalar(*s),
            Value::Tensor(t) => Value::Tensor(t.deep_clone()),
        }
    }

    /// True if `self` and `other` are tensors backed by the same storage.
    pub fn shares_storage(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Tensor(a), Value::Tensor(b)) => a.shares_storage(b),
            _ => false,
        }
    }
}

impl Typed for Value {
    fn dtype(&self) -> Dtype {
        match self {
            Value::Scalar(s) => s.dtype(),
            Value::Tensor(t) => t.dtype(),
        }
    }

    fn shape(&self) -> Shape {
        match self {
            Value::Scalar(s) => s.shape(),
            Value::Tensor(t) => t.shape().clone(),
        }
    }

    fn type_of(&self) -> Type {
        match self {
            Value::Scalar(s) => s.type_of(),
            Value::Tensor(t) => t.type_of(),
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

impl From<Tensor> for Value {
    fn from(t: Tensor) -> Self {
        Value::Tensor(t)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(s) => write!(f, "{s}"),
            Value::Tensor(t) => write!(f, "{t}"),
        }
    }
}
