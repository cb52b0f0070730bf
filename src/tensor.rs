//! Dense tensors with shared storage.
use crate::dtype::Dtype;
use crate::error::{OpError, Result};
use crate::hash::{write_len, write_str};
use crate::shape::Shape;
use crate::types::Type;
use crate::value::{Scalar, Typed};

use core::fmt;
use core::hash::Hasher;
use std::sync::{Arc, PoisonError, RwLock};

/// A flat, row-major element buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Buffer {
    F64(Vec<f64>),
    F32(Vec<f32>),
    I64(Vec<i64>),
    I32(Vec<i32>),
    U8(Vec<u8>),
    Bool(Vec<bool>),
}

// Run `$body` with `$v` bound to the inner `Vec` of whichever variant `$buf` is.
macro_rules! dispatch {
    ($buf:expr, $v:ident => $body:expr) => {
        match $buf {
            Buffer::F64($v) => $body,
            Buffer::F32($v) => $body,
            Buffer::I64($v) => $body,
            Buffer::I32($v) => $body,
            Buffer::U8($v) => $body,
            Buffer::Bool($v) => $body,
        }
    };
}

/// Element types a [`Buffer`] can hold.
pub trait Element: Copy + Into<Scalar> + 'static {
    const DTYPE: Dtype;

    fn into_buffer(data: Vec<Self>) -> Buffer;
    fn slice(buf: &Buffer) -> Option<&[Self]>;
    fn slice_mut(buf: &mut Buffer) -> Option<&mut [Self]>;
    fn from_scalar(s: Scalar) -> Option<Self>;
}

macro_rules! element {
    ($($t:ty => $variant:ident, $dtype:ident);* $(;)?) => {
        $(
            impl Element for $t {
                const DTYPE: Dtype = Dtype::$dtype;

                fn into_buffer(data: Vec<Self>) -> Buffer {
                    Buffer::$variant(data)
                }

                fn slice(buf: &Buffer) -> Option<&[Self]> {
                    match buf {
                        Buffer::$variant(v) => Some(v),
                        _ => None,
                    }
                }

                fn slice_mut(buf: &mut Buffer) -> Option<&mut [Self]> {
                    match buf {
                        Buffer::$variant(v) => Some(v),
                        _ => None,
                    }
                }

                fn from_scalar(s: Scalar) -> Option<Self> {
                    match s {
                        Scalar::$variant(x) => Some(x),
                        _ => None,
                    }
                }
            }
        )*
    };
}

element! {
    f64 => F64, Float64;
    f32 => F32, Float32;
    i64 => I64, Int64;
    i32 => I32, Int32;
    u8 => U8, Uint8;
    bool => Bool, Bool;
}

fn set_in<T: Element>(v: &mut [T], i: usize, s: Scalar) -> Option<()> {
    let x = T::from_scalar(s)?;
    *v.get_mut(i)? = x;
    Some(())
}

impl Buffer {
    pub fn zeros(dtype: Dtype, len: usize) -> Self {
        Self::filled(Scalar::zero(dtype), len)
    }

    pub fn filled(s: Scalar, len: usize) -> Self {
        match s {
            Scalar::F64(x) => Buffer::F64(vec![x; len]),
            Scalar::F32(x) => Buffer::F32(vec![x; len]),
            Scalar::I64(x) => Buffer::I64(vec![x; len]),
            Scalar::I32(x) => Buffer::I32(vec![x; len]),
            Scalar::U8(x) => Buffer::U8(vec![x; len]),
            Scalar::Bool(x) => Buffer::Bool(vec![x; len]),
        }
    }

    pub fn from_scalar(s: Scalar) -> Self {
        Self::filled(s, 1)
    }

    pub fn dtype(&self) -> Dtype {
        match self {
            Buffer::F64(_) => Dtype::Float64,
            Buffer::F32(_) => Dtype::Float32,
            Buffer::I64(_) => Dtype::Int64,
            Buffer::I32(_) => Dtype::Int32,
            Buffer::U8(_) => Dtype::Uint8,
            Buffer::Bool(_) => Dtype::Bool,
        }
    }

    pub fn len(&self) -> usize {
        dispatch!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> Option<Scalar> {
        dispatch!(self, v => v.get(i).map(|x| (*x).into()))
    }

    /// Set element `i`. Returns `None` if `i` is out of bounds or `s` has the wrong dtype.
    pub fn set(&mut self, i: usize, s: Scalar) -> Option<()> {
        dispatch!(self, v => set_in(v, i, s))
    }

    fn write_bits(&self, h: &mut dyn Hasher) {
        for i in 0..self.len() {
            if let Some(s) = self.get(i) {
                s.write_bits(h);
            }
        }
    }
}

/// A dense tensor.
///
/// A `Tensor` is a handle: clones share storage, and a write through any handle is visible through
/// all of them. Use [`Tensor::deep_clone`] for an independent copy.
#[derive(Clone)]
pub struct Tensor {
    shape: Shape,
    dtype: Dtype,
    data: Arc<RwLock<Buffer>>,
}

impl Tensor {
    /// Fails with [`OpError::ShapeMismatch`] if `data` does not have `shape.size()` elements.
    pub fn new(shape: impl Into<Shape>, data: Buffer) -> Result<Self> {
        let shape = shape.into();
        if data.len() != shape.size() {
            return Err(OpError::shape("tensor", shape, Shape(vec![data.len()])));
        }
        Ok(Tensor {
            shape,
            dtype: data.dtype(),
            data: Arc::new(RwLock::new(data)),
        })
    }

    pub fn from_vec<T: Element>(shape: impl Into<Shape>, data: Vec<T>) -> Result<Self> {
        Self::new(shape, T::into_buffer(data))
    }

    pub fn zeros(dtype: Dtype, shape: impl Into<Shape>) -> Self {
        let shape = shape.into();
        let data = Buffer::zeros(dtype, shape.size());
        Tensor {
            shape,
            dtype,
            data: Arc::new(RwLock::new(data)),
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    pub fn len(&self) -> usize {
        self.shape.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the storage.
    pub fn read<R>(&self, f: impl FnOnce(&Buffer) -> R) -> R {
        let guard = self.data.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    // The closure must not change the length or variant of the buffer.
    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut Buffer) -> R) -> R {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn get(&self, i: usize) -> Option<Scalar> {
        self.read(|b| b.get(i))
    }

    /// Overwrite element `i` through this handle.
    pub fn set(&self, i: usize, s: Scalar) -> Result<()> {
        if s.dtype() != self.dtype {
            return Err(OpError::dtype("set", self.dtype, s.dtype()));
        }
        let len = self.len();
        self.write(|b| b.set(i, s)).ok_or_else(|| OpError::Computation {
            op: "set".to_string(),
            reason: format!("index {i} out of bounds for {len} elements"),
        })
    }

    /// Mutate the elements in place as a typed slice.
    pub fn write_slice<T: Element, R>(&self, f: impl FnOnce(&mut [T]) -> R) -> Result<R> {
        if T::DTYPE != self.dtype {
            return Err(OpError::dtype("write", self.dtype, T::DTYPE));
        }
        self.write(|b| T::slice_mut(b).map(f))
            .ok_or_else(|| OpError::dtype("write", self.dtype, T::DTYPE))
    }

    pub fn to_vec<T: Element>(&self) -> Option<Vec<T>> {
        self.read(|b| T::slice(b).map(<[T]>::to_vec))
    }

    /// True if both handles point at the same storage.
    pub fn shares_storage(&self, other: &Tensor) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    pub fn deep_clone(&self) -> Tensor {
        Tensor {
            shape: self.shape.clone(),
            dtype: self.dtype,
            data: Arc::new(RwLock::new(self.read(Buffer::clone))),
        }
    }

    /// Canonical encoding: rank, dims, then every element's bits.
    pub(crate) fn write_hash(&self, h: &mut dyn Hasher) {
        write_len(h, self.shape.dims());
        for d in self.shape.as_slice() {
            write_len(h, *d);
        }
        write_str(h, self.dtype.name());
        self.read(|b| b.write_bits(h));
    }
}

impl Typed for Tensor {
    fn dtype(&self) -> Dtype {
        self.dtype
    }

    fn shape(&self) -> Shape {
        self.shape.clone()
    }

    fn type_of(&self) -> Type {
        Type::tensor(self.shape.dims(), self.dtype)
    }
}

impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        if self.shares_storage(other) {
            return self.shape == other.shape;
        }
        self.shape == other.shape && self.read(|a| other.read(|b| a == b))
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.read(|b| {
            f.debug_struct("Tensor")
                .field("shape", &self.shape)
                .field("data", b)
                .finish()
        })
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor{} {} [", self.shape, self.dtype)?;
        for i in 0..self.len() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if let Some(s) = self.get(i) {
                write!(f, "{s}")?;
            }
        }
        write!(f, "]")
    }
}
