//! Element types of scalars and tensors.
use core::fmt;

/// The element type of a value.
///
/// The discriminant is the stable tag written into structural hashes; never renumber it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Dtype {
    Float64 = 0,
    Float32 = 1,
    Int64 = 2,
    Int32 = 3,
    Uint8 = 4,
    Bool = 5,
}

impl Dtype {
    pub const ALL: [Dtype; 6] = [
        Dtype::Float64,
        Dtype::Float32,
        Dtype::Int64,
        Dtype::Int32,
        Dtype::Uint8,
        Dtype::Bool,
    ];

    /// The one-byte tag used in canonical encodings.
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Dtype::Float64 => "float64",
            Dtype::Float32 => "float32",
            Dtype::Int64 => "int64",
            Dtype::Int32 => "int32",
            Dtype::Uint8 => "uint8",
            Dtype::Bool => "bool",
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Dtype::Float64 | Dtype::Float32)
    }

    /// Types closed under addition and negation.
    pub fn is_numeric(self) -> bool {
        !matches!(self, Dtype::Bool)
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
