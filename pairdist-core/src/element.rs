//! Scalar element types accepted by the distance kernels.
//!
//! Inputs are one of three scalar families. Statistics are always
//! accumulated in `f64`; the final distance narrows back to the input's
//! float family, except for `i8` which always yields `f64`.

use core::fmt;

/// Runtime tag for an [`Element`] type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ElementKind {
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
    /// 8-bit signed integer (genotype calls, small counts).
    I8,
}

impl ElementKind {
    /// Size of one element in bytes.
    pub fn size_of(self) -> usize {
        match self {
            Self::F32 => 4,
            Self::F64 => 8,
            Self::I8 => 1,
        }
    }

    /// The C type name used when specializing device kernels.
    pub fn c_type(self) -> &'static str {
        match self {
            Self::F32 => "float",
            Self::F64 => "double",
            Self::I8 => "signed char",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::F32 => write!(f, "float32"),
            Self::F64 => write!(f, "float64"),
            Self::I8 => write!(f, "int8"),
        }
    }
}

/// A floating-point type a distance can be reported in.
pub trait DistanceValue: Copy + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Narrows (or passes through) an `f64` result.
    fn from_f64(v: f64) -> Self;

    /// Widens to `f64`.
    fn to_f64(self) -> f64;
}

impl DistanceValue for f32 {
    #[inline]
    fn from_f64(v: f64) -> Self {
        v as f32
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl DistanceValue for f64 {
    #[inline]
    fn from_f64(v: f64) -> Self {
        v
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
}

/// An input scalar type.
pub trait Element: Copy + PartialOrd + fmt::Debug + Send + Sync + 'static {
    /// Runtime tag for this type.
    const KIND: ElementKind;

    /// The type final distances are reported in.
    type Output: DistanceValue;

    /// Widens to `f64` for accumulation.
    fn to_f64(self) -> f64;
}

impl Element for f32 {
    const KIND: ElementKind = ElementKind::F32;
    type Output = f32;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl Element for f64 {
    const KIND: ElementKind = ElementKind::F64;
    type Output = f64;

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
}

impl Element for i8 {
    const KIND: ElementKind = ElementKind::I8;
    type Output = f64;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
}
