//! Element types and the generic element trait.
//!
//! A frame holds exactly one typed payload chosen at runtime. [`ElementType`]
//! is the runtime tag; [`Element`] is the compile-time side, implemented for
//! the eleven numeric Rust types a buffer can hold. Everything that needs to
//! dispatch on a buffer's type does so with a single `match` over
//! [`TypedBuffer`](crate::buffer::TypedBuffer) and then runs generic code.
//!
//! # Numeric conversion rules
//!
//! [`CastInto`] pins cross-type conversion to Rust `as` semantics:
//!
//! - float → integer truncates toward zero and saturates at the target range
//!   (NaN becomes 0)
//! - integer → narrower integer wraps (two's complement)
//! - integer → float rounds to the nearest representable value
//! - any numeric → `bool` is `value != 0`; `bool` → numeric is 0 or 1

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::buffer::TypedBuffer;
use crate::error::FrameError;

/// Runtime tag for the element type of a frame buffer or attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    /// `bool`, one byte per element.
    Bool,
    /// `i8`
    Int8,
    /// `u8`
    UInt8,
    /// `i16`
    Int16,
    /// `u16`
    UInt16,
    /// `i32`
    Int32,
    /// `u32`
    UInt32,
    /// `i64`
    Int64,
    /// `u64`
    UInt64,
    /// `f32`
    Float32,
    /// `f64`
    Float64,
    /// Dynamic-length string. Valid for attributes only; never binnable.
    String,
}

impl ElementType {
    /// All types that can back a frame buffer.
    pub const NUMERIC: [ElementType; 11] = [
        ElementType::Bool,
        ElementType::Int8,
        ElementType::UInt8,
        ElementType::Int16,
        ElementType::UInt16,
        ElementType::Int32,
        ElementType::UInt32,
        ElementType::Int64,
        ElementType::UInt64,
        ElementType::Float32,
        ElementType::Float64,
    ];

    /// Byte width of one element, or `None` for `String`.
    #[must_use]
    pub const fn byte_width(self) -> Option<usize> {
        match self {
            ElementType::Bool | ElementType::Int8 | ElementType::UInt8 => Some(1),
            ElementType::Int16 | ElementType::UInt16 => Some(2),
            ElementType::Int32 | ElementType::UInt32 | ElementType::Float32 => Some(4),
            ElementType::Int64 | ElementType::UInt64 | ElementType::Float64 => Some(8),
            ElementType::String => None,
        }
    }

    /// Byte width for buffer paths; `String` is rejected.
    pub fn numeric_width(self) -> Result<usize, FrameError> {
        self.byte_width()
            .ok_or_else(|| FrameError::InvalidType(self.name().to_string()))
    }

    /// Whether this type can back a frame buffer.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        !matches!(self, ElementType::String)
    }

    /// Stable integer code (the wire/config representation).
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            ElementType::Bool => 0,
            ElementType::Int8 => 1,
            ElementType::UInt8 => 2,
            ElementType::Int16 => 3,
            ElementType::UInt16 => 4,
            ElementType::Int32 => 5,
            ElementType::UInt32 => 6,
            ElementType::Int64 => 7,
            ElementType::UInt64 => 8,
            ElementType::Float32 => 9,
            ElementType::Float64 => 10,
            ElementType::String => 11,
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ElementType::Bool => "Bool",
            ElementType::Int8 => "Int8",
            ElementType::UInt8 => "UInt8",
            ElementType::Int16 => "Int16",
            ElementType::UInt16 => "UInt16",
            ElementType::Int32 => "Int32",
            ElementType::UInt32 => "UInt32",
            ElementType::Int64 => "Int64",
            ElementType::UInt64 => "UInt64",
            ElementType::Float32 => "Float32",
            ElementType::Float64 => "Float64",
            ElementType::String => "String",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<i32> for ElementType {
    type Error = FrameError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ElementType::Bool),
            1 => Ok(ElementType::Int8),
            2 => Ok(ElementType::UInt8),
            3 => Ok(ElementType::Int16),
            4 => Ok(ElementType::UInt16),
            5 => Ok(ElementType::Int32),
            6 => Ok(ElementType::UInt32),
            7 => Ok(ElementType::Int64),
            8 => Ok(ElementType::UInt64),
            9 => Ok(ElementType::Float32),
            10 => Ok(ElementType::Float64),
            11 => Ok(ElementType::String),
            other => Err(FrameError::InvalidType(format!("type code {other}"))),
        }
    }
}

/// A numeric element that can live in a [`TypedBuffer`].
pub trait Element: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Runtime tag for this type.
    const TYPE: ElementType;

    /// Add `other` into `self` for binning. Integers wrap, floats add, booleans OR.
    fn accumulate(&mut self, other: Self);

    /// Borrow the buffer as a slice of `Self` if that type is selected.
    fn view(buffer: &TypedBuffer) -> Option<&[Self]>;

    /// Mutably borrow the buffer as a slice of `Self` if that type is selected.
    fn view_mut(buffer: &mut TypedBuffer) -> Option<&mut [Self]>;

    /// Wrap an owned vector as a buffer.
    fn into_buffer(data: Vec<Self>) -> TypedBuffer;
}

/// Value conversion between element types following `as` semantics.
pub trait CastInto<T> {
    /// Convert `self` to `T`.
    fn cast_into(self) -> T;
}

macro_rules! impl_element {
    ($($ty:ty => $variant:ident, $acc:expr);* $(;)?) => {
        $(
            impl Element for $ty {
                const TYPE: ElementType = ElementType::$variant;

                #[inline]
                fn accumulate(&mut self, other: Self) {
                    let acc: fn(&mut $ty, $ty) = $acc;
                    acc(self, other);
                }

                fn view(buffer: &TypedBuffer) -> Option<&[Self]> {
                    match buffer {
                        TypedBuffer::$variant(v) => Some(v.as_slice()),
                        _ => None,
                    }
                }

                fn view_mut(buffer: &mut TypedBuffer) -> Option<&mut [Self]> {
                    match buffer {
                        TypedBuffer::$variant(v) => Some(v.as_mut_slice()),
                        _ => None,
                    }
                }

                fn into_buffer(data: Vec<Self>) -> TypedBuffer {
                    TypedBuffer::$variant(data)
                }
            }
        )*
    };
}

impl_element! {
    bool => Bool, |a, b| *a |= b;
    i8 => Int8, |a, b| *a = a.wrapping_add(b);
    u8 => UInt8, |a, b| *a = a.wrapping_add(b);
    i16 => Int16, |a, b| *a = a.wrapping_add(b);
    u16 => UInt16, |a, b| *a = a.wrapping_add(b);
    i32 => Int32, |a, b| *a = a.wrapping_add(b);
    u32 => UInt32, |a, b| *a = a.wrapping_add(b);
    i64 => Int64, |a, b| *a = a.wrapping_add(b);
    u64 => UInt64, |a, b| *a = a.wrapping_add(b);
    f32 => Float32, |a, b| *a += b;
    f64 => Float64, |a, b| *a += b;
}

macro_rules! impl_cast_numeric {
    ($($src:ty),*) => {
        $(
            impl_cast_numeric!(@row $src; i8, u8, i16, u16, i32, u32, i64, u64, f32, f64);

            impl CastInto<bool> for $src {
                #[inline]
                fn cast_into(self) -> bool {
                    self != <$src as Default>::default()
                }
            }

            impl CastInto<$src> for bool {
                #[inline]
                fn cast_into(self) -> $src {
                    u8::from(self) as $src
                }
            }
        )*
    };
    (@row $src:ty; $($dst:ty),*) => {
        $(
            impl CastInto<$dst> for $src {
                #[inline]
                fn cast_into(self) -> $dst {
                    self as $dst
                }
            }
        )*
    };
}

impl_cast_numeric!(i8, u8, i16, u16, i32, u32, i64, u64, f32, f64);

impl CastInto<bool> for bool {
    #[inline]
    fn cast_into(self) -> bool {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes_roundtrip() {
        for ty in ElementType::NUMERIC {
            assert_eq!(ElementType::try_from(ty.code()), Ok(ty));
        }
        assert_eq!(ElementType::try_from(11), Ok(ElementType::String));
        assert!(matches!(
            ElementType::try_from(12),
            Err(FrameError::InvalidType(_))
        ));
        assert!(ElementType::try_from(-1).is_err());
    }

    #[test]
    fn test_byte_widths() {
        assert_eq!(ElementType::Bool.byte_width(), Some(1));
        assert_eq!(ElementType::UInt16.byte_width(), Some(2));
        assert_eq!(ElementType::Float32.byte_width(), Some(4));
        assert_eq!(ElementType::UInt64.byte_width(), Some(8));
        assert_eq!(ElementType::String.byte_width(), None);
        assert!(ElementType::String.numeric_width().is_err());
    }

    #[test]
    fn test_float_to_int_truncates_toward_zero() {
        let a: i32 = 1.9f64.cast_into();
        let b: i32 = (-1.9f64).cast_into();
        assert_eq!((a, b), (1, -1));
    }

    #[test]
    fn test_float_to_int_saturates() {
        let big: u8 = 300.0f32.cast_into();
        let neg: u8 = (-5.0f64).cast_into();
        let nan: i16 = f64::NAN.cast_into();
        assert_eq!((big, neg, nan), (255, 0, 0));
    }

    #[test]
    fn test_integer_narrowing_wraps() {
        let a: u8 = 257i32.cast_into();
        let b: i8 = 200u16.cast_into();
        let c: u16 = (-1i32).cast_into();
        assert_eq!((a, b, c), (1, -56, u16::MAX));
    }

    #[test]
    fn test_bool_conversions() {
        let t: f64 = true.cast_into();
        let f: u32 = false.cast_into();
        let nz: bool = 0.5f32.cast_into();
        let z: bool = 0i64.cast_into();
        assert_eq!((t, f, nz, z), (1.0, 0, true, false));
    }

    #[test]
    fn test_accumulate_semantics() {
        let mut a = 250u8;
        a.accumulate(10);
        assert_eq!(a, 4);

        let mut b = false;
        b.accumulate(true);
        b.accumulate(false);
        assert!(b);

        let mut c = 1.5f64;
        c.accumulate(2.25);
        assert_eq!(c, 3.75);
    }
}
