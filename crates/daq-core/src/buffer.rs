//! Typed, contiguous element storage for one frame.

use crate::element::{Element, ElementType};
use crate::error::FrameError;

/// Owned element buffer; exactly one element type is selected at a time.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedBuffer {
    /// `bool` elements
    Bool(Vec<bool>),
    /// `i8` elements
    Int8(Vec<i8>),
    /// `u8` elements
    UInt8(Vec<u8>),
    /// `i16` elements
    Int16(Vec<i16>),
    /// `u16` elements
    UInt16(Vec<u16>),
    /// `i32` elements
    Int32(Vec<i32>),
    /// `u32` elements
    UInt32(Vec<u32>),
    /// `i64` elements
    Int64(Vec<i64>),
    /// `u64` elements
    UInt64(Vec<u64>),
    /// `f32` elements
    Float32(Vec<f32>),
    /// `f64` elements
    Float64(Vec<f64>),
}

/// Run `$body` with `$v` bound to the inner `Vec` of a [`TypedBuffer`],
/// whatever its element type.
///
/// The body is monomorphised once per element type, so generic helpers can be
/// called on `$v` directly.
#[macro_export]
macro_rules! dispatch_buffer {
    ($buf:expr, $v:ident => $body:expr) => {
        match $buf {
            $crate::buffer::TypedBuffer::Bool($v) => $body,
            $crate::buffer::TypedBuffer::Int8($v) => $body,
            $crate::buffer::TypedBuffer::UInt8($v) => $body,
            $crate::buffer::TypedBuffer::Int16($v) => $body,
            $crate::buffer::TypedBuffer::UInt16($v) => $body,
            $crate::buffer::TypedBuffer::Int32($v) => $body,
            $crate::buffer::TypedBuffer::UInt32($v) => $body,
            $crate::buffer::TypedBuffer::Int64($v) => $body,
            $crate::buffer::TypedBuffer::UInt64($v) => $body,
            $crate::buffer::TypedBuffer::Float32($v) => $body,
            $crate::buffer::TypedBuffer::Float64($v) => $body,
        }
    };
}

fn zero_vec<T: Element>(len: usize) -> Vec<T> {
    vec![T::default(); len]
}

impl TypedBuffer {
    /// A zero-filled buffer of `len` elements.
    pub fn zeroed(element_type: ElementType, len: usize) -> Result<Self, FrameError> {
        Ok(match element_type {
            ElementType::Bool => TypedBuffer::Bool(zero_vec(len)),
            ElementType::Int8 => TypedBuffer::Int8(zero_vec(len)),
            ElementType::UInt8 => TypedBuffer::UInt8(zero_vec(len)),
            ElementType::Int16 => TypedBuffer::Int16(zero_vec(len)),
            ElementType::UInt16 => TypedBuffer::UInt16(zero_vec(len)),
            ElementType::Int32 => TypedBuffer::Int32(zero_vec(len)),
            ElementType::UInt32 => TypedBuffer::UInt32(zero_vec(len)),
            ElementType::Int64 => TypedBuffer::Int64(zero_vec(len)),
            ElementType::UInt64 => TypedBuffer::UInt64(zero_vec(len)),
            ElementType::Float32 => TypedBuffer::Float32(zero_vec(len)),
            ElementType::Float64 => TypedBuffer::Float64(zero_vec(len)),
            ElementType::String => {
                return Err(FrameError::InvalidType(element_type.name().to_string()))
            }
        })
    }

    /// The selected element type.
    #[must_use]
    pub fn element_type(&self) -> ElementType {
        match self {
            TypedBuffer::Bool(_) => ElementType::Bool,
            TypedBuffer::Int8(_) => ElementType::Int8,
            TypedBuffer::UInt8(_) => ElementType::UInt8,
            TypedBuffer::Int16(_) => ElementType::Int16,
            TypedBuffer::UInt16(_) => ElementType::UInt16,
            TypedBuffer::Int32(_) => ElementType::Int32,
            TypedBuffer::UInt32(_) => ElementType::UInt32,
            TypedBuffer::Int64(_) => ElementType::Int64,
            TypedBuffer::UInt64(_) => ElementType::UInt64,
            TypedBuffer::Float32(_) => ElementType::Float32,
            TypedBuffer::Float64(_) => ElementType::Float64,
        }
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        dispatch_buffer!(self, v => v.len())
    }

    /// True when the buffer holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.len() * self.element_width()
    }

    /// Bytes of storage reserved, which may exceed [`byte_len`](Self::byte_len).
    #[must_use]
    pub fn capacity_bytes(&self) -> usize {
        dispatch_buffer!(self, v => v.capacity()) * self.element_width()
    }

    fn element_width(&self) -> usize {
        // Buffers never hold strings, so a width always exists.
        self.element_type().byte_width().unwrap_or(1)
    }

    /// Raw native-endian view of the payload.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        dispatch_buffer!(self, v => bytemuck::cast_slice(v.as_slice()))
    }

    /// Set every element to zero.
    pub fn zero(&mut self) {
        dispatch_buffer!(self, v => v.fill(Default::default()));
    }

    /// Resize to `len` elements of `element_type`.
    ///
    /// Storage is kept when the type is unchanged; shrinking never releases
    /// capacity and growing allocates exactly `len` elements. A type change
    /// replaces the storage. Contents are not guaranteed to be zero.
    pub fn reshape(&mut self, element_type: ElementType, len: usize) -> Result<(), FrameError> {
        if self.element_type() == element_type {
            dispatch_buffer!(self, v => {
                v.reserve_exact(len.saturating_sub(v.len()));
                v.resize(len, Default::default());
            });
            Ok(())
        } else {
            *self = Self::zeroed(element_type, len)?;
            Ok(())
        }
    }

    /// Make room for `additional` more elements without changing the length.
    pub fn reserve(&mut self, additional: usize) {
        dispatch_buffer!(self, v => v.reserve_exact(additional));
    }

    /// Typed view, or `TypeMismatch` when another type is selected.
    pub fn view<T: Element>(&self) -> Result<&[T], FrameError> {
        T::view(self).ok_or(FrameError::TypeMismatch {
            actual: self.element_type(),
            requested: T::TYPE,
        })
    }

    /// Mutable typed view, or `TypeMismatch` when another type is selected.
    pub fn view_mut<T: Element>(&mut self) -> Result<&mut [T], FrameError> {
        let actual = self.element_type();
        T::view_mut(self).ok_or(FrameError::TypeMismatch {
            actual,
            requested: T::TYPE,
        })
    }

    /// Overwrite this buffer with `other`, reusing storage when types match.
    pub fn copy_from(&mut self, other: &TypedBuffer) {
        match (&mut *self, other) {
            (TypedBuffer::Bool(d), TypedBuffer::Bool(s)) => d.clone_from(s),
            (TypedBuffer::Int8(d), TypedBuffer::Int8(s)) => d.clone_from(s),
            (TypedBuffer::UInt8(d), TypedBuffer::UInt8(s)) => d.clone_from(s),
            (TypedBuffer::Int16(d), TypedBuffer::Int16(s)) => d.clone_from(s),
            (TypedBuffer::UInt16(d), TypedBuffer::UInt16(s)) => d.clone_from(s),
            (TypedBuffer::Int32(d), TypedBuffer::Int32(s)) => d.clone_from(s),
            (TypedBuffer::UInt32(d), TypedBuffer::UInt32(s)) => d.clone_from(s),
            (TypedBuffer::Int64(d), TypedBuffer::Int64(s)) => d.clone_from(s),
            (TypedBuffer::UInt64(d), TypedBuffer::UInt64(s)) => d.clone_from(s),
            (TypedBuffer::Float32(d), TypedBuffer::Float32(s)) => d.clone_from(s),
            (TypedBuffer::Float64(d), TypedBuffer::Float64(s)) => d.clone_from(s),
            (dst, src) => *dst = src.clone(),
        }
    }
}

impl<T: Element> From<Vec<T>> for TypedBuffer {
    fn from(data: Vec<T>) -> Self {
        T::into_buffer(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed_and_lengths() {
        let buf = TypedBuffer::zeroed(ElementType::UInt16, 8).unwrap();
        assert_eq!(buf.element_type(), ElementType::UInt16);
        assert_eq!(buf.len(), 8);
        assert_eq!(buf.byte_len(), 16);
        assert!(buf.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_string_buffer_rejected() {
        assert!(matches!(
            TypedBuffer::zeroed(ElementType::String, 4),
            Err(FrameError::InvalidType(_))
        ));
    }

    #[test]
    fn test_reshape_keeps_storage_for_same_type() {
        let mut buf = TypedBuffer::from(vec![1u32; 1024]);
        let before = buf.capacity_bytes();
        buf.reshape(ElementType::UInt32, 16).unwrap();
        assert_eq!(buf.len(), 16);
        assert_eq!(buf.capacity_bytes(), before);

        buf.reshape(ElementType::Float64, 4).unwrap();
        assert_eq!(buf.element_type(), ElementType::Float64);
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn test_growth_is_exact() {
        let mut buf = TypedBuffer::zeroed(ElementType::UInt8, 100).unwrap();
        buf.reshape(ElementType::UInt8, 101).unwrap();
        assert_eq!(buf.capacity_bytes(), 101);

        buf.reserve(3);
        assert_eq!(buf.len(), 101);
        assert_eq!(buf.capacity_bytes(), 104);
    }

    #[test]
    fn test_typed_views() {
        let mut buf = TypedBuffer::from(vec![1i16, 2, 3]);
        assert_eq!(buf.view::<i16>().unwrap(), &[1, 2, 3]);
        assert_eq!(
            buf.view::<u16>(),
            Err(FrameError::TypeMismatch {
                actual: ElementType::Int16,
                requested: ElementType::UInt16
            })
        );
        buf.view_mut::<i16>().unwrap()[0] = 9;
        buf.zero();
        assert_eq!(buf.view::<i16>().unwrap(), &[0, 0, 0]);
    }

    #[test]
    fn test_bool_bytes() {
        let buf = TypedBuffer::from(vec![true, false, true]);
        assert_eq!(buf.as_bytes(), &[1, 0, 1]);
    }

    #[test]
    fn test_copy_from_across_types() {
        let mut dst = TypedBuffer::from(vec![0u8; 2]);
        dst.copy_from(&TypedBuffer::from(vec![1.5f32, 2.5]));
        assert_eq!(dst.view::<f32>().unwrap(), &[1.5, 2.5]);
    }
}
