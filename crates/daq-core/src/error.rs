//! Error type for frame construction and typed buffer access.

use thiserror::Error;

use crate::element::ElementType;

/// Errors raised by frames, typed buffers and dimension validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The element type is outside the numeric set (or an unknown type code).
    #[error("invalid element type: {0}")]
    InvalidType(String),

    /// A type or shape query was made on a frame that has no buffer selected.
    #[error("no data type selected for this frame")]
    NoDataSelected,

    /// A typed view was requested with a type other than the selected one.
    #[error("type mismatch: frame holds {actual}, requested {requested}")]
    TypeMismatch {
        /// Type currently selected in the buffer.
        actual: ElementType,
        /// Type the caller asked for.
        requested: ElementType,
    },

    /// Buffer length does not match the element count implied by the dimensions.
    #[error("buffer holds {actual} elements but dimensions require {expected}")]
    LengthMismatch {
        /// Element count implied by the dimensions.
        expected: usize,
        /// Element count actually held.
        actual: usize,
    },

    /// More axes than the frame model supports.
    #[error("{ndims} dimensions exceeds the maximum of {max}")]
    TooManyDimensions {
        /// Requested dimensionality.
        ndims: usize,
        /// Supported maximum.
        max: usize,
    },

    /// Arithmetic overflow while sizing a frame.
    #[error("size overflow computing {context}")]
    SizeOverflow {
        /// Which computation overflowed.
        context: &'static str,
    },

    /// The frame would exceed the hard per-frame byte limit.
    #[error("frame of {bytes} bytes exceeds the limit of {max_bytes} bytes")]
    FrameTooLarge {
        /// Requested size.
        bytes: usize,
        /// Hard limit.
        max_bytes: usize,
    },

    /// A dimension descriptor carries a binning factor of zero.
    #[error("binning must be >= 1 (axis {axis})")]
    InvalidBinning {
        /// Offending axis index.
        axis: usize,
    },
}
