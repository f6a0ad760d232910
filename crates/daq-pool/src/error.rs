//! Errors returned by the frame pool and the conversion engine.

use daq_core::{ElementType, FrameError};
use thiserror::Error;

/// Allocation and conversion failures.
///
/// None of these are fatal: callers drop the frame they were working on,
/// count it, and carry on with the next one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// A new frame was needed but the buffer-count ceiling is reached.
    #[error("reached limit of {max_buffers} buffers (memory use={memory_size}/{max_memory} bytes)")]
    CapacityExceeded {
        /// Configured ceiling.
        max_buffers: usize,
        /// Accounted bytes at the time of the request.
        memory_size: usize,
        /// Configured byte ceiling.
        max_memory: usize,
    },

    /// Growing a buffer would push accounted memory past the ceiling.
    #[error("no memory available: need {requested} more bytes, using {memory_size}/{max_memory}")]
    OutOfMemory {
        /// Additional bytes the allocation needed.
        requested: usize,
        /// Accounted bytes at the time of the request.
        memory_size: usize,
        /// Configured byte ceiling.
        max_memory: usize,
    },

    /// The element type cannot back a frame buffer.
    #[error("element type {0} cannot be pooled")]
    InvalidType(ElementType),

    /// An explicit byte size was given that cannot hold the requested dimensions.
    #[error("required size={required} passed size={passed} is too small")]
    RequiredSizeTooSmall {
        /// Bytes implied by dimensions and element type.
        required: usize,
        /// Bytes the caller asked for.
        passed: usize,
    },

    /// One descriptor per input axis is required.
    #[error("got {actual} dimension descriptors for a {expected}-dimensional frame")]
    DimensionCountMismatch {
        /// Input dimensionality.
        expected: usize,
        /// Descriptors supplied.
        actual: usize,
    },

    /// The extraction window runs past the end of the input axis.
    #[error("axis {axis}: region ends at {end} but the input axis has {size} elements")]
    RegionOutOfBounds {
        /// Axis index.
        axis: usize,
        /// `offset + size * binning` of the request.
        end: usize,
        /// Input axis length.
        size: usize,
    },

    /// Frame-level validation failed.
    #[error(transparent)]
    Frame(#[from] FrameError),
}
