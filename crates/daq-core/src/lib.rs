//! Core frame types for `frame_daq`.
//!
//! A [`Frame`] is one N-dimensional detector image: axis geometry
//! ([`NdDimension`]), a single selected typed payload ([`TypedBuffer`]),
//! identity and timestamps, and an [`AttributeList`].
//!
//! Geometry is always reported relative to the original detector, so a frame
//! that has been cropped, binned and flipped by two successive stages still
//! says where its pixels came from.
//!
//! # Example
//!
//! ```
//! use daq_core::{dims_from_sizes, ElementType, Frame, TypedBuffer};
//!
//! let frame = Frame::from_parts(
//!     dims_from_sizes(&[4, 2]),
//!     TypedBuffer::from(vec![0u16; 8]),
//! ).unwrap();
//! assert_eq!(frame.element_type(), Ok(ElementType::UInt16));
//! assert_eq!(frame.info().unwrap().total_bytes, 16);
//! ```

pub mod attribute;
pub mod buffer;
pub mod dimension;
pub mod element;
pub mod error;
pub mod frame;
pub mod limits;

pub use attribute::{
    Attribute, AttributeList, AttributeSource, AttributeValue, BayerPattern, ColorMode,
    BAYER_PATTERN, COLOR_MODE,
};
pub use buffer::TypedBuffer;
pub use dimension::{dims_from_sizes, element_count, validate_binning, NdDimension};
pub use element::{CastInto, Element, ElementType};
pub use error::FrameError;
pub use frame::{xyc_axes, AxisInfo, EpochTime, Frame, FrameInfo};
pub use limits::{validate_frame_size, FrameSize, MAX_DIMENSIONS, MAX_FRAME_BYTES};
