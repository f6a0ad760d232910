//! The frame: one typed, attributed, timestamped N-dimensional array.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::attribute::{AttributeList, AttributeValue, ColorMode, COLOR_MODE};
use crate::buffer::TypedBuffer;
use crate::dimension::{element_count, NdDimension};
use crate::element::{Element, ElementType};
use crate::error::FrameError;
use crate::limits::MAX_DIMENSIONS;

/// Seconds + nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash, Serialize, Deserialize)]
pub struct EpochTime {
    /// Whole seconds.
    pub secs: i64,
    /// Sub-second part, `< 1_000_000_000`.
    pub nanos: u32,
}

impl EpochTime {
    /// Current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self::from_datetime(&Utc::now())
    }

    /// Convert from a chrono timestamp.
    #[must_use]
    pub fn from_datetime(dt: &DateTime<Utc>) -> Self {
        Self {
            secs: dt.timestamp(),
            nanos: dt.timestamp_subsec_nanos(),
        }
    }

    /// Convert to a chrono timestamp; `None` if out of chrono's range.
    #[must_use]
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.secs, self.nanos).single()
    }

    /// Floating-point seconds.
    #[must_use]
    pub fn as_secs_f64(self) -> f64 {
        self.secs as f64 + f64::from(self.nanos) * 1e-9
    }
}

/// Role, size and stride of one semantic axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AxisInfo {
    /// Physical dimension index.
    pub dim: usize,
    /// Number of elements.
    pub size: usize,
    /// Elements between neighbours along this axis.
    pub stride: usize,
}

/// Derived geometry of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameInfo {
    /// Total element count.
    pub elements: usize,
    /// Bytes per element.
    pub bytes_per_element: usize,
    /// `elements * bytes_per_element`.
    pub total_bytes: usize,
    /// Color mode from the frame's attributes.
    pub color_mode: ColorMode,
    /// X axis, if the frame has at least one dimension.
    pub x: Option<AxisInfo>,
    /// Y axis, if the frame has at least two dimensions.
    pub y: Option<AxisInfo>,
    /// Color axis, only for 3-D frames.
    pub color: Option<AxisInfo>,
}

/// Physical axis indices `[x, y, color]` for a 3-D frame in `mode`.
#[must_use]
pub const fn xyc_axes(mode: ColorMode) -> [usize; 3] {
    match mode {
        ColorMode::Rgb1 => [1, 2, 0],
        ColorMode::Rgb2 => [0, 2, 1],
        _ => [0, 1, 2],
    }
}

/// An N-dimensional array with metadata.
///
/// Exactly one element type is selected at a time; a freshly pooled frame has
/// none until the buffer is set, and type queries report
/// [`FrameError::NoDataSelected`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    /// Caller-assigned sequence number.
    pub unique_id: i32,
    /// Acquisition time in seconds.
    pub time_stamp: f64,
    /// Acquisition wall-clock time.
    pub epoch_ts: EpochTime,
    /// Compressed payload size. Bookkeeping only.
    pub compressed_size: usize,
    /// Uncompressed payload size. Bookkeeping only.
    pub uncompressed_size: usize,
    /// Axis geometry, fastest-varying first.
    pub dims: Vec<NdDimension>,
    /// Attribute map.
    pub attributes: AttributeList,
    data: Option<TypedBuffer>,
}

impl Frame {
    /// An empty frame with no dimensions and no selected type.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap externally produced data as a frame.
    ///
    /// The buffer length must match the element count implied by `dims`.
    pub fn from_parts(dims: Vec<NdDimension>, data: TypedBuffer) -> Result<Self, FrameError> {
        if dims.len() > MAX_DIMENSIONS {
            return Err(FrameError::TooManyDimensions {
                ndims: dims.len(),
                max: MAX_DIMENSIONS,
            });
        }
        let expected = element_count(&dims)?;
        if data.len() != expected {
            return Err(FrameError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        let uncompressed_size = data.byte_len();
        Ok(Self {
            dims,
            uncompressed_size,
            data: Some(data),
            ..Self::default()
        })
    }

    /// Number of dimensions.
    #[must_use]
    pub fn ndims(&self) -> usize {
        self.dims.len()
    }

    /// Axis sizes in dimension order.
    #[must_use]
    pub fn sizes(&self) -> Vec<usize> {
        self.dims.iter().map(|d| d.size).collect()
    }

    /// The selected element type.
    pub fn element_type(&self) -> Result<ElementType, FrameError> {
        self.buffer().map(TypedBuffer::element_type)
    }

    /// The selected buffer.
    pub fn buffer(&self) -> Result<&TypedBuffer, FrameError> {
        self.data.as_ref().ok_or(FrameError::NoDataSelected)
    }

    /// The selected buffer, mutably.
    pub fn buffer_mut(&mut self) -> Result<&mut TypedBuffer, FrameError> {
        self.data.as_mut().ok_or(FrameError::NoDataSelected)
    }

    /// The buffer slot, selected or not.
    #[must_use]
    pub fn data(&self) -> Option<&TypedBuffer> {
        self.data.as_ref()
    }

    /// Select `data` as the payload, dropping any previous selection.
    pub fn set_data(&mut self, data: TypedBuffer) {
        self.data = Some(data);
    }

    /// Remove and return the payload, leaving no type selected.
    pub fn take_data(&mut self) -> Option<TypedBuffer> {
        self.data.take()
    }

    /// Typed view of the payload.
    pub fn view<T: Element>(&self) -> Result<&[T], FrameError> {
        self.buffer()?.view()
    }

    /// Mutable typed view of the payload.
    pub fn view_mut<T: Element>(&mut self) -> Result<&mut [T], FrameError> {
        self.buffer_mut()?.view_mut()
    }

    /// Zero the payload.
    pub fn zero_data(&mut self) -> Result<(), FrameError> {
        self.buffer_mut()?.zero();
        Ok(())
    }

    /// Color mode from the `ColorMode` attribute; absent or unknown is Mono.
    #[must_use]
    pub fn color_mode(&self) -> ColorMode {
        self.attributes
            .find(COLOR_MODE)
            .and_then(|a| a.value.as_i64())
            .and_then(ColorMode::from_code)
            .unwrap_or_default()
    }

    /// Set the `ColorMode` attribute.
    pub fn set_color_mode(&mut self, mode: ColorMode) {
        self.attributes.set(COLOR_MODE, mode.to_attribute());
    }

    /// Physical `[x, y, color]` axis indices for this frame.
    ///
    /// Non-3-D frames always use `[0, 1, 2]`.
    #[must_use]
    pub fn xyc_axes(&self) -> [usize; 3] {
        if self.ndims() == 3 {
            xyc_axes(self.color_mode())
        } else {
            [0, 1, 2]
        }
    }

    /// Derived geometry.
    pub fn info(&self) -> Result<FrameInfo, FrameError> {
        let bytes_per_element = self.element_type()?.numeric_width()?;
        let elements = element_count(&self.dims)?;
        let total_bytes = elements
            .checked_mul(bytes_per_element)
            .ok_or(FrameError::SizeOverflow {
                context: "frame info bytes",
            })?;

        let axis = |dim: usize| -> Option<AxisInfo> {
            let size = self.dims.get(dim)?.size;
            let stride = self.dims[..dim].iter().map(|d| d.size).product();
            Some(AxisInfo { dim, size, stride })
        };

        let [x, y, c] = self.xyc_axes();
        Ok(FrameInfo {
            elements,
            bytes_per_element,
            total_bytes,
            color_mode: self.color_mode(),
            x: axis(x),
            y: axis(y),
            color: if self.ndims() == 3 { axis(c) } else { None },
        })
    }

    /// Remove a length-1 axis. Returns `false` and leaves the frame unchanged
    /// if `axis` is absent or longer than one element.
    pub fn squeeze_axis(&mut self, axis: usize) -> bool {
        if self.dims.get(axis).is_some_and(|d| d.size == 1) {
            self.dims.remove(axis);
            true
        } else {
            false
        }
    }

    /// Mark an RGB frame whose color axis no longer holds three planes as
    /// Mono.
    ///
    /// Returns the physical index of that axis; the axis itself stays in
    /// place. Callers squeeze it when it has length 1.
    pub fn downgrade_partial_color(&mut self) -> Option<usize> {
        if self.ndims() != 3 {
            return None;
        }
        let axis = self.color_mode().color_axis()?;
        if self.dims[axis].size == 3 {
            return None;
        }
        self.set_color_mode(ColorMode::Mono);
        Some(axis)
    }

    /// Clear identity, timestamps and geometry, keeping buffer storage and
    /// attributes. Used when a frame goes back to a free list.
    pub fn reset_metadata(&mut self) {
        self.unique_id = 0;
        self.time_stamp = 0.0;
        self.epoch_ts = EpochTime::default();
        self.compressed_size = 0;
        self.uncompressed_size = 0;
        self.dims.clear();
    }

    /// Copy identity and timestamps from `other`.
    pub fn copy_identity_from(&mut self, other: &Frame) {
        self.unique_id = other.unique_id;
        self.time_stamp = other.time_stamp;
        self.epoch_ts = other.epoch_ts;
    }

    /// Shorthand for setting an attribute value by name.
    pub fn set_attribute(&mut self, name: &str, value: AttributeValue) {
        self.attributes.set(name, value);
    }
}
