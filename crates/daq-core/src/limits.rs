//! Shared hard limits to prevent unbounded allocations.

use crate::dimension::{element_count, NdDimension};
use crate::element::ElementType;
use crate::error::FrameError;

/// Maximum number of axes a frame may carry.
pub const MAX_DIMENSIONS: usize = 10;
/// Maximum allowed frame payload in bytes (default: 2 GiB).
pub const MAX_FRAME_BYTES: usize = 2 * 1024 * 1024 * 1024;

/// Validated frame sizing information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    /// Number of elements.
    pub elements: usize,
    /// Number of payload bytes.
    pub bytes: usize,
}

/// Validate a dimension list and calculate element/byte sizes safely.
pub fn validate_frame_size(
    dims: &[NdDimension],
    element_type: ElementType,
) -> Result<FrameSize, FrameError> {
    if dims.len() > MAX_DIMENSIONS {
        return Err(FrameError::TooManyDimensions {
            ndims: dims.len(),
            max: MAX_DIMENSIONS,
        });
    }

    let width = element_type.numeric_width()?;
    let elements = element_count(dims)?;
    let bytes = elements
        .checked_mul(width)
        .ok_or(FrameError::SizeOverflow {
            context: "frame byte size",
        })?;

    if bytes > MAX_FRAME_BYTES {
        return Err(FrameError::FrameTooLarge {
            bytes,
            max_bytes: MAX_FRAME_BYTES,
        });
    }

    Ok(FrameSize { elements, bytes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::dims_from_sizes;

    #[test]
    fn test_validate_frame_size() {
        let size = validate_frame_size(&dims_from_sizes(&[2048, 2048]), ElementType::UInt16);
        assert_eq!(
            size,
            Ok(FrameSize {
                elements: 2048 * 2048,
                bytes: 2048 * 2048 * 2
            })
        );
    }

    #[test]
    fn test_rejects_string_and_excess_dims() {
        assert!(matches!(
            validate_frame_size(&dims_from_sizes(&[4]), ElementType::String),
            Err(FrameError::InvalidType(_))
        ));
        let dims = dims_from_sizes(&[1; MAX_DIMENSIONS + 1]);
        assert!(matches!(
            validate_frame_size(&dims, ElementType::UInt8),
            Err(FrameError::TooManyDimensions { .. })
        ));
    }

    #[test]
    fn test_rejects_oversized_frame() {
        let dims = dims_from_sizes(&[65_536, 65_536]);
        assert!(matches!(
            validate_frame_size(&dims, ElementType::Float64),
            Err(FrameError::FrameTooLarge { .. })
        ));
    }
}
