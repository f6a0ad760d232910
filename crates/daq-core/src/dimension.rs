//! Per-axis geometry descriptor.
//!
//! `offset`, `binning` and `reverse` are cumulative: they describe the axis
//! relative to the original data source (the detector), not relative to the
//! stage that produced the frame. When a conversion extracts a region from an
//! already-extracted frame, offsets add, binning multiplies and reversal
//! toggles (see [`NdDimension::compose`]).

use serde::{Deserialize, Serialize};

use crate::error::FrameError;

/// Geometry of one frame axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NdDimension {
    /// Number of elements along this axis.
    pub size: usize,
    /// Number of elements along this axis in the original source.
    pub full_size: usize,
    /// Offset relative to the first element of the original source.
    pub offset: usize,
    /// Summation factor relative to the original source (1 = no binning).
    pub binning: usize,
    /// Orientation relative to the original source.
    pub reverse: bool,
}

impl Default for NdDimension {
    fn default() -> Self {
        Self::new(0)
    }
}

impl NdDimension {
    /// An unbinned, unreversed axis of `size` elements starting at the origin.
    #[must_use]
    pub const fn new(size: usize) -> Self {
        Self {
            size,
            full_size: size,
            offset: 0,
            binning: 1,
            reverse: false,
        }
    }

    /// An extraction request: take `size` source elements starting at `offset`
    /// and collapse every `binning` of them into one output element.
    #[must_use]
    pub const fn extract(offset: usize, size: usize, binning: usize) -> Self {
        Self {
            size,
            full_size: size,
            offset,
            binning,
            reverse: false,
        }
    }

    /// Builder-style reversal flag.
    #[must_use]
    pub const fn reversed(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// Builder-style full-size override.
    #[must_use]
    pub const fn with_full_size(mut self, full_size: usize) -> Self {
        self.full_size = full_size;
        self
    }

    /// True when this descriptor selects the whole axis unchanged.
    #[must_use]
    pub const fn is_identity(&self) -> bool {
        self.offset == 0 && self.binning == 1 && !self.reverse
    }

    /// The same axis with offset, binning and reversal stripped.
    #[must_use]
    pub const fn plain(&self) -> Self {
        Self {
            size: self.size,
            full_size: self.full_size,
            offset: 0,
            binning: 1,
            reverse: false,
        }
    }

    /// Compose this stage's request onto the geometry of the input axis.
    ///
    /// `self` is the post-binning output axis requested relative to `input`;
    /// the result is expressed relative to the original source.
    #[must_use]
    pub const fn compose(&self, input: &NdDimension) -> Self {
        Self {
            size: self.size,
            full_size: input.full_size,
            offset: input.offset + self.offset,
            binning: input.binning * self.binning,
            reverse: input.reverse ^ self.reverse,
        }
    }
}

/// Total element count for a dimension list, with overflow checking.
///
/// An empty list describes zero elements.
pub fn element_count(dims: &[NdDimension]) -> Result<usize, FrameError> {
    if dims.is_empty() {
        return Ok(0);
    }
    dims.iter().try_fold(1usize, |acc, d| {
        acc.checked_mul(d.size).ok_or(FrameError::SizeOverflow {
            context: "frame element count",
        })
    })
}

/// Reject descriptors with a zero binning factor.
pub fn validate_binning(dims: &[NdDimension]) -> Result<(), FrameError> {
    match dims.iter().position(|d| d.binning == 0) {
        Some(axis) => Err(FrameError::InvalidBinning { axis }),
        None => Ok(()),
    }
}

/// Build plain descriptors from a list of axis sizes.
#[must_use]
pub fn dims_from_sizes(sizes: &[usize]) -> Vec<NdDimension> {
    sizes.iter().copied().map(NdDimension::new).collect()
}
