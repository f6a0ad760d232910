//! Type conversion, region extraction, binning and reversal between frames.
//!
//! Every conversion allocates a new frame from the pool; the input is never
//! modified. The element loop is written once, generically over the input
//! and output element types, and instantiated for every type pair by
//! matching on both buffers.
//!
//! # Request convention
//!
//! Each requested [`NdDimension`] describes the input samples to read:
//! `offset` and `size` count *input* elements, and every `binning` of them
//! are summed into one output element. The output axis therefore has
//! `size / binning` elements. Offsets in a request are relative to the input
//! frame; the output frame reports its geometry relative to the original
//! source by composing the request onto the input's own geometry.

use std::sync::Arc;

use daq_core::{
    dispatch_buffer, element_count, validate_binning, CastInto, ColorMode, Element, ElementType,
    Frame, FrameError, NdDimension, TypedBuffer, MAX_DIMENSIONS,
};
use tracing::{debug, trace};

use crate::error::PoolError;
use crate::pool::{FramePool, PooledFrame};

/// Per-axis loop parameters for the strided walk.
#[derive(Debug, Clone, Copy)]
struct AxisPlan {
    /// Output elements along this axis.
    size: usize,
    binning: usize,
    /// Input index of the first sample, relative to the enclosing slice.
    start: isize,
    /// Signed input step between consecutive samples.
    inc: isize,
    /// Output step between consecutive output elements.
    out_step: usize,
}

fn plan_axes(input: &[NdDimension], request: &[NdDimension]) -> Vec<AxisPlan> {
    let mut in_step = 1usize;
    let mut out_step = 1usize;
    let mut plan = Vec::with_capacity(request.len());
    for (req, inp) in request.iter().zip(input) {
        let (first, dir) = if req.reverse {
            (req.offset + (req.size * req.binning).saturating_sub(1), -1)
        } else {
            (req.offset, 1)
        };
        plan.push(AxisPlan {
            size: req.size,
            binning: req.binning,
            start: (first * in_step) as isize,
            inc: dir * in_step as isize,
            out_step,
        });
        in_step *= inp.size;
        out_step *= req.size;
    }
    plan
}

/// Sum the selected input samples into `out`, highest axis first.
///
/// `out` must be zeroed. Depth is bounded by [`MAX_DIMENSIONS`].
fn walk<I, O>(
    input: &[I],
    out: &mut [O],
    plan: &[AxisPlan],
    dim: usize,
    in_base: isize,
    out_base: usize,
) where
    I: Element + CastInto<O>,
    O: Element,
{
    let axis = plan[dim];
    let mut i_in = in_base + axis.start;
    let mut i_out = out_base;
    for _ in 0..axis.size {
        for _ in 0..axis.binning {
            if dim == 0 {
                out[i_out].accumulate(input[i_in as usize].cast_into());
            } else {
                walk(input, out, plan, dim - 1, i_in, i_out);
            }
            i_in += axis.inc;
        }
        i_out += axis.out_step;
    }
}

fn cast_all<I, O>(input: &[I], out: &mut [O])
where
    I: Element + CastInto<O>,
    O: Element,
{
    for (o, &i) in out.iter_mut().zip(input) {
        *o = i.cast_into();
    }
}

fn cast_buffer(input: &TypedBuffer, out: &mut TypedBuffer) {
    dispatch_buffer!(input, src => {
        dispatch_buffer!(&mut *out, dst => cast_all(src.as_slice(), dst.as_mut_slice()))
    });
}

fn bin_buffer(input: &TypedBuffer, out: &mut TypedBuffer, plan: &[AxisPlan]) {
    let Some(top) = plan.len().checked_sub(1) else {
        return;
    };
    dispatch_buffer!(input, src => {
        dispatch_buffer!(&mut *out, dst => walk(src.as_slice(), dst.as_mut_slice(), plan, top, 0, 0))
    });
}

/// Validate a request against the input and derive the output axes.
///
/// Returns the request with sizes divided by binning, and whether it selects
/// the input unchanged.
fn resolve_request(
    input: &[NdDimension],
    request: &[NdDimension],
) -> Result<(Vec<NdDimension>, bool), PoolError> {
    if request.len() != input.len() {
        return Err(PoolError::DimensionCountMismatch {
            expected: input.len(),
            actual: request.len(),
        });
    }
    if request.len() > MAX_DIMENSIONS {
        return Err(FrameError::TooManyDimensions {
            ndims: request.len(),
            max: MAX_DIMENSIONS,
        }
        .into());
    }
    validate_binning(request)?;

    let mut unchanged = true;
    let mut resolved = Vec::with_capacity(request.len());
    for (axis, (req, inp)) in request.iter().zip(input).enumerate() {
        let mut out = *req;
        out.size = req.size / req.binning;
        if out.size != inp.size || !out.is_identity() {
            unchanged = false;
        }
        let end = out
            .size
            .checked_mul(out.binning)
            .and_then(|n| n.checked_add(out.offset))
            .ok_or(FrameError::SizeOverflow {
                context: "extraction window",
            })?;
        if end > inp.size {
            return Err(PoolError::RegionOutOfBounds {
                axis,
                end,
                size: inp.size,
            });
        }
        resolved.push(out);
    }
    Ok((resolved, unchanged))
}

impl FramePool {
    /// Convert `input` to `output_type`, extracting, binning and reversing
    /// each axis as described by `output_dims`.
    ///
    /// One descriptor is required per input axis; pass
    /// `NdDimension::new(axis_size)` to keep an axis whole. Identity, both
    /// timestamps and attributes are carried over. If the frame is RGB and
    /// its color axis no longer holds exactly three planes, the output is
    /// marked Mono (the axis itself stays; see
    /// [`convert_xyc`](Self::convert_xyc)).
    ///
    /// Attributes are merged by name into the output frame. A recycled frame
    /// may still hold attributes from its previous use, including a color
    /// mode; build the pool with [`PoolConfig::clear_attributes_on_alloc`]
    /// when the output must carry exactly the input's attributes.
    ///
    /// [`PoolConfig::clear_attributes_on_alloc`]: crate::PoolConfig::clear_attributes_on_alloc
    pub fn convert(
        self: &Arc<Self>,
        input: &Frame,
        output_type: ElementType,
        output_dims: &[NdDimension],
    ) -> Result<PooledFrame, PoolError> {
        if !output_type.is_numeric() {
            return Err(PoolError::InvalidType(output_type));
        }
        let in_buffer = input.buffer()?;
        let expected = element_count(&input.dims)?;
        if in_buffer.len() != expected {
            return Err(FrameError::LengthMismatch {
                expected,
                actual: in_buffer.len(),
            }
            .into());
        }
        let (request, unchanged) = resolve_request(&input.dims, output_dims)?;

        let out_dims: Vec<NdDimension> = request
            .iter()
            .zip(&input.dims)
            .map(|(req, inp)| req.compose(inp))
            .collect();
        let mut out = self.allocate(&out_dims, output_type, 0)?;

        out.copy_identity_from(input);
        input.attributes.copy_into(&mut out.attributes);

        let out_buffer = out.buffer_mut()?;
        if unchanged {
            if in_buffer.element_type() == output_type {
                trace!("convert: bulk copy");
                out_buffer.copy_from(in_buffer);
            } else {
                trace!(from = %in_buffer.element_type(), to = %output_type, "convert: elementwise cast");
                cast_buffer(in_buffer, out_buffer);
            }
        } else {
            trace!(ndims = request.len(), "convert: strided walk");
            out_buffer.zero();
            let plan = plan_axes(&input.dims, &request);
            bin_buffer(in_buffer, out_buffer, &plan);
        }

        if let Some(axis) = out.downgrade_partial_color() {
            debug!(axis, "Color axis no longer holds three planes, output is now Mono");
        }
        Ok(out)
    }

    /// Convert `input` to `output_type` keeping its shape.
    pub fn convert_type(
        self: &Arc<Self>,
        input: &Frame,
        output_type: ElementType,
    ) -> Result<PooledFrame, PoolError> {
        let dims: Vec<NdDimension> = input.dims.iter().map(|d| NdDimension::new(d.size)).collect();
        self.convert(input, output_type, &dims)
    }

    /// Convert with the request given in image order: X, then Y, then color.
    ///
    /// For 3-D RGB frames the descriptors are moved onto the physical axes
    /// the color mode puts X, Y and color on. If the color axis of a 3-D
    /// result has length 1 it is removed, leaving a 2-D Mono frame.
    pub fn convert_xyc(
        self: &Arc<Self>,
        input: &Frame,
        output_type: ElementType,
        xyc_dims: &[NdDimension],
    ) -> Result<PooledFrame, PoolError> {
        let ndims = input.ndims();
        if xyc_dims.len() != ndims {
            return Err(PoolError::DimensionCountMismatch {
                expected: ndims,
                actual: xyc_dims.len(),
            });
        }
        let axes = input.xyc_axes();
        let mut physical = xyc_dims.to_vec();
        if ndims == 3 {
            for (semantic, &dim) in axes.iter().enumerate() {
                physical[dim] = xyc_dims[semantic];
            }
        }

        let mut out = self.convert(input, output_type, &physical)?;
        if out.ndims() == 3 && out.squeeze_axis(axes[2]) {
            out.set_color_mode(ColorMode::Mono);
        }
        Ok(out)
    }
}
