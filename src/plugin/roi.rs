//! Region-of-interest plugin.
//!
//! Extracts a window from each incoming frame, optionally bins and reverses
//! each axis, converts to a chosen element type and publishes the result as
//! a new shared frame. Axis settings are given in image order (X, Y, then
//! color) whatever the physical layout of an RGB frame.
//!
//! Requested settings are clamped to each frame's actual size before use;
//! the values that were actually applied are reported in [`RoiStatus`].

use std::sync::Arc;

use daq_core::{ElementType, Frame, FrameError, NdDimension};
use daq_pool::{FramePool, PooledFrame, SharedFrame};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::error::{AppResult, DaqError};
use crate::plugin::counters::PluginCounters;

/// `data_type` value meaning "same type as the input frame".
pub const KEEP_INPUT_TYPE: i32 = -1;

/// Requested settings for one image axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoiAxis {
    /// When false the whole axis is passed through unbinned.
    pub enable: bool,
    /// First input element of the window.
    pub min: usize,
    /// Window length in input elements.
    pub size: usize,
    /// Input elements summed into each output element.
    pub bin: usize,
    /// Read the window back to front.
    pub reverse: bool,
    /// Ignore `size` and use the full axis.
    pub auto_size: bool,
}

impl Default for RoiAxis {
    fn default() -> Self {
        Self {
            enable: true,
            min: 0,
            size: 1_000_000,
            bin: 1,
            reverse: false,
            auto_size: false,
        }
    }
}

impl RoiAxis {
    /// Clamp these settings to an axis of `axis_size` elements.
    ///
    /// `min` lands in `[0, axis_size - 1]`, `size` in `[1, axis_size - min]`
    /// and `bin` in `[1, size]`.
    #[must_use]
    pub fn resolve(&self, axis_size: usize) -> NdDimension {
        if !self.enable {
            return NdDimension::new(axis_size).reversed(self.reverse);
        }
        let min = self.min.min(axis_size.saturating_sub(1));
        let requested = if self.auto_size { axis_size } else { self.size };
        let size = requested.max(1).min(axis_size - min);
        let bin = self.bin.max(1).min(size);
        NdDimension::extract(min, size, bin).reversed(self.reverse)
    }
}

/// Plugin settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoiConfig {
    /// Horizontal axis.
    pub x: RoiAxis,
    /// Vertical axis.
    pub y: RoiAxis,
    /// Color axis for RGB frames, third axis otherwise.
    pub z: RoiAxis,
    /// Output element type code, or [`KEEP_INPUT_TYPE`].
    pub data_type: i32,
    /// Divide the binned result by `scale`.
    pub enable_scale: bool,
    /// Divisor applied when scaling is enabled.
    pub scale: f64,
}

impl Default for RoiConfig {
    fn default() -> Self {
        Self {
            x: RoiAxis::default(),
            y: RoiAxis::default(),
            z: RoiAxis::default(),
            data_type: KEEP_INPUT_TYPE,
            enable_scale: false,
            scale: 1.0,
        }
    }
}

impl RoiConfig {
    /// Output element type; `None` keeps the input type.
    pub fn output_type(&self) -> Result<Option<ElementType>, FrameError> {
        if self.data_type == KEEP_INPUT_TYPE {
            return Ok(None);
        }
        let ty = ElementType::try_from(self.data_type)?;
        if ty.is_numeric() {
            Ok(Some(ty))
        } else {
            Err(FrameError::InvalidType(ty.name().to_string()))
        }
    }

    /// Whether frames go through the Float64 scaling path.
    #[must_use]
    pub fn scaling(&self) -> bool {
        self.enable_scale && self.scale != 0.0 && self.scale != 1.0
    }

    fn axes(&self) -> [&RoiAxis; 3] {
        [&self.x, &self.y, &self.z]
    }
}

/// Applied settings for one image axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisStatus {
    /// Size of this axis in the input frame.
    pub max_size: usize,
    /// Clamped window start.
    pub min: usize,
    /// Clamped window length.
    pub size: usize,
    /// Clamped binning factor.
    pub bin: usize,
}

/// What the plugin did with the last frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoiStatus {
    /// Id of the last frame processed.
    pub unique_id: i32,
    /// One entry per input axis, in image order.
    pub axes: Vec<AxisStatus>,
    /// Physical sizes of the published frame.
    pub output_sizes: Vec<usize>,
    /// Element type of the published frame.
    pub output_type: Option<ElementType>,
}

/// Region-of-interest processor.
///
/// Safe to call from several worker threads at once; settings may be changed
/// between frames with [`set_config`](Self::set_config).
#[derive(Debug)]
pub struct RoiPlugin {
    name: String,
    pool: Arc<FramePool>,
    config: RwLock<RoiConfig>,
    counters: PluginCounters,
    status: Mutex<RoiStatus>,
}

impl RoiPlugin {
    /// Plugin drawing its output frames from `pool`.
    pub fn new(name: impl Into<String>, pool: Arc<FramePool>, config: RoiConfig) -> Self {
        Self {
            name: name.into(),
            pool,
            config: RwLock::new(config),
            counters: PluginCounters::new(),
            status: Mutex::new(RoiStatus::default()),
        }
    }

    /// Plugin name used in log fields.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pool output frames come from.
    pub fn pool(&self) -> &Arc<FramePool> {
        &self.pool
    }

    /// Replace the settings; applies from the next frame.
    pub fn set_config(&self, config: RoiConfig) {
        *self.config.write() = config;
    }

    /// Copy of the current settings.
    pub fn config(&self) -> RoiConfig {
        self.config.read().clone()
    }

    /// Arrival and drop counters.
    pub fn counters(&self) -> &PluginCounters {
        &self.counters
    }

    /// Status of the last frame processed successfully.
    pub fn status(&self) -> RoiStatus {
        self.status.lock().clone()
    }

    /// Process one frame.
    ///
    /// On failure the frame is counted as dropped and the error returned;
    /// the input is never modified.
    pub fn process(&self, input: &Frame) -> AppResult<SharedFrame> {
        if !self.counters.record_arrival(input.unique_id) {
            debug!(plugin = %self.name, unique_id = input.unique_id, "Frame arrived out of order");
        }
        let config = self.config();

        match self.extract(input, &config) {
            Ok((output, status)) => {
                *self.status.lock() = status;
                Ok(output.share())
            }
            Err(e) => {
                self.counters.record_drop();
                warn!(
                    plugin = %self.name,
                    unique_id = input.unique_id,
                    error = %e,
                    "Dropping frame"
                );
                Err(e)
            }
        }
    }

    fn extract(
        &self,
        input: &Frame,
        config: &RoiConfig,
    ) -> AppResult<(PooledFrame, RoiStatus)> {
        let ndims = input.ndims();
        if ndims == 0 || ndims > 3 {
            return Err(DaqError::Processing(format!(
                "ROI supports 1 to 3 dimensions, frame {} has {ndims}",
                input.unique_id
            )));
        }
        let output_type = match config.output_type()? {
            Some(ty) => ty,
            None => input.element_type()?,
        };

        let physical = input.xyc_axes();
        let mut request = Vec::with_capacity(ndims);
        let mut axes = Vec::with_capacity(ndims);
        for (semantic, settings) in config.axes().into_iter().take(ndims).enumerate() {
            let axis_size = input.dims[physical[semantic]].size;
            let dim = settings.resolve(axis_size);
            axes.push(AxisStatus {
                max_size: axis_size,
                min: dim.offset,
                size: dim.size,
                bin: dim.binning,
            });
            request.push(dim);
        }

        let output = if config.scaling() {
            trace!(scale = config.scale, "ROI: scaling through Float64");
            let mut scratch = self
                .pool
                .convert_xyc(input, ElementType::Float64, &request)?;
            for value in scratch.view_mut::<f64>()? {
                *value /= config.scale;
            }
            self.pool.convert_type(&scratch, output_type)?
        } else {
            self.pool.convert_xyc(input, output_type, &request)?
        };

        let status = RoiStatus {
            unique_id: input.unique_id,
            axes,
            output_sizes: output.sizes(),
            output_type: Some(output_type),
        };
        Ok((output, status))
    }
}
