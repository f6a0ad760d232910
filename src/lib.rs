//! Detector frame acquisition middleware.
//!
//! Drivers publish camera frames as typed N-dimensional arrays; plugins
//! consume them, transform them and publish new frames. This crate ties the
//! workspace together:
//!
//! - [`daq_core`]: frames, dimension descriptors, element types, attributes
//! - [`daq_pool`]: the bounded frame pool and the conversion engine
//! - [`config`]: layered TOML + environment configuration
//! - [`logging`]: `tracing` subscriber setup
//! - [`plugin`]: the region-of-interest and rate-limit plugins, per-plugin counters
//!
//! # Example
//!
//! ```
//! use frame_daq::config::DaqConfig;
//! use frame_daq::plugin::{RoiAxis, RoiConfig, RoiPlugin};
//! use frame_daq::{dims_from_sizes, ElementType, FramePool};
//!
//! let config = DaqConfig::default();
//! let pool = FramePool::new(config.pool);
//!
//! // 2x2 binning into Float32
//! let roi = RoiConfig {
//!     x: RoiAxis { bin: 2, ..RoiAxis::default() },
//!     y: RoiAxis { bin: 2, ..RoiAxis::default() },
//!     data_type: ElementType::Float32.code(),
//!     ..RoiConfig::default()
//! };
//! let plugin = RoiPlugin::new("ROI1", pool.clone(), roi);
//!
//! let mut frame = pool.allocate(&dims_from_sizes(&[8, 8]), ElementType::UInt16, 0)?;
//! frame.view_mut::<u16>()?.fill(10);
//! let frame = frame.share();
//!
//! let binned = plugin.process(&frame)?;
//! assert_eq!(binned.sizes(), vec![4, 4]);
//! assert!(binned.view::<f32>()?.iter().all(|&v| v == 40.0));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod plugin;

pub use daq_core;
pub use daq_pool;

pub use daq_core::{
    dims_from_sizes, Attribute, AttributeList, AttributeValue, ColorMode, ElementType, Frame,
    FrameError, FrameInfo, NdDimension, TypedBuffer,
};
pub use daq_pool::{FramePool, PoolConfig, PoolError, PoolReport, PooledFrame, SharedFrame};

pub use config::{ConfigError, DaqConfig};
pub use error::{AppResult, DaqError};
