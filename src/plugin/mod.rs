//! Frame-processing plugins built on the pool and conversion engine.
//!
//! A plugin receives frames by shared reference and never mutates them. The
//! ROI plugin publishes new frames allocated from a
//! [`FramePool`](daq_pool::FramePool); the rate limiter forwards or drops the
//! frame it was given. Drops bump the plugin's [`PluginCounters`].

pub mod counters;
pub mod rate_limit;
pub mod roi;

pub use counters::{CountersSnapshot, PluginCounters};
pub use rate_limit::{RateLimitConfig, RateLimitMode, RateLimitPlugin, RateLimitStatus};
pub use roi::{AxisStatus, RoiAxis, RoiConfig, RoiPlugin, RoiStatus};
