//! Layered configuration using Figment
//!
//! Configuration is loaded from:
//! 1. `config/frame_daq.toml` (base configuration)
//! 2. Environment variables (prefixed with `FRAMEDAQ_`, `__` separates nested keys)
//!
//! Every section and field has a default, so an empty or missing file yields a
//! usable configuration: an unlimited pool, a full-frame pass-through ROI and
//! no rate limiting.
//!
//! # Environment Variable Overrides
//!
//! ```text
//! FRAMEDAQ_APPLICATION__LOG_LEVEL=debug
//! FRAMEDAQ_POOL__MAX_BUFFERS=50
//! FRAMEDAQ_ROI__X__BIN=2
//! FRAMEDAQ_RATE_LIMIT__MODE=array_rate
//! ```
//!
//! # Example
//!
//! ```no_run
//! use frame_daq::config::DaqConfig;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = DaqConfig::load()?;
//!     println!("Application: {}", config.application.name);
//!     println!("Pool ceiling: {} buffers", config.pool.max_buffers);
//!     Ok(())
//! }
//! ```

use std::path::Path;

use daq_pool::PoolConfig;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::plugin::rate_limit::{RateLimitConfig, RateLimitMode};
use crate::plugin::roi::RoiConfig;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/frame_daq.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "FRAMEDAQ_";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File or environment could not be parsed.
    #[error("Configuration load error: {0}")]
    LoadError(#[from] figment::Error),
    /// A value is out of range.
    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaqConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Frame pool ceilings
    #[serde(default)]
    pub pool: PoolConfig,
    /// Region-of-interest plugin settings
    #[serde(default)]
    pub roi: RoiConfig,
    /// Rate-limit plugin settings
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text
    #[serde(default)]
    pub log_json: bool,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_name() -> String {
    "frame_daq".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ============================================================================
// Configuration Loading and Validation
// ============================================================================

impl DaqConfig {
    /// Load configuration from `config/frame_daq.toml` and environment variables
    ///
    /// Environment variables take precedence over the file. After loading,
    /// configuration is validated.
    ///
    /// # Errors
    ///
    /// Returns a ConfigError if the file cannot be parsed or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// A missing file is not an error; defaults and environment overrides apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(ConfigError::LoadError)?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    ///
    /// Checks:
    /// - Log level is valid (trace, debug, info, warn, error)
    /// - ROI scale is finite and not negative
    /// - ROI output type code is -1 or a numeric element type
    /// - Rate limit is non-zero when limiting is on
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if !self.roi.scale.is_finite() || self.roi.scale < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "Invalid roi.scale {}. Must be a finite, non-negative number",
                self.roi.scale
            )));
        }

        if let Err(e) = self.roi.output_type() {
            return Err(ConfigError::ValidationError(format!(
                "Invalid roi.data_type {}: {e}",
                self.roi.data_type
            )));
        }

        if self.rate_limit.mode != RateLimitMode::Off && self.rate_limit.limit == 0 {
            return Err(ConfigError::ValidationError(format!(
                "rate_limit.limit must be greater than 0 in {:?} mode",
                self.rate_limit.mode
            )));
        }

        Ok(())
    }
}
