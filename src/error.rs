//! Custom error types for the application.
//!
//! This module defines the primary error type, `DaqError`, for everything built on
//! top of the frame pool. Using the `thiserror` crate, it gives the configuration
//! layer and the plugins a single error to propagate with `?`.
//!
//! ## Error Hierarchy
//!
//! `DaqError` consolidates the error types of the lower layers:
//!
//! - **`Config`**: Wraps [`ConfigError`], raised when the configuration file or the
//!   environment cannot be parsed, or when a value fails validation.
//! - **`Pool`**: Wraps [`PoolError`] from `daq-pool`. Allocation ceilings, malformed
//!   conversion requests and unsupported output types all arrive here.
//! - **`Frame`**: Wraps [`FrameError`] from `daq-core`, typically a typed view of a
//!   frame requested with the wrong element type.
//! - **`Processing`**: For errors that occur during plugin processing that have no
//!   lower-level cause, such as a frame with an unsupported number of dimensions.
//!
//! A plugin that hits any of these drops the frame and counts it; none of them is
//! fatal to the pipeline.

use daq_core::FrameError;
use daq_pool::PoolError;
use thiserror::Error;

use crate::config::ConfigError;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

/// Application error for configuration and plugin processing.
#[derive(Error, Debug)]
pub enum DaqError {
    /// Configuration could not be loaded or validated.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Allocation or conversion failed in the pool.
    #[error("Frame pool error: {0}")]
    Pool(#[from] PoolError),

    /// Frame data could not be read as requested.
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Plugin-level failure with no lower-level cause.
    #[error("Data processing error: {0}")]
    Processing(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use daq_core::ElementType;

    #[test]
    fn test_error_display() {
        let err = DaqError::Processing("frame has 4 dimensions".to_string());
        assert_eq!(err.to_string(), "Data processing error: frame has 4 dimensions");

        let err = DaqError::from(PoolError::InvalidType(ElementType::String));
        assert!(err.to_string().starts_with("Frame pool error: "));

        let err = DaqError::from(ConfigError::ValidationError("bad level".into()));
        assert_eq!(
            err.to_string(),
            "Configuration error: Configuration validation error: bad level"
        );
    }

    #[test]
    fn test_question_mark_conversion() {
        fn view_as_f32(frame: &daq_core::Frame) -> AppResult<usize> {
            Ok(frame.view::<f32>()?.len())
        }
        let frame = daq_core::Frame::new();
        assert!(matches!(
            view_as_f32(&frame),
            Err(DaqError::Frame(FrameError::NoDataSelected))
        ));
    }
}
