//! Global `tracing` subscriber setup.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crate::config::ApplicationConfig;

/// Build the filter: `RUST_LOG` when set, otherwise `level`.
pub fn env_filter(level: &str) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid log filter '{level}'")),
    }
}

/// Install the global subscriber described by `config`.
///
/// Returns `Ok(false)` if a global subscriber was already installed; that
/// one stays in place.
pub fn init_logging(config: &ApplicationConfig) -> anyhow::Result<bool> {
    let filter = env_filter(&config.log_level)?;
    let installed = if config.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    };
    Ok(installed.is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_env_filter_falls_back_to_level() {
        std::env::remove_var("RUST_LOG");
        let filter = env_filter("debug").unwrap();
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    #[serial]
    fn test_rust_log_overrides_level() {
        std::env::set_var("RUST_LOG", "daq_pool=trace");
        let filter = env_filter("warn");
        std::env::remove_var("RUST_LOG");
        assert_eq!(filter.unwrap().to_string(), "daq_pool=trace");
    }

    // `test_second_init_is_harmless` lives in tests/logging_init.rs: it installs
    // a global subscriber, which would collide with `#[traced_test]` tests
    // sharing this test binary.
}
