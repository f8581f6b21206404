//! Configuration management for PartChain
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use partchain::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Worker count: {}", config.runtime.workers);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `PARTCHAIN__<section>__<key>`
//!
//! Examples:
//! - `PARTCHAIN__RUNTIME__WORKERS=8`
//! - `PARTCHAIN__POLLING__POLL_INTERVAL=250ms`
//! - `PARTCHAIN__TRAVERSAL__DEFAULT_DEPTH=3`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/partchain.toml`.
//! This can be overridden using the `PARTCHAIN_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::HumanDuration;
pub use models::{Config, PollingConfig, RuntimeConfig, TraversalConfig};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`PARTCHAIN__*`)
    /// 2. TOML file (default: `config/partchain.toml`)
    /// 3. Default values
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or a value
    /// fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[polling]
poll_interval = "1s"
request_ttl = "5m"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.polling.poll_interval.as_millis(), 1000);
        assert_eq!(config.runtime.workers, 4);
    }

    #[test]
    fn test_validation_catches_inverted_timing() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[polling]
poll_interval = "5m"
request_ttl = "1s"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result,
            Err(ConfigError::ValidationError(
                ValidationError::RequestTtlTooSmall { .. }
            ))
        ));
    }
}
