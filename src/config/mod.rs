//! Configuration management for depfetch
//!
//! Settings are layered:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. `.env` file
//! 4. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use depfetch::config::Config;
//!
//! let config = Config::load(None).expect("Failed to load configuration");
//! println!("Worker concurrency: {}", config.worker.concurrency);
//! ```
//!
//! # Environment Variables
//!
//! Any setting can be overridden with `DEPFETCH__<section>__<key>`:
//! - `DEPFETCH__WORKER__CONCURRENCY=8`
//! - `DEPFETCH__UPLOAD__ENDPOINT=https://collector.internal/artifacts`
//! - `DEPFETCH__TIMEOUTS__FETCH_SECS=1200`
//!
//! The upload bearer token is only read from `DEPFETCH_UPLOAD_TOKEN`.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/depfetch.toml`.
//! This can be overridden using the `DEPFETCH_CONFIG` environment variable
//! or the `--config` flag.

mod models;
mod sources;
mod validation;

pub use models::{
    Config, FetchersConfig, HttpSettings, ServerConfig, TimeoutsConfig, UploadConfig,
    UploadProvider, WorkerSettings,
};
pub use validation::ValidationError;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load and validate configuration from all sources
    ///
    /// `path` takes precedence over `DEPFETCH_CONFIG` and the default path.
    pub fn load(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = sources::load(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path, without `.env` or secrets
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
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
        fs::write(&config_path, "[upload]\nprovider = \"memory\"\n").unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.upload.provider, UploadProvider::Memory);
    }

    #[test]
    fn test_invalid_config_fails_validation() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");
        fs::write(&config_path, "[worker]\nconcurrency = 0\n").unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result,
            Err(ConfigError::ValidationError(ValidationError::ZeroConcurrency))
        ));
    }
}
