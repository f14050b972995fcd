//! Configuration management for ThumbBox
//!
//! Settings are layered from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! CLI flags are applied on top by the binary.
//!
//! # Usage
//!
//! ```no_run
//! use thumbbox::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Any setting can be overridden with `THUMBBOX__<section>__<key>`:
//! - `THUMBBOX__SERVER__BIND_ADDR=0.0.0.0:8080`
//! - `THUMBBOX__STORAGE__BUCKET=media`
//! - `THUMBBOX__IMAGING__CHUNK_SIZE=128KB`
//!
//! Object store credentials are read from `ACCESS_KEY` / `SECRET_KEY`
//! (or `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`) and never from the file.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/thumbbox.toml`.
//! This can be overridden using the `THUMBBOX_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{Config, ImagingConfig, ServerConfig, StorageConfig, StorageProvider};
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
    /// Load configuration from all sources (file + environment), unvalidated.
    ///
    /// Call [`Config::validate`] once CLI overrides have been applied.
    pub fn load() -> Result<Self, ConfigError> {
        Ok(sources::load(None)?)
    }

    /// Like [`Config::load`], reading the TOML layer from `path`
    pub fn load_with_file(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        Ok(sources::load(Some(path))?)
    }

    /// Load configuration from a specific path and validate it
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_memory_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(
            &config_path,
            r#"
[storage]
provider = "memory"
bucket = "thumbs"
            "#,
        )
        .unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.storage.provider, StorageProvider::Memory);
        assert_eq!(config.storage.bucket, "thumbs");
    }

    #[test]
    fn test_load_rejects_missing_bucket() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[storage]\nprovider = \"memory\"\n").unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::EmptyBucket)
        ));
    }
}
