use super::models::{Config, StorageProvider};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Storage bucket must not be empty")]
    EmptyBucket,

    #[error("Storage provider is S3 but missing credentials (ACCESS_KEY or SECRET_KEY)")]
    MissingS3Credentials,

    #[error("Storage provider is local but no root directory is configured")]
    MissingLocalRoot,

    #[error("Invalid storage endpoint '{endpoint}', expected 'http://' or 'https://'")]
    InvalidEndpointScheme { endpoint: String },

    #[error("{field} must be positive")]
    ZeroValue { field: &'static str },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_storage(config)?;
    validate_imaging(config)?;
    Ok(())
}

fn validate_storage(config: &Config) -> Result<(), ValidationError> {
    let storage = &config.storage;

    if storage.bucket.trim().is_empty() {
        return Err(ValidationError::EmptyBucket);
    }

    match storage.provider {
        StorageProvider::S3 => {
            if storage.access_key.is_none() || storage.secret_key.is_none() {
                return Err(ValidationError::MissingS3Credentials);
            }
            if !storage.endpoint.starts_with("http://") && !storage.endpoint.starts_with("https://")
            {
                return Err(ValidationError::InvalidEndpointScheme {
                    endpoint: storage.endpoint.clone(),
                });
            }
        }
        StorageProvider::Local => {
            if storage.root.is_none() {
                return Err(ValidationError::MissingLocalRoot);
            }
        }
        StorageProvider::Memory => {}
    }

    Ok(())
}

fn validate_imaging(config: &Config) -> Result<(), ValidationError> {
    let imaging = &config.imaging;
    let checks = [
        ("imaging.pipe_capacity", imaging.pipe_capacity as u64),
        ("imaging.chunk_size", imaging.chunk_size.as_u64()),
        ("imaging.frame_queue_depth", imaging.frame_queue_depth as u64),
        ("imaging.max_source_bytes", imaging.max_source_bytes.as_u64()),
        ("server.request_timeout_secs", config.server.request_timeout_secs),
        ("server.stall_timeout_secs", config.server.stall_timeout_secs),
    ];

    match checks.iter().find(|(_, value)| *value == 0) {
        Some(&(field, _)) => Err(ValidationError::ZeroValue { field }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humanize::ByteSize;
    use std::path::PathBuf;

    fn s3_config() -> Config {
        let mut config = Config::default();
        config.storage.bucket = "media".to_string();
        config.storage.access_key = Some("key".to_string());
        config.storage.secret_key = Some("secret".to_string());
        config
    }

    #[test]
    fn test_valid_s3_config() {
        assert!(validate(&s3_config()).is_ok());
    }

    #[test]
    fn test_empty_bucket() {
        let mut config = s3_config();
        config.storage.bucket = "  ".to_string();
        assert!(matches!(validate(&config), Err(ValidationError::EmptyBucket)));
    }

    #[test]
    fn test_missing_s3_credentials() {
        let mut config = s3_config();
        config.storage.secret_key = None;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::MissingS3Credentials)
        ));
    }

    #[test]
    fn test_invalid_endpoint_scheme() {
        let mut config = s3_config();
        config.storage.endpoint = "minio:9000".to_string();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidEndpointScheme { .. })
        ));
    }

    #[test]
    fn test_local_requires_root() {
        let mut config = s3_config();
        config.storage.provider = StorageProvider::Local;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::MissingLocalRoot)
        ));

        config.storage.root = Some(PathBuf::from("/tmp/thumbs"));
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_memory_needs_no_credentials() {
        let mut config = Config::default();
        config.storage.provider = StorageProvider::Memory;
        config.storage.bucket = "test".to_string();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_values_rejected() {
        let mut config = s3_config();
        config.imaging.chunk_size = ByteSize(0);
        assert!(matches!(
            validate(&config),
            Err(ValidationError::ZeroValue {
                field: "imaging.chunk_size"
            })
        ));

        let mut config = s3_config();
        config.imaging.frame_queue_depth = 0;
        assert!(validate(&config).is_err());
    }
}
