//! Configuration validation errors and semantic validation.

use crate::policy::{ConfigFile, SUPPORTED_HOST_SCHEMES};
use thiserror::Error;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::InvalidValue { .. } => 11,
            ValidationError::VersionMismatch { .. } => 12,
        }
    }
}

/// Validate a merged configuration semantically.
pub fn validate_config(config: &ConfigFile) -> ValidationResult<()> {
    if let Some(version) = &config.schema_version {
        if version != crate::CONFIG_SCHEMA_VERSION {
            return Err(ValidationError::VersionMismatch {
                expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
                actual: version.clone(),
            });
        }
    }

    let retention = &config.retention;
    check_fits_i64("retention.image_lifetime_secs", retention.image_lifetime_secs)?;
    check_fits_i64(
        "retention.container_lifetime_secs",
        retention.container_lifetime_secs,
    )?;

    for (idx, entry) in retention.keep_images.iter().enumerate() {
        if entry.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: format!("retention.keep_images[{}]", idx),
                message: "Must not be empty".to_string(),
            });
        }
        if entry.ends_with(':') {
            return Err(ValidationError::InvalidValue {
                field: format!("retention.keep_images[{}]", idx),
                message: format!("Missing tag after ':' in {:?}", entry),
            });
        }
    }

    for (idx, name) in retention.keep_containers.iter().enumerate() {
        if name.trim_matches('/').is_empty() {
            return Err(ValidationError::InvalidValue {
                field: format!("retention.keep_containers[{}]", idx),
                message: "Must contain a name besides '/' separators".to_string(),
            });
        }
    }

    let watch = &config.watch;
    if watch.interval_secs == 0 {
        return Err(ValidationError::InvalidValue {
            field: "watch.interval_secs".to_string(),
            message: "Must be at least 1 second".to_string(),
        });
    }
    if watch.call_timeout_secs == 0 {
        return Err(ValidationError::InvalidValue {
            field: "watch.call_timeout_secs".to_string(),
            message: "Must be at least 1 second".to_string(),
        });
    }
    if let Some(host) = &watch.docker_host {
        if !SUPPORTED_HOST_SCHEMES
            .iter()
            .any(|scheme| host.starts_with(scheme) && host.len() > scheme.len())
        {
            return Err(ValidationError::InvalidValue {
                field: "watch.docker_host".to_string(),
                message: format!(
                    "Must start with one of {}, got '{}'",
                    SUPPORTED_HOST_SCHEMES.join(", "),
                    host
                ),
            });
        }
    }

    Ok(())
}

fn check_fits_i64(field: &str, value: u64) -> ValidationResult<()> {
    if i64::try_from(value).is_err() {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            message: format!("Must be at most {}, got {}", i64::MAX, value),
        });
    }
    Ok(())
}
