//! Loading, merging, and validating the effective configuration.

use crate::policy::ConfigFile;
use crate::resolve::{resolve_config, ConfigSource};
use crate::snapshot::ConfigSnapshot;
use crate::validate::{validate_config, ValidationError};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Invalid TOML in config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Semantic validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Command-line values layered over the config file.
///
/// `None` leaves the file (or default) value in place. Keep-lists are
/// unioned with the file's lists rather than replacing them.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub image_lifetime_secs: Option<u64>,
    pub container_lifetime_secs: Option<u64>,
    pub keep_images: Vec<String>,
    pub keep_containers: Vec<String>,
    pub interval_secs: Option<u64>,
    pub call_timeout_secs: Option<u64>,
    pub docker_host: Option<String>,
    pub status_report: Option<bool>,
    pub dry_run: Option<bool>,
}

impl Overrides {
    /// Apply onto a loaded file config.
    pub fn apply(&self, config: &mut ConfigFile) {
        let retention = &mut config.retention;
        if let Some(secs) = self.image_lifetime_secs {
            retention.image_lifetime_secs = secs;
        }
        if let Some(secs) = self.container_lifetime_secs {
            retention.container_lifetime_secs = secs;
        }
        union_into(&mut retention.keep_images, &self.keep_images);
        union_into(&mut retention.keep_containers, &self.keep_containers);

        let watch = &mut config.watch;
        if let Some(secs) = self.interval_secs {
            watch.interval_secs = secs;
        }
        if let Some(secs) = self.call_timeout_secs {
            watch.call_timeout_secs = secs;
        }
        if let Some(host) = &self.docker_host {
            watch.docker_host = Some(host.clone());
        }
        if let Some(enabled) = self.status_report {
            watch.status_report = enabled;
        }
        if let Some(dry_run) = self.dry_run {
            watch.dry_run = dry_run;
        }
    }
}

fn union_into(target: &mut Vec<String>, extra: &[String]) {
    for entry in extra {
        if !target.contains(entry) {
            target.push(entry.clone());
        }
    }
}

/// Configuration resolution options.
#[derive(Debug, Default)]
pub struct ConfigOptions {
    /// Explicit config file path (highest priority).
    pub config_path: Option<PathBuf>,
    /// Command-line overrides.
    pub overrides: Overrides,
}

/// Effective configuration with provenance information.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: ConfigFile,
    /// Path of the config file (None if using defaults).
    pub path: Option<PathBuf>,
    pub source: ConfigSource,
    pub snapshot: ConfigSnapshot,
}

/// Load configuration with the standard resolution order, apply
/// overrides, and validate the result.
pub fn load_config(options: &ConfigOptions) -> Result<ResolvedConfig, ConfigError> {
    let resolved = resolve_config(options.config_path.as_deref());

    let (mut config, content) = match &resolved.path {
        Some(path) => {
            let content = read_file(path)?;
            let config = parse_config(path, &content)?;
            (config, Some(content))
        }
        None => (ConfigFile::default(), None),
    };

    options.overrides.apply(&mut config);
    validate_config(&config)?;

    let snapshot = ConfigSnapshot::new(
        &config,
        resolved.path.as_deref(),
        resolved.source,
        content.as_deref(),
    );

    Ok(ResolvedConfig {
        config,
        path: resolved.path,
        source: resolved.source,
        snapshot,
    })
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::IoError {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

/// Parse a TOML config document.
pub fn parse_config(path: &Path, content: &str) -> Result<ConfigFile, ConfigError> {
    toml::from_str(content).map_err(|source| ConfigError::ParseError {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_scalars_and_union_lists() {
        let mut config = ConfigFile::default();
        config.retention.keep_images = vec!["postgres".to_string()];

        let overrides = Overrides {
            image_lifetime_secs: Some(60),
            keep_images: vec!["postgres".to_string(), "redis".to_string()],
            keep_containers: vec!["web-1".to_string()],
            dry_run: Some(true),
            ..Overrides::default()
        };
        overrides.apply(&mut config);

        assert_eq!(config.retention.image_lifetime_secs, 60);
        assert_eq!(config.retention.container_lifetime_secs, 259_200);
        assert_eq!(config.retention.keep_images, vec!["postgres", "redis"]);
        assert_eq!(config.retention.keep_containers, vec!["web-1"]);
        assert!(config.watch.dry_run);
    }

    #[test]
    fn invalid_toml_reports_path() {
        let err = parse_config(Path::new("/tmp/dw.toml"), "[retention\n").unwrap_err();
        assert!(err.to_string().contains("/tmp/dw.toml"));
    }
}
