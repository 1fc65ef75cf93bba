//! Configuration snapshots for startup audit logging.
//!
//! A snapshot captures the effective configuration at startup so that any
//! removal in the logs can be traced back to the policy that allowed it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::policy::ConfigFile;
use crate::resolve::ConfigSource;

/// A frozen snapshot of configuration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// Path the config file was loaded from.
    #[serde(default)]
    pub path: Option<String>,

    /// Source of the config file.
    pub source: String,

    /// SHA-256 hash of the config file content.
    #[serde(default)]
    pub file_hash: Option<String>,

    /// Hash of the effective (merged) configuration.
    pub effective_hash: String,

    /// Key configuration values for quick reference.
    pub summary: ConfigSummary,
}

/// Summary of key configuration values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub image_lifetime_secs: u64,
    pub container_lifetime_secs: u64,
    pub keep_images: Vec<String>,
    pub keep_containers: Vec<String>,
    pub watch_interval_secs: u64,
    pub call_timeout_secs: u64,
    pub docker_host: Option<String>,
    pub dry_run: bool,
}

impl ConfigSnapshot {
    /// Create a new snapshot from the effective configuration.
    pub fn new(
        effective: &ConfigFile,
        path: Option<&std::path::Path>,
        source: ConfigSource,
        file_content: Option<&str>,
    ) -> Self {
        let effective_json = serde_json::to_string(effective).unwrap_or_default();
        ConfigSnapshot {
            timestamp: Utc::now(),
            path: path.map(|p| p.display().to_string()),
            source: source.to_string(),
            file_hash: file_content.map(hash_content),
            effective_hash: hash_content(&effective_json),
            summary: ConfigSummary {
                image_lifetime_secs: effective.retention.image_lifetime_secs,
                container_lifetime_secs: effective.retention.container_lifetime_secs,
                keep_images: effective.retention.keep_images.clone(),
                keep_containers: effective.retention.keep_containers.clone(),
                watch_interval_secs: effective.watch.interval_secs,
                call_timeout_secs: effective.watch.call_timeout_secs,
                docker_host: effective.watch.docker_host.clone(),
                dry_run: effective.watch.dry_run,
            },
        }
    }
}

/// Compute SHA-256 hash of content.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
