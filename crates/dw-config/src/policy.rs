//! Retention policy and watch loop configuration types.
//!
//! These types map one-to-one onto the `[retention]` and `[watch]` tables
//! of `docker-watcher.toml`. Every field has a default, so an empty file
//! (or no file at all) yields the built-in policy.

use serde::{Deserialize, Serialize};

/// Default minimum age of an unreferenced image before removal (3 days).
pub const DEFAULT_IMAGE_LIFETIME_SECS: u64 = 259_200;

/// Default minimum time since a container finished before removal (3 days).
pub const DEFAULT_CONTAINER_LIFETIME_SECS: u64 = 259_200;

/// Default pause between the end of one pass and the start of the next (1 hour).
pub const DEFAULT_WATCH_INTERVAL_SECS: u64 = 3_600;

/// Default per-call timeout for runtime commands.
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 60;

/// Endpoint schemes the engine client can connect through.
pub const SUPPORTED_HOST_SCHEMES: &[&str] = &["unix://", "tcp://", "http://"];

/// Complete configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub schema_version: Option<String>,
    pub retention: RetentionPolicy,
    pub watch: WatchConfig,
}

/// Rules deciding which containers and images are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
    /// Minimum age before an unreferenced, non-parent image becomes eligible.
    pub image_lifetime_secs: u64,

    /// Minimum time since completion before a finished container becomes eligible.
    pub container_lifetime_secs: u64,

    /// Exact `repo:tag` strings or bare repositories that protect images.
    pub keep_images: Vec<String>,

    /// Container names (compared with surrounding `/` stripped) that protect containers.
    pub keep_containers: Vec<String>,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            image_lifetime_secs: DEFAULT_IMAGE_LIFETIME_SECS,
            container_lifetime_secs: DEFAULT_CONTAINER_LIFETIME_SECS,
            keep_images: Vec::new(),
            keep_containers: Vec::new(),
        }
    }
}

impl RetentionPolicy {
    /// Image lifetime as a signed offset for epoch arithmetic.
    pub fn image_lifetime(&self) -> i64 {
        i64::try_from(self.image_lifetime_secs).unwrap_or(i64::MAX)
    }

    /// Container lifetime as a signed offset for epoch arithmetic.
    pub fn container_lifetime(&self) -> i64 {
        i64::try_from(self.container_lifetime_secs).unwrap_or(i64::MAX)
    }

    pub fn with_image_lifetime(mut self, secs: u64) -> Self {
        self.image_lifetime_secs = secs;
        self
    }

    pub fn with_container_lifetime(mut self, secs: u64) -> Self {
        self.container_lifetime_secs = secs;
        self
    }

    pub fn keep_image(mut self, entry: impl Into<String>) -> Self {
        self.keep_images.push(entry.into());
        self
    }

    pub fn keep_container(mut self, name: impl Into<String>) -> Self {
        self.keep_containers.push(name.into());
        self
    }
}

/// Settings for the repeat loop and the runtime client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Delay between pass completions.
    pub interval_secs: u64,

    /// Per-call timeout applied to every engine API request.
    pub call_timeout_secs: u64,

    /// Engine endpoint (`unix:///var/run/docker.sock`, `tcp://host:2375`).
    /// `None` follows `DOCKER_HOST` and then the platform's local socket.
    pub docker_host: Option<String>,

    /// Log a daemon status report before the first pass and after each pass.
    pub status_report: bool,

    /// Evaluate and report, but never remove anything.
    pub dry_run: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_WATCH_INTERVAL_SECS,
            call_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
            docker_host: None,
            status_report: true,
            dry_run: false,
        }
    }
}
