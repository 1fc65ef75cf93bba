//! Docker Watcher configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for the retention policy and watch loop settings
//! - Config file resolution (CLI → env → XDG → /etc → defaults)
//! - Merging of command-line overrides onto file values
//! - Semantic validation
//! - Config snapshots for startup audit logging

pub mod load;
pub mod policy;
pub mod resolve;
pub mod snapshot;
pub mod validate;

pub use load::{load_config, ConfigError, ConfigOptions, Overrides, ResolvedConfig};
pub use policy::{ConfigFile, RetentionPolicy, WatchConfig};
pub use resolve::{resolve_config, ConfigPath, ConfigSource};
pub use snapshot::ConfigSnapshot;
pub use validate::{validate_config, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
