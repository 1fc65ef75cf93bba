//! Log filter and format resolution.
//!
//! The filter is a single `EnvFilter` directive string. Its source is the
//! first one present of: the CLI level (`--log-level`, `-v`, `-q`),
//! `DW_LOG`, `RUST_LOG`, then `info`. A CLI level replaces env directives
//! outright so `-q` always silences the watcher.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

pub const ENV_LOG: &str = "DW_LOG";
pub const ENV_LOG_FORMAT: &str = "DW_LOG_FORMAT";
pub const ENV_LOG_TIMESTAMPS: &str = "DW_LOG_TIMESTAMPS";

const DEFAULT_DIRECTIVES: &str = "info";

/// Log output format on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    #[value(alias = "console")]
    Human,
    /// One JSON object per line.
    #[value(alias = "json")]
    Jsonl,
}

/// Resolved logging setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    /// `EnvFilter` directives, e.g. `warn,dw_core=debug`.
    pub directives: String,
    /// Prefix human output with timestamps. Off for journald-style sinks.
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Human,
            directives: DEFAULT_DIRECTIVES.to_string(),
            timestamps: true,
        }
    }
}

impl LogConfig {
    pub fn from_env(cli_level: Option<LevelFilter>, cli_format: Option<LogFormat>) -> Self {
        Self::resolve(cli_level, cli_format, |key| std::env::var(key).ok())
    }

    /// Resolve against an arbitrary environment lookup.
    pub fn resolve(
        cli_level: Option<LevelFilter>,
        cli_format: Option<LogFormat>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let set = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let directives = match cli_level {
            Some(level) => level.to_string().to_lowercase(),
            None => set(ENV_LOG)
                .or_else(|| set(EnvFilter::DEFAULT_ENV))
                .unwrap_or_else(|| DEFAULT_DIRECTIVES.to_string()),
        };

        let format = cli_format
            .or_else(|| set(ENV_LOG_FORMAT).and_then(|v| LogFormat::from_str(v.trim(), true).ok()))
            .unwrap_or_default();

        let timestamps = !matches!(
            set(ENV_LOG_TIMESTAMPS).as_deref().map(str::trim),
            Some("0" | "false" | "no" | "off")
        );

        Self {
            format,
            directives,
            timestamps,
        }
    }

    /// Build the subscriber filter. Unparsable directives are skipped.
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .parse_lossy(&self.directives)
    }
}
