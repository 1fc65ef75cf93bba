//! Structured event vocabulary for logging.
//!
//! Every event carries correlation IDs (run_id, host_id, pass_id) and the
//! stage of the collection pass it belongs to.

use serde::{Deserialize, Serialize};

/// Stages of a collection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Inventory queries against the runtime.
    Snapshot,
    /// Retention evaluation.
    Evaluate,
    /// Removal execution.
    Remove,
    /// Daemon status reporting.
    Report,
    /// Watch loop scheduling.
    Watch,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Snapshot => "snapshot",
            Stage::Evaluate => "evaluate",
            Stage::Remove => "remove",
            Stage::Report => "report",
            Stage::Watch => "watch",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Run lifecycle
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";

    // Config
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_ERROR: &str = "config.error";

    // Pass lifecycle
    pub const PASS_STARTED: &str = "pass.started";
    pub const PASS_FINISHED: &str = "pass.finished";
    pub const PASS_ABORTED: &str = "pass.aborted";

    // Snapshot stage
    pub const SNAPSHOT_CAPTURED: &str = "snapshot.captured";
    pub const SNAPSHOT_MALFORMED: &str = "snapshot.malformed";

    // Evaluate stage
    pub const EVALUATE_DECISION: &str = "evaluate.decision";
    pub const EVALUATE_FINISHED: &str = "evaluate.finished";

    // Remove stage
    pub const REMOVE_RESULT: &str = "remove.result";
    pub const REMOVE_NOTHING: &str = "remove.nothing";
    pub const REMOVE_FINISHED: &str = "remove.finished";

    // Status report
    pub const STATUS_REPORT: &str = "status.report";
    pub const STATUS_UNAVAILABLE: &str = "status.unavailable";

    // Watch loop
    pub const WATCH_SLEEPING: &str = "watch.sleeping";
}

/// Context for emitting log events with consistent correlation IDs.
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Unique ID for this process invocation.
    pub run_id: String,
    /// Host identifier.
    pub host_id: String,
    /// ID of the pass in progress, if any.
    pub pass_id: Option<String>,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>, host_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            host_id: host_id.into(),
            pass_id: None,
        }
    }

    pub fn with_pass_id(mut self, pass_id: impl Into<String>) -> Self {
        self.pass_id = Some(pass_id.into());
        self
    }

    /// Pass ID for log fields (`-` outside a pass).
    pub fn pass_label(&self) -> &str {
        self.pass_id.as_deref().unwrap_or("-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_display_matches_serde() {
        for stage in [Stage::Init, Stage::Snapshot, Stage::Remove, Stage::Watch] {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage));
        }
    }

    #[test]
    fn pass_label_defaults_to_dash() {
        let ctx = LogContext::new("run-1", "host-1");
        assert_eq!(ctx.pass_label(), "-");
        assert_eq!(ctx.with_pass_id("pass-3").pass_label(), "pass-3");
    }
}
