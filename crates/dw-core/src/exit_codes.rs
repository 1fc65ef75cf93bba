//! Exit codes for the docker-watcher CLI.
//!
//! Exit code ranges:
//! - 0-3: Operational outcomes of the last pass
//! - 10-19: User/environment errors (recoverable by user action)
//! - 20-29: Internal errors

use crate::cycle::{LastPass, PassOutcome};

/// Exit codes for docker-watcher runs. Stable for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    // ========================================================================
    // Operational Outcomes (0-3)
    // ========================================================================
    /// Nothing to remove
    Clean = 0,

    /// Every marked item removed
    RemovalsOk = 2,

    /// Some removals failed
    PartialFail = 3,

    // ========================================================================
    // User / Environment Errors (10-19)
    // ========================================================================
    /// Invalid arguments or configuration
    ArgsError = 10,

    /// Runtime daemon or client binary not reachable
    RuntimeUnavailable = 11,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error
    IoError = 21,

    /// A runtime call timed out
    TimeoutError = 22,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Codes 0-2.
    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean | ExitCode::RemovalsOk)
    }

    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }

    /// Error code name for JSON output.
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::RemovalsOk => "OK_REMOVED",
            ExitCode::PartialFail => "ERR_PARTIAL",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::RuntimeUnavailable => "ERR_RUNTIME_UNAVAILABLE",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
            ExitCode::TimeoutError => "ERR_TIMEOUT",
        }
    }

    /// Exit code summarising how the last pass of a bounded run ended.
    pub fn from_last_pass(last: Option<&LastPass>) -> Self {
        match last {
            None => ExitCode::Clean,
            Some(LastPass::Completed { outcome }) => match outcome {
                PassOutcome::Clean => ExitCode::Clean,
                PassOutcome::Removed => ExitCode::RemovalsOk,
                PassOutcome::Partial => ExitCode::PartialFail,
            },
            Some(LastPass::Aborted {
                unavailable: true, ..
            }) => ExitCode::RuntimeUnavailable,
            Some(LastPass::Aborted {
                timed_out: true, ..
            }) => ExitCode::TimeoutError,
            Some(LastPass::Aborted { .. }) => ExitCode::InternalError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl From<&dw_common::Error> for ExitCode {
    fn from(err: &dw_common::Error) -> Self {
        use dw_common::Error;
        match err {
            Error::Config(_) | Error::InvalidValue { .. } => ExitCode::ArgsError,
            Error::RuntimeUnavailable(_) => ExitCode::RuntimeUnavailable,
            Error::Timeout { .. } => ExitCode::TimeoutError,
            Error::Io(_) | Error::Json(_) => ExitCode::IoError,
            _ => ExitCode::InternalError,
        }
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
