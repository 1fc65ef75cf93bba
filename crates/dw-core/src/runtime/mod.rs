//! Container runtime collaborator.
//!
//! The retention engine only ever talks to the runtime through the
//! [`Runtime`] trait: read-only inventory queries plus the two destructive
//! remove commands. [`DockerEngine`] is the production backend; test builds
//! also get [`InMemoryRuntime`], an in-process daemon model.

pub mod engine;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

pub use engine::DockerEngine;
#[cfg(any(test, feature = "test-utils"))]
pub use memory::{container_fixture, image_fixture, InMemoryRuntime, RuntimeCall};

use crate::status::DaemonStatus;
use dw_common::{ContainerId, ContainerRecord, ImageId, ImageRecord};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Options for removing a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRemoveOptions {
    /// Also remove anonymous volumes attached to the container.
    pub remove_volumes: bool,
    /// Kill the container first if it is running.
    pub force: bool,
}

/// Options for removing an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRemoveOptions {
    /// Remove even if tagged in several repositories or referenced by
    /// stopped containers.
    pub force: bool,
    /// Also delete untagged parent images left without children.
    pub prune_children: bool,
}

/// Per-container details only available from an inspect call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDetails {
    /// Raw completion timestamp as reported (RFC 3339), if any.
    pub finished_at: Option<String>,
    /// Writable layer size in bytes.
    pub size_rw: Option<u64>,
}

/// Errors raised by runtime calls.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("runtime unavailable: {0}")]
    Unavailable(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    /// The daemon answered but refused the request (conflict, server error).
    #[error("{operation} rejected with status {status}: {message}")]
    Rejected {
        operation: String,
        status: u16,
        message: String,
    },

    #[error("no such object: {0}")]
    NotFound(String),

    #[error("unexpected runtime output: {0}")]
    Parse(String),
}

impl RuntimeError {
    /// Whether a later attempt may succeed without any change to the request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RuntimeError::Unavailable(_) | RuntimeError::Timeout { .. }
        )
    }

    /// The object the call targeted is already gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::NotFound(_))
    }
}

impl From<RuntimeError> for dw_common::Error {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Unavailable(msg) => dw_common::Error::RuntimeUnavailable(msg),
            RuntimeError::Timeout { operation, after } => dw_common::Error::Timeout {
                command: operation,
                seconds: after.as_secs(),
            },
            other => dw_common::Error::Query(other.to_string()),
        }
    }
}

/// Operations the watcher needs from a container runtime.
///
/// Implementations must be safe to call sequentially from a single thread;
/// the watcher never issues two calls at once.
pub trait Runtime {
    /// List containers; stopped ones only when `include_stopped`.
    fn list_containers(&self, include_stopped: bool) -> Result<Vec<ContainerRecord>, RuntimeError>;

    /// Fetch details for one container.
    fn inspect_container(&self, id: &ContainerId) -> Result<ContainerDetails, RuntimeError>;

    /// List images; intermediate layers only when `include_intermediate`.
    fn list_images(&self, include_intermediate: bool) -> Result<Vec<ImageRecord>, RuntimeError>;

    fn remove_container(
        &self,
        id: &ContainerId,
        options: ContainerRemoveOptions,
    ) -> Result<(), RuntimeError>;

    /// Remove an image, returning every image ID the runtime deleted as a
    /// result (the image itself plus any pruned parents).
    fn remove_image(
        &self,
        id: &ImageId,
        options: ImageRemoveOptions,
    ) -> Result<Vec<ImageId>, RuntimeError>;

    /// Daemon-wide counters for the status report.
    fn status(&self) -> Result<DaemonStatus, RuntimeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(RuntimeError::Unavailable("socket".into()).is_retryable());
        assert!(RuntimeError::Timeout {
            operation: "image list".into(),
            after: Duration::from_secs(5)
        }
        .is_retryable());
        assert!(!RuntimeError::NotFound("sha256:1".into()).is_retryable());
        assert!(!RuntimeError::Parse("eof".into()).is_retryable());
        assert!(!RuntimeError::Rejected {
            operation: "image remove".into(),
            status: 409,
            message: "conflict".into()
        }
        .is_retryable());
    }

    #[test]
    fn converts_into_common_error_taxonomy() {
        let err: dw_common::Error = RuntimeError::Timeout {
            operation: "container list".into(),
            after: Duration::from_secs(60),
        }
        .into();
        assert_eq!(err.category(), dw_common::ErrorCategory::Query);
        assert_eq!(err.code(), 22);

        let err: dw_common::Error = RuntimeError::Unavailable("no socket".into()).into();
        assert_eq!(err.code(), 20);
    }
}
