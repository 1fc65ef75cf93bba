//! Inventory records as reported by the container runtime.
//!
//! Records are point-in-time copies. Nothing in the watcher mutates a
//! record after it has been listed; evaluators read them and produce
//! decisions on the side.

use crate::id::{ContainerId, ImageId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder tag the runtime reports for untagged images.
pub const UNTAGGED_PLACEHOLDER: &str = "<none>:<none>";

/// One image in the runtime's store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: ImageId,

    /// Creation time in epoch seconds. `None` when the runtime reported a
    /// value that could not be parsed.
    pub created_at: Option<i64>,

    #[serde(default)]
    pub parent_id: Option<ImageId>,

    /// `repo:tag` labels. Empty for dangling images.
    #[serde(default)]
    pub repo_tags: Vec<String>,

    /// Number of containers referencing this image, when the runtime
    /// reports it.
    #[serde(default)]
    pub containers: Option<u32>,

    pub size: u64,
}

impl ImageRecord {
    /// Tags that name the image, skipping the runtime's `<none>` placeholder.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.repo_tags
            .iter()
            .map(String::as_str)
            .filter(|t| !t.is_empty() && *t != UNTAGGED_PLACEHOLDER)
    }

    /// An image with no usable `repo:tag` label.
    pub fn is_dangling(&self) -> bool {
        self.tags().next().is_none()
    }
}

/// Coarse lifecycle state of a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    /// A token this watcher does not recognise.
    Unknown(String),
}

impl ContainerState {
    /// Parse a state token (`"exited"`) or a status summary
    /// (`"Exited (0) 3 days ago"`, `"Up 2 hours"`).
    pub fn parse(token: &str) -> Self {
        let word = token
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        match word.as_str() {
            "created" => ContainerState::Created,
            "running" | "up" => ContainerState::Running,
            "paused" => ContainerState::Paused,
            "restarting" => ContainerState::Restarting,
            "removing" | "removal" => ContainerState::Removing,
            "exited" => ContainerState::Exited,
            "dead" => ContainerState::Dead,
            _ => ContainerState::Unknown(token.trim().to_string()),
        }
    }

    /// Only containers in these states may ever be removed.
    pub fn is_removal_candidate(&self) -> bool {
        matches!(self, ContainerState::Exited | ContainerState::Created)
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerState::Created => write!(f, "created"),
            ContainerState::Running => write!(f, "running"),
            ContainerState::Paused => write!(f, "paused"),
            ContainerState::Restarting => write!(f, "restarting"),
            ContainerState::Removing => write!(f, "removing"),
            ContainerState::Exited => write!(f, "exited"),
            ContainerState::Dead => write!(f, "dead"),
            ContainerState::Unknown(token) => write!(f, "{}", token),
        }
    }
}

/// One container known to the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub id: ContainerId,

    /// Status summary as reported by the runtime.
    pub status: String,

    pub state: ContainerState,

    /// Names as reported, usually with a leading `/`.
    #[serde(default)]
    pub names: Vec<String>,

    pub image_id: ImageId,

    /// Completion time in epoch seconds. Only filled in for finished
    /// containers whose completion time could be determined.
    #[serde(default)]
    pub finished_at: Option<i64>,

    /// Writable layer size in bytes, when reported.
    #[serde(default)]
    pub size_rw: Option<u64>,
}

impl ContainerRecord {
    /// Names with surrounding `/` separators removed.
    pub fn trimmed_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|n| trim_slashes(n))
    }
}

/// Strip leading and trailing `/` from a container name.
pub fn trim_slashes(name: &str) -> &str {
    name.trim_matches('/')
}
