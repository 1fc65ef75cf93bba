//! Image and container identity types.
//!
//! Both are opaque strings assigned by the runtime. They are compared
//! byte-for-byte; no normalisation of `sha256:` prefixes happens here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Runtime-assigned image ID (usually `sha256:<hex>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(pub String);

impl ImageId {
    pub fn new(id: impl Into<String>) -> Self {
        ImageId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for log lines: digest hex truncated to 12 characters.
    pub fn short(&self) -> &str {
        short_id(&self.0)
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ImageId {
    fn from(id: &str) -> Self {
        ImageId(id.to_string())
    }
}

/// Runtime-assigned container ID (64 hex characters for Docker).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(pub String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        ContainerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        short_id(&self.0)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ContainerId {
    fn from(id: &str) -> Self {
        ContainerId(id.to_string())
    }
}

fn short_id(id: &str) -> &str {
    let hex = id.split_once(':').map(|(_, rest)| rest).unwrap_or(id);
    match hex.char_indices().nth(12) {
        Some((idx, _)) => &hex[..idx],
        None => hex,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_strips_digest_algorithm() {
        let id = ImageId::new("sha256:0123456789abcdef0123");
        assert_eq!(id.short(), "0123456789ab");
    }

    #[test]
    fn short_keeps_brief_ids() {
        assert_eq!(ContainerId::new("abc").short(), "abc");
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = ImageId::new("sha256:aa");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"sha256:aa\"");
    }
}
