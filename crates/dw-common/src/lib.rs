//! Docker Watcher common types, IDs, and errors.
//!
//! This crate provides foundational types shared across the watcher crates:
//! - Opaque identity types for images and containers
//! - Point-in-time inventory records as reported by the runtime
//! - The unified error type with stable codes
//! - Output format specifications

pub mod error;
pub mod id;
pub mod output;
pub mod record;

pub use error::{Error, ErrorCategory, Result};
pub use id::{ContainerId, ImageId};
pub use output::OutputFormat;
pub use record::{trim_slashes, ContainerRecord, ContainerState, ImageRecord, UNTAGGED_PLACEHOLDER};
