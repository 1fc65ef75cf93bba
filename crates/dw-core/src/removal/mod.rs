//! Removal execution.
//!
//! Runs strictly after evaluation for a resource type has finished.
//! Failures are recorded per item and never abort the batch.

pub mod executor;

pub use executor::{
    RemovalExecutor, RemovalOutcome, RemovalReport, RemovalStatus, RemovalSummary, RemovalTarget,
    CONTAINER_REMOVE_OPTIONS, IMAGE_REMOVE_OPTIONS,
};
