//! Docker Watcher Core Library
//!
//! This library provides the retention engine for docker-watcher:
//! - Runtime collaborator seam with `docker` CLI and in-memory backends
//! - Inventory snapshots and indexes
//! - Image and container retention evaluation
//! - Idempotent removal execution
//! - Collection cycle and interval watcher
//!
//! The binary entry point is in `main.rs`.

pub mod cycle;
pub mod evaluate;
pub mod exit_codes;
pub mod inventory;
pub mod logging;
pub mod removal;
pub mod runtime;
pub mod status;
