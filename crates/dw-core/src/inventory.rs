//! Inventory snapshots.
//!
//! A snapshot is captured fresh at the start of each phase of a pass and
//! discarded at the end of it. Images are indexed once so the evaluator
//! never rescans the list for parent or usage checks.

use crate::runtime::{Runtime, RuntimeError};
use chrono::{DateTime, Datelike};
use dw_common::{ContainerId, ContainerRecord, ImageId, ImageRecord, UNTAGGED_PLACEHOLDER};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Result of interpreting a runtime timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeTime {
    At(i64),
    /// Docker's zero time or an empty field: the event never happened.
    Zero,
    Malformed,
}

/// Interpret an RFC 3339 timestamp as reported by the runtime.
pub fn parse_runtime_time(raw: &str) -> RuntimeTime {
    let raw = raw.trim();
    if raw.is_empty() {
        return RuntimeTime::Zero;
    }
    match DateTime::parse_from_rfc3339(raw) {
        Ok(t) if t.year() <= 1 || t.timestamp() <= 0 => RuntimeTime::Zero,
        Ok(t) => RuntimeTime::At(t.timestamp()),
        Err(_) => RuntimeTime::Malformed,
    }
}

/// A record whose data could not be fully interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedField {
    pub id: String,
    pub field: &'static str,
    pub value: String,
}

impl From<MalformedField> for dw_common::Error {
    fn from(field: MalformedField) -> Self {
        dw_common::Error::MalformedData {
            id: field.id,
            field: field.field.to_string(),
            value: field.value,
        }
    }
}

/// Containers as seen at the start of the container phase.
#[derive(Debug, Clone, Default)]
pub struct ContainerSnapshot {
    containers: Vec<ContainerRecord>,
    malformed: Vec<MalformedField>,
}

impl ContainerSnapshot {
    /// List every container and resolve completion times and sizes for
    /// the removal candidates.
    pub fn capture(runtime: &dyn Runtime) -> Result<Self, RuntimeError> {
        let mut containers = runtime.list_containers(true)?;
        let mut malformed = Vec::new();

        for container in containers
            .iter_mut()
            .filter(|c| c.state.is_removal_candidate())
        {
            let details = match runtime.inspect_container(&container.id) {
                Ok(details) => details,
                // Removed between list and inspect.
                Err(err) if err.is_not_found() => {
                    container.finished_at = None;
                    continue;
                }
                Err(err) => return Err(err),
            };
            container.size_rw = details.size_rw;
            let raw = details.finished_at.unwrap_or_default();
            container.finished_at = match parse_runtime_time(&raw) {
                RuntimeTime::At(ts) => Some(ts),
                RuntimeTime::Zero => None,
                RuntimeTime::Malformed => {
                    malformed.push(MalformedField {
                        id: container.id.to_string(),
                        field: "finished_at",
                        value: raw,
                    });
                    None
                }
            };
        }

        debug!(
            count = containers.len(),
            malformed = malformed.len(),
            "captured container snapshot"
        );
        Ok(Self {
            containers,
            malformed,
        })
    }

    /// Build a snapshot from records whose `finished_at` is already resolved.
    pub fn from_records(containers: Vec<ContainerRecord>) -> Self {
        Self {
            containers,
            malformed: Vec::new(),
        }
    }

    pub fn containers(&self) -> &[ContainerRecord] {
        &self.containers
    }

    pub fn get(&self, id: &ContainerId) -> Option<&ContainerRecord> {
        self.containers.iter().find(|c| &c.id == id)
    }

    pub fn malformed(&self) -> &[MalformedField] {
        &self.malformed
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }
}

/// Lookup structures over one image snapshot.
#[derive(Debug, Clone, Default)]
pub struct ImageIndex {
    by_id: HashMap<ImageId, usize>,
    children: HashMap<ImageId, usize>,
    container_refs: HashMap<ImageId, u32>,
}

impl ImageIndex {
    /// Number of images in the snapshot whose parent is `id`.
    pub fn child_count(&self, id: &ImageId) -> usize {
        self.children.get(id).copied().unwrap_or(0)
    }

    pub fn is_parent(&self, id: &ImageId) -> bool {
        self.child_count(id) > 0
    }

    /// Containers (of any state) created from `id`.
    pub fn container_count(&self, id: &ImageId) -> u32 {
        self.container_refs.get(id).copied().unwrap_or(0)
    }

    pub fn contains(&self, id: &ImageId) -> bool {
        self.by_id.contains_key(id)
    }
}

/// Images as seen at the start of the image phase.
#[derive(Debug, Clone, Default)]
pub struct ImageSnapshot {
    images: Vec<ImageRecord>,
    index: ImageIndex,
    malformed: Vec<MalformedField>,
}

impl ImageSnapshot {
    /// List all images, intermediate layers included, and every container
    /// so usage counts reflect containers removed earlier in the pass.
    pub fn capture(runtime: &dyn Runtime) -> Result<Self, RuntimeError> {
        let images = runtime.list_images(true)?;
        let containers = runtime.list_containers(true)?;
        let snapshot = Self::from_records(images, &containers);
        debug!(
            count = snapshot.len(),
            malformed = snapshot.malformed().len(),
            "captured image snapshot"
        );
        Ok(snapshot)
    }

    /// Normalise and index raw records.
    ///
    /// Duplicate IDs keep their first occurrence, placeholder tags are
    /// dropped, and parents missing from the snapshot become `None`.
    /// A missing or negative creation time is recorded as malformed and
    /// leaves the image's age unknown.
    pub fn from_records(raw: Vec<ImageRecord>, containers: &[ContainerRecord]) -> Self {
        let mut seen = HashSet::new();
        let mut images: Vec<ImageRecord> = raw
            .into_iter()
            .filter(|i| seen.insert(i.id.clone()))
            .collect();

        let by_id: HashMap<ImageId, usize> = images
            .iter()
            .enumerate()
            .map(|(pos, i)| (i.id.clone(), pos))
            .collect();

        let mut derived: HashMap<ImageId, u32> = HashMap::new();
        for container in containers {
            *derived.entry(container.image_id.clone()).or_default() += 1;
        }

        let mut children: HashMap<ImageId, usize> = HashMap::new();
        let mut container_refs = HashMap::new();
        let mut malformed = Vec::new();
        for image in &mut images {
            let bad_created = match image.created_at {
                None => Some("missing".to_string()),
                Some(ts) if ts < 0 => Some(ts.to_string()),
                Some(_) => None,
            };
            if let Some(value) = bad_created {
                malformed.push(MalformedField {
                    id: image.id.to_string(),
                    field: "created",
                    value,
                });
                image.created_at = None;
            }

            image
                .repo_tags
                .retain(|t| !t.is_empty() && t != UNTAGGED_PLACEHOLDER);

            let parent_present = match &image.parent_id {
                Some(parent) => parent != &image.id && by_id.contains_key(parent),
                None => false,
            };
            if !parent_present {
                image.parent_id = None;
            }
            if let Some(parent) = &image.parent_id {
                *children.entry(parent.clone()).or_default() += 1;
            }

            let count = image
                .containers
                .unwrap_or(0)
                .max(derived.get(&image.id).copied().unwrap_or(0));
            image.containers = Some(count);
            if count > 0 {
                container_refs.insert(image.id.clone(), count);
            }
        }

        Self {
            images,
            index: ImageIndex {
                by_id,
                children,
                container_refs,
            },
            malformed,
        }
    }

    pub fn images(&self) -> &[ImageRecord] {
        &self.images
    }

    pub fn get(&self, id: &ImageId) -> Option<&ImageRecord> {
        self.index.by_id.get(id).map(|&pos| &self.images[pos])
    }

    pub fn index(&self) -> &ImageIndex {
        &self.index
    }

    pub fn malformed(&self) -> &[MalformedField] {
        &self.malformed
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
