//! In-process runtime model.
//!
//! Holds containers and images in memory and applies the same removal rules
//! a Docker daemon enforces: an image with children or a referencing
//! container cannot be removed without force, and `prune_children` cascades
//! to parents left untagged and childless. Failures can be scripted per
//! object so partial-failure passes are reproducible, and objects can be
//! made to disappear right after they are listed to model churn from other
//! clients.

use super::{
    ContainerDetails, ContainerRemoveOptions, ImageRemoveOptions, Runtime, RuntimeError,
};
use crate::status::DaemonStatus;
use dw_common::{ContainerId, ContainerRecord, ContainerState, ImageId, ImageRecord};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

/// One call observed by an [`InMemoryRuntime`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuntimeCall {
    ListContainers { include_stopped: bool },
    InspectContainer(ContainerId),
    ListImages { include_intermediate: bool },
    RemoveContainer(ContainerId),
    RemoveImage(ImageId),
    Status,
}

impl RuntimeCall {
    pub fn is_removal(&self) -> bool {
        matches!(
            self,
            RuntimeCall::RemoveContainer(_) | RuntimeCall::RemoveImage(_)
        )
    }
}

#[derive(Debug, Clone)]
struct StoredContainer {
    record: ContainerRecord,
    finished_at: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    containers: Vec<StoredContainer>,
    images: Vec<ImageRecord>,
    container_failures: HashMap<ContainerId, RuntimeError>,
    image_failures: HashMap<ImageId, RuntimeError>,
    list_images_failure: Option<RuntimeError>,
    vanishing_containers: HashSet<ContainerId>,
    vanishing_images: HashSet<ImageId>,
    unavailable: bool,
    calls: Vec<RuntimeCall>,
}

impl State {
    fn children_of(&self, id: &ImageId) -> usize {
        self.images
            .iter()
            .filter(|i| i.parent_id.as_ref() == Some(id))
            .count()
    }

    fn containers_using(&self, id: &ImageId) -> usize {
        self.containers
            .iter()
            .filter(|c| &c.record.image_id == id)
            .count()
    }

    fn image(&self, id: &ImageId) -> Option<&ImageRecord> {
        self.images.iter().find(|i| &i.id == id)
    }

    fn check_available(&self) -> Result<(), RuntimeError> {
        if self.unavailable {
            return Err(RuntimeError::Unavailable(
                "in-memory runtime marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

/// Runtime backed by in-memory state. Single-threaded.
#[derive(Debug, Default)]
pub struct InMemoryRuntime {
    state: RefCell<State>,
}

impl InMemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a container. `finished_at` is the raw timestamp an inspect call
    /// returns (RFC 3339, Docker's zero time, or anything malformed).
    pub fn with_container(self, record: ContainerRecord, finished_at: Option<&str>) -> Self {
        self.state.borrow_mut().containers.push(StoredContainer {
            record,
            finished_at: finished_at.map(str::to_string),
        });
        self
    }

    pub fn with_image(self, record: ImageRecord) -> Self {
        self.state.borrow_mut().images.push(record);
        self
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.borrow_mut().unavailable = unavailable;
    }

    /// Make every removal of `id` fail with `error`.
    pub fn fail_container_removal(&self, id: &ContainerId, error: RuntimeError) {
        self.state
            .borrow_mut()
            .container_failures
            .insert(id.clone(), error);
    }

    /// Make every removal of `id` fail with `error`.
    pub fn fail_image_removal(&self, id: &ImageId, error: RuntimeError) {
        self.state
            .borrow_mut()
            .image_failures
            .insert(id.clone(), error);
    }

    /// Make image listing fail with `error`.
    pub fn fail_image_listing(&self, error: RuntimeError) {
        self.state.borrow_mut().list_images_failure = Some(error);
    }

    /// Drop `id` from the store right after the next listing that
    /// includes it.
    pub fn vanish_after_listing_container(&self, id: &ContainerId) {
        self.state
            .borrow_mut()
            .vanishing_containers
            .insert(id.clone());
    }

    /// Drop `id` from the store right after the next listing that
    /// includes it.
    pub fn vanish_after_listing_image(&self, id: &ImageId) {
        self.state.borrow_mut().vanishing_images.insert(id.clone());
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.borrow_mut();
        state.container_failures.clear();
        state.image_failures.clear();
        state.list_images_failure = None;
    }

    /// Remove an object behind the watcher's back.
    pub fn forget_image(&self, id: &ImageId) {
        self.state.borrow_mut().images.retain(|i| &i.id != id);
    }

    pub fn forget_container(&self, id: &ContainerId) {
        self.state
            .borrow_mut()
            .containers
            .retain(|c| &c.record.id != id);
    }

    pub fn container_ids(&self) -> Vec<ContainerId> {
        self.state
            .borrow()
            .containers
            .iter()
            .map(|c| c.record.id.clone())
            .collect()
    }

    pub fn image_ids(&self) -> Vec<ImageId> {
        self.state
            .borrow()
            .images
            .iter()
            .map(|i| i.id.clone())
            .collect()
    }

    pub fn has_image(&self, id: &ImageId) -> bool {
        self.state.borrow().image(id).is_some()
    }

    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.state.borrow().calls.clone()
    }

    pub fn removal_calls(&self) -> Vec<RuntimeCall> {
        self.calls().into_iter().filter(|c| c.is_removal()).collect()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    fn record(&self, call: RuntimeCall) {
        self.state.borrow_mut().calls.push(call);
    }
}

impl Runtime for InMemoryRuntime {
    fn list_containers(&self, include_stopped: bool) -> Result<Vec<ContainerRecord>, RuntimeError> {
        self.record(RuntimeCall::ListContainers { include_stopped });
        let mut state = self.state.borrow_mut();
        state.check_available()?;
        let listed: Vec<ContainerRecord> = state
            .containers
            .iter()
            .filter(|c| include_stopped || c.record.state == ContainerState::Running)
            .map(|c| ContainerRecord {
                finished_at: None,
                size_rw: None,
                ..c.record.clone()
            })
            .collect();

        let gone = std::mem::take(&mut state.vanishing_containers);
        let (now_gone, later): (HashSet<_>, HashSet<_>) = gone
            .into_iter()
            .partition(|id| listed.iter().any(|c| &c.id == id));
        state.containers.retain(|c| !now_gone.contains(&c.record.id));
        state.vanishing_containers = later;
        Ok(listed)
    }

    fn inspect_container(&self, id: &ContainerId) -> Result<ContainerDetails, RuntimeError> {
        self.record(RuntimeCall::InspectContainer(id.clone()));
        let state = self.state.borrow();
        state.check_available()?;
        state
            .containers
            .iter()
            .find(|c| &c.record.id == id)
            .map(|c| ContainerDetails {
                finished_at: c.finished_at.clone(),
                size_rw: c.record.size_rw,
            })
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))
    }

    fn list_images(&self, include_intermediate: bool) -> Result<Vec<ImageRecord>, RuntimeError> {
        self.record(RuntimeCall::ListImages {
            include_intermediate,
        });
        let mut state = self.state.borrow_mut();
        state.check_available()?;
        if let Some(err) = &state.list_images_failure {
            return Err(err.clone());
        }
        let listed: Vec<ImageRecord> = state
            .images
            .iter()
            .filter(|i| include_intermediate || !i.is_dangling() || state.children_of(&i.id) == 0)
            .map(|i| ImageRecord {
                containers: Some(state.containers_using(&i.id) as u32),
                ..i.clone()
            })
            .collect();

        let gone = std::mem::take(&mut state.vanishing_images);
        let (now_gone, later): (HashSet<_>, HashSet<_>) = gone
            .into_iter()
            .partition(|id| listed.iter().any(|i| &i.id == id));
        state.images.retain(|i| !now_gone.contains(&i.id));
        state.vanishing_images = later;
        Ok(listed)
    }

    fn remove_container(
        &self,
        id: &ContainerId,
        options: ContainerRemoveOptions,
    ) -> Result<(), RuntimeError> {
        self.record(RuntimeCall::RemoveContainer(id.clone()));
        let mut state = self.state.borrow_mut();
        state.check_available()?;
        if let Some(err) = state.container_failures.get(id) {
            return Err(err.clone());
        }
        let pos = state
            .containers
            .iter()
            .position(|c| &c.record.id == id)
            .ok_or_else(|| RuntimeError::NotFound(format!("No such container: {}", id)))?;
        if state.containers[pos].record.state == ContainerState::Running && !options.force {
            return Err(RuntimeError::Rejected {
                operation: "container remove".to_string(),
                status: 409,
                message: format!("cannot remove running container {}", id.short()),
            });
        }
        state.containers.remove(pos);
        Ok(())
    }

    fn remove_image(
        &self,
        id: &ImageId,
        options: ImageRemoveOptions,
    ) -> Result<Vec<ImageId>, RuntimeError> {
        self.record(RuntimeCall::RemoveImage(id.clone()));
        let mut state = self.state.borrow_mut();
        state.check_available()?;
        if let Some(err) = state.image_failures.get(id) {
            return Err(err.clone());
        }
        let parent = match state.image(id) {
            Some(image) => image.parent_id.clone(),
            None => return Err(RuntimeError::NotFound(format!("No such image: {}", id))),
        };
        if !options.force {
            let conflict = if state.children_of(id) > 0 {
                Some("image has dependent child images")
            } else if state.containers_using(id) > 0 {
                Some("image is being used by a container")
            } else {
                None
            };
            if let Some(reason) = conflict {
                return Err(RuntimeError::Rejected {
                    operation: "image remove".to_string(),
                    status: 409,
                    message: format!("conflict: unable to delete {} ({})", id.short(), reason),
                });
            }
        }

        state.images.retain(|i| &i.id != id);
        let mut deleted = vec![id.clone()];

        if options.prune_children {
            let mut next = parent;
            while let Some(parent_id) = next {
                let prunable = match state.image(&parent_id) {
                    Some(p) => {
                        p.is_dangling()
                            && state.children_of(&parent_id) == 0
                            && state.containers_using(&parent_id) == 0
                    }
                    None => false,
                };
                if !prunable {
                    break;
                }
                next = state.image(&parent_id).and_then(|p| p.parent_id.clone());
                state.images.retain(|i| i.id != parent_id);
                deleted.push(parent_id);
            }
        }
        Ok(deleted)
    }

    fn status(&self) -> Result<DaemonStatus, RuntimeError> {
        self.record(RuntimeCall::Status);
        let state = self.state.borrow();
        state.check_available()?;
        let count = |s: ContainerState| {
            state
                .containers
                .iter()
                .filter(|c| c.record.state == s)
                .count() as u64
        };
        let running = count(ContainerState::Running);
        let paused = count(ContainerState::Paused);
        let total = state.containers.len() as u64;
        Ok(DaemonStatus {
            server_version: "in-memory".to_string(),
            api_version: "1.43".to_string(),
            min_api_version: "1.12".to_string(),
            go_version: "n/a".to_string(),
            containers: total,
            containers_running: running,
            containers_paused: paused,
            containers_stopped: total - running - paused,
            images: state.images.len() as u64,
            layers_size: Some(state.images.iter().map(|i| i.size).sum()),
        })
    }
}

/// Build a container record for tests and demos.
pub fn container_fixture(
    id: &str,
    state: ContainerState,
    name: &str,
    image_id: &str,
) -> ContainerRecord {
    ContainerRecord {
        id: ContainerId::new(id),
        status: state.to_string(),
        state,
        names: vec![format!("/{}", name)],
        image_id: ImageId::new(image_id),
        finished_at: None,
        size_rw: Some(0),
    }
}

/// Build an image record for tests and demos.
pub fn image_fixture(
    id: &str,
    created_at: Option<i64>,
    parent_id: Option<&str>,
    tags: &[&str],
) -> ImageRecord {
    ImageRecord {
        id: ImageId::new(id),
        created_at,
        parent_id: parent_id.map(ImageId::new),
        repo_tags: tags.iter().map(|t| t.to_string()).collect(),
        containers: None,
        size: 1_000_000,
    }
}
