//! Docker Engine API backend.
//!
//! Talks to the daemon through `bollard`. The watcher loop is synchronous,
//! so the backend owns a current-thread tokio runtime and blocks on one
//! request at a time, each bounded by the configured call timeout.

use super::{
    ContainerDetails, ContainerRemoveOptions, ImageRemoveOptions, Runtime, RuntimeError,
};
use crate::status::DaemonStatus;
use bollard::container::{
    InspectContainerOptions, ListContainersOptions, RemoveContainerOptions,
};
use bollard::errors::Error as EngineError;
use bollard::image::{ListImagesOptions, RemoveImageOptions};
use bollard::models::{ContainerSummary, ImageDeleteResponseItem, ImageSummary};
use bollard::{Docker, API_DEFAULT_VERSION};
use dw_common::{ContainerId, ContainerRecord, ContainerState, ImageId, ImageRecord};
use std::future::Future;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime as AsyncRuntime};
use tracing::debug;

/// Runtime backed by the Docker Engine API.
#[derive(Debug)]
pub struct DockerEngine {
    client: Docker,
    executor: AsyncRuntime,
    timeout: Duration,
}

impl DockerEngine {
    /// Connect to `host` (`unix://…`, `tcp://…`, `http://…`), or to
    /// `DOCKER_HOST` and then the local socket when `host` is `None`.
    ///
    /// No request is sent; an unreachable daemon surfaces on the first call.
    pub fn connect(host: Option<&str>, timeout: Duration) -> Result<Self, RuntimeError> {
        let executor = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| RuntimeError::Unavailable(format!("cannot start engine client: {}", e)))?;

        let secs = timeout.as_secs().max(1);
        let client = {
            let _guard = executor.enter();
            match host {
                Some(host) if host.starts_with("unix://") => {
                    Docker::connect_with_socket(host, secs, API_DEFAULT_VERSION)
                }
                Some(host) => Docker::connect_with_http(host, secs, API_DEFAULT_VERSION),
                None => Docker::connect_with_local_defaults(),
            }
        }
        .map_err(|e| RuntimeError::Unavailable(e.to_string()))?;

        Ok(Self {
            client: client.with_timeout(timeout),
            executor,
            timeout,
        })
    }

    fn call<T, F>(&self, operation: &str, request: F) -> Result<T, RuntimeError>
    where
        F: Future<Output = Result<T, EngineError>>,
    {
        self.executor.block_on(async {
            match tokio::time::timeout(self.timeout, request).await {
                Ok(result) => result.map_err(|err| classify(operation, self.timeout, err)),
                Err(_) => Err(RuntimeError::Timeout {
                    operation: operation.to_string(),
                    after: self.timeout,
                }),
            }
        })
    }
}

impl Runtime for DockerEngine {
    fn list_containers(&self, include_stopped: bool) -> Result<Vec<ContainerRecord>, RuntimeError> {
        let options = ListContainersOptions::<String> {
            all: include_stopped,
            size: false,
            ..Default::default()
        };
        let summaries = self.call(
            "container list",
            self.client.list_containers(Some(options)),
        )?;
        debug!(count = summaries.len(), "listed containers");
        Ok(summaries.into_iter().filter_map(container_record).collect())
    }

    fn inspect_container(&self, id: &ContainerId) -> Result<ContainerDetails, RuntimeError> {
        let response = self.call(
            "container inspect",
            self.client
                .inspect_container(id.as_str(), Some(InspectContainerOptions { size: true })),
        )?;
        Ok(ContainerDetails {
            finished_at: response.state.and_then(|state| state.finished_at),
            size_rw: response.size_rw.and_then(|s| u64::try_from(s).ok()),
        })
    }

    fn list_images(&self, include_intermediate: bool) -> Result<Vec<ImageRecord>, RuntimeError> {
        let options = ListImagesOptions::<String> {
            all: include_intermediate,
            ..Default::default()
        };
        let summaries = self.call("image list", self.client.list_images(Some(options)))?;
        debug!(count = summaries.len(), "listed images");
        Ok(summaries.into_iter().map(image_record).collect())
    }

    fn remove_container(
        &self,
        id: &ContainerId,
        options: ContainerRemoveOptions,
    ) -> Result<(), RuntimeError> {
        let options = RemoveContainerOptions {
            v: options.remove_volumes,
            force: options.force,
            ..Default::default()
        };
        self.call(
            "container remove",
            self.client.remove_container(id.as_str(), Some(options)),
        )
    }

    fn remove_image(
        &self,
        id: &ImageId,
        options: ImageRemoveOptions,
    ) -> Result<Vec<ImageId>, RuntimeError> {
        let options = RemoveImageOptions {
            force: options.force,
            noprune: !options.prune_children,
        };
        let items = self.call(
            "image remove",
            self.client.remove_image(id.as_str(), Some(options), None),
        )?;
        Ok(deleted_ids(items))
    }

    fn status(&self) -> Result<DaemonStatus, RuntimeError> {
        let version = self.call("version", self.client.version())?;
        let info = self.call("info", self.client.info())?;

        // Disk usage walks every layer and may be slow; a report without it
        // is still useful.
        let layers_size = match self.call("system df", self.client.df()) {
            Ok(usage) => usage.layers_size.and_then(|s| u64::try_from(s).ok()),
            Err(err) => {
                debug!(error = %err, "disk usage unavailable");
                None
            }
        };

        let count = |n: Option<i64>| n.and_then(|n| u64::try_from(n).ok()).unwrap_or(0);
        Ok(DaemonStatus {
            server_version: version.version.unwrap_or_default(),
            api_version: version.api_version.unwrap_or_default(),
            min_api_version: version.min_api_version.unwrap_or_default(),
            go_version: version.go_version.unwrap_or_default(),
            containers: count(info.containers),
            containers_running: count(info.containers_running),
            containers_paused: count(info.containers_paused),
            containers_stopped: count(info.containers_stopped),
            images: count(info.images),
            layers_size,
        })
    }
}

fn container_record(summary: ContainerSummary) -> Option<ContainerRecord> {
    let id = summary.id?;
    let status = summary.status.unwrap_or_default();
    let state = match summary.state.as_deref() {
        Some(token) if !token.is_empty() => ContainerState::parse(token),
        _ => ContainerState::parse(&status),
    };
    let image_id = summary
        .image_id
        .filter(|i| !i.is_empty())
        .or(summary.image)
        .unwrap_or_default();
    Some(ContainerRecord {
        id: ContainerId::new(id),
        status,
        state,
        names: summary.names.unwrap_or_default(),
        image_id: ImageId::new(image_id),
        finished_at: None,
        size_rw: None,
    })
}

fn image_record(summary: ImageSummary) -> ImageRecord {
    let parent_id = Some(summary.parent_id)
        .filter(|p| !p.trim().is_empty())
        .map(ImageId::new);
    ImageRecord {
        id: ImageId::new(summary.id),
        created_at: Some(summary.created),
        parent_id,
        repo_tags: summary.repo_tags,
        // -1 means the daemon did not compute the count.
        containers: u32::try_from(summary.containers).ok(),
        size: u64::try_from(summary.size).unwrap_or(0),
    }
}

fn deleted_ids(items: Vec<ImageDeleteResponseItem>) -> Vec<ImageId> {
    items
        .into_iter()
        .filter_map(|item| item.deleted)
        .map(ImageId::new)
        .collect()
}

/// Map a client error onto the runtime error taxonomy.
fn classify(operation: &str, timeout: Duration, err: EngineError) -> RuntimeError {
    match err {
        EngineError::DockerResponseServerError {
            status_code: 404,
            message,
        } => RuntimeError::NotFound(message),
        EngineError::DockerResponseServerError {
            status_code,
            message,
        } => RuntimeError::Rejected {
            operation: operation.to_string(),
            status: status_code,
            message,
        },
        EngineError::RequestTimeoutError => RuntimeError::Timeout {
            operation: operation.to_string(),
            after: timeout,
        },
        err @ EngineError::JsonSerdeError { .. } => {
            RuntimeError::Parse(format!("{} response: {}", operation, err))
        }
        other => RuntimeError::Unavailable(format!("{}: {}", operation, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_error(status_code: u16, message: &str) -> EngineError {
        EngineError::DockerResponseServerError {
            status_code,
            message: message.to_string(),
        }
    }

    #[test]
    fn missing_object_is_not_found() {
        let err = classify(
            "container inspect",
            Duration::from_secs(60),
            server_error(404, "No such container: 4f1c"),
        );
        assert!(err.is_not_found());
    }

    #[test]
    fn conflict_is_rejected_not_retryable() {
        let err = classify(
            "image remove",
            Duration::from_secs(60),
            server_error(409, "conflict: unable to delete 1a2b (must be forced)"),
        );
        match &err {
            RuntimeError::Rejected { status, .. } => assert_eq!(*status, 409),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!err.is_retryable());
    }

    #[test]
    fn client_timeout_keeps_the_operation() {
        let err = classify(
            "image list",
            Duration::from_secs(5),
            EngineError::RequestTimeoutError,
        );
        assert_eq!(
            err,
            RuntimeError::Timeout {
                operation: "image list".to_string(),
                after: Duration::from_secs(5),
            }
        );
    }

    #[test]
    fn container_summary_maps_state_and_image() {
        let summary = ContainerSummary {
            id: Some("4f1c0a".to_string()),
            names: Some(vec!["/web_1".to_string()]),
            image: Some("nginx:1.25".to_string()),
            image_id: Some("sha256:abc".to_string()),
            state: Some("exited".to_string()),
            status: Some("Exited (0) 3 days ago".to_string()),
            ..Default::default()
        };
        let record = container_record(summary).unwrap();
        assert_eq!(record.state, ContainerState::Exited);
        assert_eq!(record.names, vec!["/web_1".to_string()]);
        assert_eq!(record.image_id.as_str(), "sha256:abc");
        assert_eq!(record.size_rw, None);
        assert_eq!(record.finished_at, None);
    }

    #[test]
    fn container_without_state_falls_back_to_status() {
        let summary = ContainerSummary {
            id: Some("c2".to_string()),
            image: Some("sha256:def".to_string()),
            status: Some("Created".to_string()),
            ..Default::default()
        };
        let record = container_record(summary).unwrap();
        assert_eq!(record.state, ContainerState::Created);
        assert_eq!(record.image_id.as_str(), "sha256:def");

        assert!(container_record(ContainerSummary::default()).is_none());
    }

    #[test]
    fn image_summary_maps_parent_and_counts() {
        let image = image_record(ImageSummary {
            id: "sha256:bbb".to_string(),
            parent_id: "sha256:aaa".to_string(),
            repo_tags: vec!["app:1".to_string()],
            created: 1_704_067_200,
            size: 10,
            containers: 2,
            ..Default::default()
        });
        assert_eq!(image.parent_id, Some(ImageId::new("sha256:aaa")));
        assert_eq!(image.created_at, Some(1_704_067_200));
        assert_eq!(image.containers, Some(2));

        let base = image_record(ImageSummary {
            id: "sha256:aaa".to_string(),
            containers: -1,
            ..Default::default()
        });
        assert_eq!(base.parent_id, None);
        assert_eq!(base.containers, None);
        assert!(base.is_dangling());
    }

    #[test]
    fn deleted_ids_skip_untag_entries() {
        let items = vec![
            ImageDeleteResponseItem {
                untagged: Some("nginx:1.25".to_string()),
                deleted: None,
            },
            ImageDeleteResponseItem {
                untagged: None,
                deleted: Some("sha256:aaa".to_string()),
            },
            ImageDeleteResponseItem {
                untagged: None,
                deleted: Some("sha256:bbb".to_string()),
            },
        ];
        assert_eq!(
            deleted_ids(items),
            vec![ImageId::new("sha256:aaa"), ImageId::new("sha256:bbb")]
        );
    }

    #[test]
    fn unreachable_socket_is_unavailable() {
        let engine = DockerEngine::connect(
            Some("unix:///nonexistent/dw-test/docker.sock"),
            Duration::from_secs(2),
        );
        let err = match engine {
            Ok(engine) => engine.status().unwrap_err(),
            Err(err) => err,
        };
        assert!(matches!(err, RuntimeError::Unavailable(_)), "{:?}", err);
    }
}
