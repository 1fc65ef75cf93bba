//! Idempotent, partial-failure-tolerant removal of marked items.

use crate::evaluate::DecisionSet;
use crate::inventory::{ContainerSnapshot, ImageSnapshot};
use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};
use crate::runtime::{ContainerRemoveOptions, ImageRemoveOptions, Runtime, RuntimeError};
use crate::status::{describe_container, describe_image};
use dw_common::{ContainerId, ImageId};
use serde::Serialize;
use std::collections::HashSet;
use tracing::info;

/// Containers are force-removed together with their anonymous volumes.
pub const CONTAINER_REMOVE_OPTIONS: ContainerRemoveOptions = ContainerRemoveOptions {
    remove_volumes: true,
    force: true,
};

/// Images are force-removed and their untagged parents pruned.
pub const IMAGE_REMOVE_OPTIONS: ImageRemoveOptions = ImageRemoveOptions {
    force: true,
    prune_children: true,
};

/// What a removal attempt targeted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemovalTarget {
    Container {
        id: ContainerId,
        names: Vec<String>,
        size: Option<u64>,
    },
    Image {
        id: ImageId,
        tags: Vec<String>,
        size: u64,
    },
}

impl RemovalTarget {
    pub fn id(&self) -> &str {
        match self {
            RemovalTarget::Container { id, .. } => id.as_str(),
            RemovalTarget::Image { id, .. } => id.as_str(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RemovalTarget::Container { .. } => "container",
            RemovalTarget::Image { .. } => "image",
        }
    }
}

/// Status of a single removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RemovalStatus {
    Removed,
    /// Deleted earlier in the pass or gone before the call.
    AlreadyRemoved,
    /// Dry run; no runtime call was made.
    DryRun,
    Failed { error: String },
}

/// Result of one removal attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovalOutcome {
    pub target: RemovalTarget,
    /// 1-based position among successful removals of this batch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<usize>,
    pub status: RemovalStatus,
    /// Other images the runtime deleted as a side effect.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cascaded: Vec<ImageId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RemovalSummary {
    pub attempted: usize,
    pub removed: usize,
    pub already_removed: usize,
    pub failed: usize,
}

/// Outcomes of one batch, in decision order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemovalReport {
    pub summary: RemovalSummary,
    pub outcomes: Vec<RemovalOutcome>,
}

impl RemovalReport {
    fn push(&mut self, outcome: RemovalOutcome) {
        self.summary.attempted += 1;
        match outcome.status {
            RemovalStatus::Removed | RemovalStatus::DryRun => self.summary.removed += 1,
            RemovalStatus::AlreadyRemoved => self.summary.already_removed += 1,
            RemovalStatus::Failed { .. } => self.summary.failed += 1,
        }
        self.outcomes.push(outcome);
    }

    /// No removal failed.
    pub fn is_clean(&self) -> bool {
        self.summary.failed == 0
    }

    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &RemovalOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, RemovalStatus::Failed { .. }))
    }
}

/// Issues removal commands for the `remove` verdicts of a decision set.
pub struct RemovalExecutor<'a> {
    runtime: &'a dyn Runtime,
    ctx: &'a LogContext,
    dry_run: bool,
}

impl<'a> RemovalExecutor<'a> {
    pub fn new(runtime: &'a dyn Runtime, ctx: &'a LogContext) -> Self {
        Self {
            runtime,
            ctx,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn remove_containers(
        &self,
        decisions: &DecisionSet<ContainerId>,
        snapshot: &ContainerSnapshot,
    ) -> RemovalReport {
        let mut report = RemovalReport::default();
        let mut sequence = 0;
        let mut removed: HashSet<ContainerId> = HashSet::new();

        for id in decisions.removals() {
            if !removed.insert(id.clone()) {
                continue;
            }
            let record = snapshot.get(id);
            let target = RemovalTarget::Container {
                id: id.clone(),
                names: record
                    .map(|c| c.trimmed_names().map(str::to_string).collect())
                    .unwrap_or_default(),
                size: record.and_then(|c| c.size_rw),
            };

            let status = if self.dry_run {
                RemovalStatus::DryRun
            } else {
                to_status(
                    "container",
                    id.as_str(),
                    self.runtime.remove_container(id, CONTAINER_REMOVE_OPTIONS),
                )
            };

            let seq = numbered(&status, &mut sequence);
            if let (Some(n), Some(record)) = (seq, record) {
                info!("{}", describe_container(n, record));
            }
            self.log_result(&target, &status);
            report.push(RemovalOutcome {
                target,
                sequence: seq,
                status,
                cascaded: Vec::new(),
            });
        }

        self.finish("container", &report);
        report
    }

    pub fn remove_images(
        &self,
        decisions: &DecisionSet<ImageId>,
        snapshot: &ImageSnapshot,
    ) -> RemovalReport {
        let mut report = RemovalReport::default();
        let mut sequence = 0;
        let mut removed: HashSet<ImageId> = HashSet::new();

        for id in decisions.removals() {
            let record = snapshot.get(id);
            let target = RemovalTarget::Image {
                id: id.clone(),
                tags: record
                    .map(|i| i.tags().map(str::to_string).collect())
                    .unwrap_or_default(),
                size: record.map(|i| i.size).unwrap_or(0),
            };

            let mut cascaded = Vec::new();
            let status = if removed.contains(id) {
                RemovalStatus::AlreadyRemoved
            } else if self.dry_run {
                removed.insert(id.clone());
                RemovalStatus::DryRun
            } else {
                match self.runtime.remove_image(id, IMAGE_REMOVE_OPTIONS) {
                    Ok(deleted) => {
                        removed.insert(id.clone());
                        for other in deleted {
                            if &other != id && removed.insert(other.clone()) {
                                cascaded.push(other);
                            }
                        }
                        RemovalStatus::Removed
                    }
                    Err(err) => {
                        if err.is_not_found() {
                            removed.insert(id.clone());
                        }
                        to_status("image", id.as_str(), Err(err))
                    }
                }
            };

            let seq = numbered(&status, &mut sequence);
            if let (Some(n), Some(record)) = (seq, record) {
                info!("{}", describe_image(n, record));
            }
            self.log_result(&target, &status);
            report.push(RemovalOutcome {
                target,
                sequence: seq,
                status,
                cascaded,
            });
        }

        self.finish("image", &report);
        report
    }

    fn log_result(&self, target: &RemovalTarget, status: &RemovalStatus) {
        match status {
            RemovalStatus::Failed { error } => log_event!(
                self.ctx,
                WARN,
                event_names::REMOVE_RESULT,
                Stage::Remove,
                format!("failed to remove {} {}", target.kind(), target.id()),
                kind = target.kind(),
                id = target.id(),
                error = error.as_str()
            ),
            other => log_event!(
                self.ctx,
                DEBUG,
                event_names::REMOVE_RESULT,
                Stage::Remove,
                format!("{} {} {:?}", target.kind(), target.id(), other),
                kind = target.kind(),
                id = target.id()
            ),
        }
    }

    fn finish(&self, kind: &str, report: &RemovalReport) {
        if report.outcomes.is_empty() {
            log_event!(
                self.ctx,
                INFO,
                event_names::REMOVE_NOTHING,
                Stage::Remove,
                format!("No {}s to remove found.", kind),
                kind = kind
            );
            return;
        }
        log_event!(
            self.ctx,
            INFO,
            event_names::REMOVE_FINISHED,
            Stage::Remove,
            format!(
                "{} removal finished: {} removed, {} already gone, {} failed",
                kind,
                report.summary.removed,
                report.summary.already_removed,
                report.summary.failed
            ),
            kind = kind,
            dry_run = self.dry_run,
            attempted = report.summary.attempted,
            removed = report.summary.removed,
            failed = report.summary.failed
        );
    }
}

fn to_status(kind: &str, id: &str, result: Result<(), RuntimeError>) -> RemovalStatus {
    match result {
        Ok(()) => RemovalStatus::Removed,
        Err(err) if err.is_not_found() => RemovalStatus::AlreadyRemoved,
        Err(err) => RemovalStatus::Failed {
            error: dw_common::Error::RemovalFailed {
                kind: kind.to_string(),
                id: id.to_string(),
                message: err.to_string(),
            }
            .to_string(),
        },
    }
}

fn numbered(status: &RemovalStatus, counter: &mut usize) -> Option<usize> {
    match status {
        RemovalStatus::Removed | RemovalStatus::DryRun => {
            *counter += 1;
            Some(*counter)
        }
        _ => None,
    }
}
