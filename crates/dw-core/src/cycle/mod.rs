//! Collection cycle.
//!
//! One pass runs two phases in a fixed order:
//!
//! ```text
//! containers: snapshot → evaluate → remove
//! images:     snapshot → evaluate → remove
//! ```
//!
//! Containers go first so images they pinned can be collected in the same
//! pass. A single `now` is captured by the caller and used for every
//! verdict of the pass.
//!
//! The [`watcher`] module drives passes on an interval.

pub mod watcher;

pub use watcher::{
    Clock, LastPass, Sleeper, SystemClock, ThreadSleeper, WatchOptions, WatchState, WatchStats,
    Watcher,
};

use crate::evaluate::{evaluate_containers, evaluate_images, DecisionSet, Verdict};
use crate::inventory::{ContainerSnapshot, ImageSnapshot, MalformedField};
use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};
use crate::removal::{RemovalExecutor, RemovalReport};
use crate::runtime::{Runtime, RuntimeError};
use dw_common::ImageId;
use dw_config::RetentionPolicy;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Resource type handled by one half of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Containers,
    Images,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Containers => write!(f, "containers"),
            Phase::Images => write!(f, "images"),
        }
    }
}

/// Evaluation counts and removal outcomes for one phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    pub evaluated: usize,
    pub marked: usize,
    pub kept: usize,
    /// Records whose timestamps could not be parsed.
    pub malformed: usize,
    pub removal: RemovalReport,
}

impl PhaseReport {
    fn new<K: Clone + Eq + std::hash::Hash>(
        decisions: &DecisionSet<K>,
        malformed: usize,
        removal: RemovalReport,
    ) -> Self {
        Self {
            evaluated: decisions.len(),
            marked: decisions.removal_count(),
            kept: decisions.keep_count(),
            malformed,
            removal,
        }
    }
}

/// How a completed pass went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassOutcome {
    /// Nothing was marked for removal.
    Clean,
    /// Every marked item was removed.
    Removed,
    /// At least one removal failed.
    Partial,
}

/// Result of one completed pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub pass_number: u64,
    pub pass_id: String,
    /// Epoch seconds every verdict of the pass was judged against.
    pub now: i64,
    pub dry_run: bool,
    pub containers: PhaseReport,
    pub images: PhaseReport,
}

impl PassReport {
    pub fn removed(&self) -> usize {
        self.containers.removal.summary.removed + self.images.removal.summary.removed
    }

    pub fn failed(&self) -> usize {
        self.containers.removal.summary.failed + self.images.removal.summary.failed
    }

    pub fn outcome(&self) -> PassOutcome {
        if self.failed() > 0 {
            PassOutcome::Partial
        } else if self.removed() > 0 {
            PassOutcome::Removed
        } else {
            PassOutcome::Clean
        }
    }
}

/// A pass that could not complete.
#[derive(Debug, Error)]
pub enum CycleError {
    /// An inventory query failed; nothing further was attempted.
    #[error("{phase} query failed: {source}")]
    Query {
        phase: Phase,
        #[source]
        source: RuntimeError,
        /// Container phase results when the image query was the one to fail.
        containers: Option<Box<PhaseReport>>,
    },
}

impl CycleError {
    pub fn runtime_error(&self) -> &RuntimeError {
        match self {
            CycleError::Query { source, .. } => source,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.runtime_error().is_retryable()
    }
}

// ---------------------------------------------------------------------------
// Pass
// ---------------------------------------------------------------------------

/// Runs passes against one runtime with one policy.
pub struct CollectionCycle<'a> {
    runtime: &'a dyn Runtime,
    policy: &'a RetentionPolicy,
    ctx: &'a LogContext,
    dry_run: bool,
}

impl<'a> CollectionCycle<'a> {
    pub fn new(runtime: &'a dyn Runtime, policy: &'a RetentionPolicy, ctx: &'a LogContext) -> Self {
        Self {
            runtime,
            policy,
            ctx,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn policy(&self) -> &RetentionPolicy {
        self.policy
    }

    /// Run one full pass judged against `now` (epoch seconds).
    pub fn run_pass(&self, pass_number: u64, now: i64) -> Result<PassReport, CycleError> {
        let pass_id = new_pass_id(pass_number);
        let ctx = self.ctx.clone().with_pass_id(pass_id.clone());
        log_event!(
            ctx,
            INFO,
            event_names::PASS_STARTED,
            Stage::Snapshot,
            format!("pass {} started", pass_number),
            pass_number = pass_number,
            now = now,
            dry_run = self.dry_run
        );

        let executor = RemovalExecutor::new(self.runtime, &ctx).with_dry_run(self.dry_run);

        let containers = self
            .container_phase(&ctx, &executor, now)
            .map_err(|source| self.abort(&ctx, Phase::Containers, source, None))?;

        let images = match self.image_phase(&ctx, &executor, now) {
            Ok(images) => images,
            Err(source) => {
                return Err(self.abort(&ctx, Phase::Images, source, Some(containers)));
            }
        };

        let report = PassReport {
            pass_number,
            pass_id,
            now,
            dry_run: self.dry_run,
            containers,
            images,
        };
        log_event!(
            ctx,
            INFO,
            event_names::PASS_FINISHED,
            Stage::Report,
            format!(
                "pass {} finished: {} removed, {} failed",
                pass_number,
                report.removed(),
                report.failed()
            ),
            containers_removed = report.containers.removal.summary.removed,
            images_removed = report.images.removal.summary.removed,
            failed = report.failed()
        );
        Ok(report)
    }

    fn container_phase(
        &self,
        ctx: &LogContext,
        executor: &RemovalExecutor<'_>,
        now: i64,
    ) -> Result<PhaseReport, RuntimeError> {
        let snapshot = ContainerSnapshot::capture(self.runtime)?;
        log_event!(
            ctx,
            DEBUG,
            event_names::SNAPSHOT_CAPTURED,
            Stage::Snapshot,
            format!("{} containers listed", snapshot.len()),
            count = snapshot.len()
        );

        log_malformed(ctx, snapshot.malformed());

        let decisions = evaluate_containers(&snapshot, self.policy, now);
        for (id, verdict) in decisions.iter() {
            let names = snapshot
                .get(id)
                .map(|c| c.trimmed_names().collect::<Vec<_>>().join(","))
                .unwrap_or_default();
            log_decision(ctx, "container", id.as_str(), &names, verdict);
        }
        log_evaluated(ctx, Phase::Containers, &decisions);

        let removal = executor.remove_containers(&decisions, &snapshot);
        Ok(PhaseReport::new(&decisions, snapshot.malformed().len(), removal))
    }

    fn image_phase(
        &self,
        ctx: &LogContext,
        executor: &RemovalExecutor<'_>,
        now: i64,
    ) -> Result<PhaseReport, RuntimeError> {
        let snapshot = ImageSnapshot::capture(self.runtime)?;
        log_event!(
            ctx,
            DEBUG,
            event_names::SNAPSHOT_CAPTURED,
            Stage::Snapshot,
            format!("{} images listed", snapshot.len()),
            count = snapshot.len()
        );

        log_malformed(ctx, snapshot.malformed());

        let decisions: DecisionSet<ImageId> = evaluate_images(&snapshot, self.policy, now);
        for (id, verdict) in decisions.iter() {
            let tags = snapshot
                .get(id)
                .map(|i| i.tags().collect::<Vec<_>>().join(","))
                .unwrap_or_default();
            log_decision(ctx, "image", id.as_str(), &tags, verdict);
        }
        log_evaluated(ctx, Phase::Images, &decisions);

        let removal = executor.remove_images(&decisions, &snapshot);
        Ok(PhaseReport::new(&decisions, snapshot.malformed().len(), removal))
    }

    fn abort(
        &self,
        ctx: &LogContext,
        phase: Phase,
        source: RuntimeError,
        containers: Option<PhaseReport>,
    ) -> CycleError {
        log_event!(
            ctx,
            WARN,
            event_names::PASS_ABORTED,
            Stage::Snapshot,
            format!("pass aborted, {} query failed: {}", phase, source),
            retryable = source.is_retryable()
        );
        CycleError::Query {
            phase,
            source,
            containers: containers.map(Box::new),
        }
    }
}

fn new_pass_id(pass_number: u64) -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("pass-{}-{}", pass_number, &uuid[..8])
}

fn log_malformed(ctx: &LogContext, fields: &[MalformedField]) {
    for field in fields {
        let error = dw_common::Error::from(field.clone()).to_string();
        log_event!(
            ctx,
            WARN,
            event_names::SNAPSHOT_MALFORMED,
            Stage::Snapshot,
            "treating age as unknown",
            id = field.id.as_str(),
            error = error.as_str()
        );
    }
}

fn log_decision(ctx: &LogContext, kind: &str, id: &str, labels: &str, verdict: &Verdict) {
    let reason = verdict.reason.to_string();
    if verdict.is_remove() {
        log_event!(
            ctx,
            INFO,
            event_names::EVALUATE_DECISION,
            Stage::Evaluate,
            format!("{} {} marked for removal: {}", kind, id, reason),
            kind = kind,
            id = id,
            labels = labels,
            decision = "remove",
            reason = reason.as_str()
        );
    } else {
        log_event!(
            ctx,
            DEBUG,
            event_names::EVALUATE_DECISION,
            Stage::Evaluate,
            format!("{} {} kept: {}", kind, id, reason),
            kind = kind,
            id = id,
            labels = labels,
            decision = "keep",
            reason = reason.as_str()
        );
    }
}

fn log_evaluated<K: Clone + Eq + std::hash::Hash>(
    ctx: &LogContext,
    phase: Phase,
    decisions: &DecisionSet<K>,
) {
    log_event!(
        ctx,
        INFO,
        event_names::EVALUATE_FINISHED,
        Stage::Evaluate,
        format!(
            "{} evaluated: {} marked, {} kept",
            phase,
            decisions.removal_count(),
            decisions.keep_count()
        ),
        evaluated = decisions.len(),
        marked = decisions.removal_count()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{container_fixture, image_fixture, InMemoryRuntime, RuntimeCall};
    use dw_common::{ContainerId, ContainerState};

    const NOW: i64 = 1_700_000_000;
    const OLD: &str = "2023-01-01T00:00:00Z";

    fn ctx() -> LogContext {
        LogContext::new("run-test", "host-test")
    }

    #[test]
    fn removing_a_container_frees_its_image() {
        let rt = InMemoryRuntime::new()
            .with_image(image_fixture("img", Some(NOW - 400_000), None, &["job:1"]))
            .with_container(
                container_fixture("c1", ContainerState::Exited, "job", "img"),
                Some(OLD),
            );
        let policy = RetentionPolicy::default();
        let ctx = ctx();
        let report = CollectionCycle::new(&rt, &policy, &ctx)
            .run_pass(1, NOW)
            .unwrap();

        assert_eq!(report.containers.removal.summary.removed, 1);
        assert_eq!(report.images.removal.summary.removed, 1);
        assert_eq!(report.outcome(), PassOutcome::Removed);
        assert_eq!(
            rt.removal_calls(),
            vec![
                RuntimeCall::RemoveContainer(ContainerId::new("c1")),
                RuntimeCall::RemoveImage(ImageId::new("img")),
            ]
        );
    }

    #[test]
    fn image_query_failure_keeps_container_results() {
        let rt = InMemoryRuntime::new().with_container(
            container_fixture("c1", ContainerState::Exited, "job", "img"),
            Some(OLD),
        );
        rt.fail_image_listing(RuntimeError::Timeout {
            operation: "image list".into(),
            after: std::time::Duration::from_secs(60),
        });
        let policy = RetentionPolicy::default();
        let ctx = ctx();
        let err = CollectionCycle::new(&rt, &policy, &ctx)
            .run_pass(1, NOW)
            .unwrap_err();

        assert!(err.is_retryable());
        match err {
            CycleError::Query {
                phase, containers, ..
            } => {
                assert_eq!(phase, Phase::Images);
                assert_eq!(containers.unwrap().removal.summary.removed, 1);
            }
        }
    }

    #[test]
    fn unavailable_runtime_aborts_before_any_removal() {
        let rt = InMemoryRuntime::new();
        rt.set_unavailable(true);
        let policy = RetentionPolicy::default();
        let ctx = ctx();
        let err = CollectionCycle::new(&rt, &policy, &ctx)
            .run_pass(1, NOW)
            .unwrap_err();
        assert!(matches!(
            err,
            CycleError::Query {
                phase: Phase::Containers,
                ..
            }
        ));
        assert!(rt.removal_calls().is_empty());
    }

    #[test]
    fn empty_inventory_is_a_clean_pass() {
        let rt = InMemoryRuntime::new();
        let policy = RetentionPolicy::default();
        let ctx = ctx();
        let report = CollectionCycle::new(&rt, &policy, &ctx)
            .run_pass(7, NOW)
            .unwrap();
        assert_eq!(report.pass_number, 7);
        assert!(report.pass_id.starts_with("pass-7-"));
        assert_eq!(report.outcome(), PassOutcome::Clean);
    }
}
