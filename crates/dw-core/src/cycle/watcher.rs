//! Interval-driven watch loop.
//!
//! The watcher alternates between two states: `Idle` while sleeping and
//! `Running` while a pass is in progress. A pass that aborts on a query
//! failure is logged and retried on the next interval; it never ends the
//! loop. Time and sleeping are injected so the loop can be driven in tests.

use super::{CollectionCycle, CycleError, PassOutcome, PassReport, Phase};
use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};
use crate::runtime::{Runtime, RuntimeError};
use crate::status::fetch_status_report;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Source of the pass timestamp.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Blocks between passes.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchState {
    Idle,
    Running,
}

#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Delay between the end of one pass and the start of the next.
    pub interval: Duration,
    /// Stop after this many passes (`None` runs forever).
    pub max_passes: Option<u64>,
    /// Log a daemon status report before the first pass and after each pass.
    pub status_report: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(dw_config::policy::DEFAULT_WATCH_INTERVAL_SECS),
            max_passes: None,
            status_report: true,
        }
    }
}

/// How the most recent pass ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum LastPass {
    Completed {
        outcome: PassOutcome,
    },
    Aborted {
        phase: Phase,
        error: String,
        unavailable: bool,
        timed_out: bool,
    },
}

/// Counters accumulated across passes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WatchStats {
    pub passes_completed: u64,
    pub passes_aborted: u64,
    pub containers_removed: u64,
    pub images_removed: u64,
    pub removal_failures: u64,
    pub last_pass_at: Option<DateTime<Utc>>,
    pub last_pass: Option<LastPass>,
}

impl WatchStats {
    pub fn passes_started(&self) -> u64 {
        self.passes_completed + self.passes_aborted
    }

    fn record_report(&mut self, report: &PassReport) {
        self.passes_completed += 1;
        self.containers_removed += report.containers.removal.summary.removed as u64;
        self.images_removed += report.images.removal.summary.removed as u64;
        self.removal_failures += report.failed() as u64;
        self.last_pass = Some(LastPass::Completed {
            outcome: report.outcome(),
        });
    }

    fn record_abort(&mut self, err: &CycleError) {
        self.passes_aborted += 1;
        let CycleError::Query {
            phase,
            source,
            containers,
        } = err;
        if let Some(partial) = containers {
            self.containers_removed += partial.removal.summary.removed as u64;
            self.removal_failures += partial.removal.summary.failed as u64;
        }
        self.last_pass = Some(LastPass::Aborted {
            phase: *phase,
            error: source.to_string(),
            unavailable: matches!(source, RuntimeError::Unavailable(_)),
            timed_out: matches!(source, RuntimeError::Timeout { .. }),
        });
    }
}

/// Drives [`CollectionCycle`] passes on an interval.
pub struct Watcher<'a> {
    cycle: CollectionCycle<'a>,
    runtime: &'a dyn Runtime,
    ctx: &'a LogContext,
    clock: &'a dyn Clock,
    sleeper: &'a dyn Sleeper,
    options: WatchOptions,
    state: WatchState,
    stats: WatchStats,
}

impl<'a> Watcher<'a> {
    pub fn new(
        cycle: CollectionCycle<'a>,
        runtime: &'a dyn Runtime,
        ctx: &'a LogContext,
        clock: &'a dyn Clock,
        sleeper: &'a dyn Sleeper,
        options: WatchOptions,
    ) -> Self {
        Self {
            cycle,
            runtime,
            ctx,
            clock,
            sleeper,
            options,
            state: WatchState::Idle,
            stats: WatchStats::default(),
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn stats(&self) -> &WatchStats {
        &self.stats
    }

    /// Run a single pass now, then report status if enabled.
    pub fn run_once(&mut self) -> Result<PassReport, CycleError> {
        self.state = WatchState::Running;
        let started = self.clock.now();
        let pass_number = self.stats.passes_started() + 1;

        let result = self.cycle.run_pass(pass_number, started.timestamp());
        match &result {
            Ok(report) => self.stats.record_report(report),
            Err(err) => self.stats.record_abort(err),
        }
        self.stats.last_pass_at = Some(started);
        self.state = WatchState::Idle;

        if self.options.status_report {
            self.report_status();
        }
        result
    }

    /// Loop until `max_passes` is reached. Never returns when unbounded.
    pub fn run(&mut self) -> &WatchStats {
        if self.options.status_report {
            self.report_status();
        }
        loop {
            // Aborted passes are already logged by the cycle.
            let _ = self.run_once();

            if let Some(max) = self.options.max_passes {
                if self.stats.passes_started() >= max {
                    break;
                }
            }

            log_event!(
                self.ctx,
                INFO,
                event_names::WATCH_SLEEPING,
                Stage::Watch,
                format!("sleeping {}s until next pass", self.options.interval.as_secs()),
                interval_secs = self.options.interval.as_secs()
            );
            self.sleeper.sleep(self.options.interval);
        }
        &self.stats
    }

    fn report_status(&self) {
        match fetch_status_report(self.runtime) {
            Ok(report) => log_event!(
                self.ctx,
                INFO,
                event_names::STATUS_REPORT,
                Stage::Report,
                report
            ),
            Err(err) => log_event!(
                self.ctx,
                WARN,
                event_names::STATUS_UNAVAILABLE,
                Stage::Report,
                format!("status report unavailable: {}", err)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{container_fixture, image_fixture, InMemoryRuntime, RuntimeCall};
    use chrono::TimeZone;
    use dw_common::ContainerState;
    use dw_config::RetentionPolicy;
    use std::cell::RefCell;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    #[derive(Default)]
    struct RecordingSleeper(RefCell<Vec<Duration>>);

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.0.borrow_mut().push(duration);
        }
    }

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn bounded_loop_sleeps_between_passes() {
        let rt = InMemoryRuntime::new().with_image(image_fixture("old", Some(0), None, &[]));
        let policy = RetentionPolicy::default();
        let ctx = LogContext::new("run-test", "host-test");
        let clock = clock();
        let sleeper = RecordingSleeper::default();
        let options = WatchOptions {
            interval: Duration::from_secs(600),
            max_passes: Some(3),
            status_report: false,
        };
        let mut watcher = Watcher::new(
            CollectionCycle::new(&rt, &policy, &ctx),
            &rt,
            &ctx,
            &clock,
            &sleeper,
            options,
        );

        let stats = watcher.run().clone();
        assert_eq!(stats.passes_completed, 3);
        assert_eq!(stats.images_removed, 1);
        assert_eq!(sleeper.0.borrow().len(), 2);
        assert_eq!(watcher.state(), WatchState::Idle);
        assert!(!rt.calls().contains(&RuntimeCall::Status));
    }

    #[test]
    fn aborted_pass_does_not_stop_the_loop() {
        let rt = InMemoryRuntime::new().with_container(
            container_fixture("c1", ContainerState::Exited, "job", "img"),
            Some("2020-01-01T00:00:00Z"),
        );
        rt.set_unavailable(true);
        let policy = RetentionPolicy::default();
        let ctx = LogContext::new("run-test", "host-test");
        let clock = clock();
        let sleeper = RecordingSleeper::default();
        let mut watcher = Watcher::new(
            CollectionCycle::new(&rt, &policy, &ctx),
            &rt,
            &ctx,
            &clock,
            &sleeper,
            WatchOptions {
                max_passes: Some(2),
                ..WatchOptions::default()
            },
        );

        assert!(watcher.run_once().is_err());
        assert_eq!(watcher.stats().passes_aborted, 1);
        assert!(matches!(
            watcher.stats().last_pass,
            Some(LastPass::Aborted {
                unavailable: true,
                ..
            })
        ));

        rt.set_unavailable(false);
        let report = watcher.run_once().unwrap();
        assert_eq!(report.pass_number, 2);
        assert_eq!(watcher.stats().containers_removed, 1);
    }

    #[test]
    fn status_report_runs_before_and_after_passes() {
        let rt = InMemoryRuntime::new();
        let policy = RetentionPolicy::default();
        let ctx = LogContext::new("run-test", "host-test");
        let clock = clock();
        let sleeper = RecordingSleeper::default();
        let mut watcher = Watcher::new(
            CollectionCycle::new(&rt, &policy, &ctx),
            &rt,
            &ctx,
            &clock,
            &sleeper,
            WatchOptions {
                max_passes: Some(1),
                ..WatchOptions::default()
            },
        );
        watcher.run();
        let statuses = rt
            .calls()
            .into_iter()
            .filter(|c| *c == RuntimeCall::Status)
            .count();
        assert_eq!(statuses, 2);
        assert!(sleeper.0.borrow().is_empty());
    }
}
