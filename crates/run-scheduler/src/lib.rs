//! Scheduled launching of test case runs.
//!
//! Each schedule owns one background task: one-shot schedules sleep until
//! their instant, fire once and deregister themselves; recurring schedules
//! loop over the cron expression's upcoming instants until removed. Firing
//! is decoupled from execution through the [`RunLauncher`] port, so a slow
//! run never delays the next tick.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use cron::Schedule as CronSchedule;
use dashmap::DashMap;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use progress_bus::{EventBus, ProgressBus, RunEvent, ScheduleTriggered};
use steppilot_core_types::{ExecutionId, Schedule, ScheduleId, TestCase, TestCaseId, Trigger};

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },
}

/// Read-side port to the test case store.
#[async_trait]
pub trait TestCaseSource: Send + Sync {
    async fn test_case(&self, id: &TestCaseId) -> Option<TestCase>;
}

/// Fire-and-forget launch port, implemented over the orchestrator.
pub trait RunLauncher: Send + Sync {
    fn launch(&self, case: TestCase) -> ExecutionId;
}

pub struct RunScheduler {
    source: Arc<dyn TestCaseSource>,
    launcher: Arc<dyn RunLauncher>,
    bus: Arc<ProgressBus>,
    schedules: DashMap<ScheduleId, Schedule>,
    jobs: DashMap<ScheduleId, CancellationToken>,
}

impl RunScheduler {
    pub fn new(
        source: Arc<dyn TestCaseSource>,
        launcher: Arc<dyn RunLauncher>,
        bus: Arc<ProgressBus>,
    ) -> Arc<Self> {
        Arc::new(Self {
            source,
            launcher,
            bus,
            schedules: DashMap::new(),
            jobs: DashMap::new(),
        })
    }

    /// Register a schedule and start its timer task. Recurring triggers
    /// are validated up front; an invalid expression never registers.
    pub fn add_schedule(self: &Arc<Self>, schedule: Schedule) -> Result<ScheduleId, ScheduleError> {
        let cron = match &schedule.trigger {
            Trigger::Recurring(expr) => Some(parse_cron(expr)?),
            Trigger::OneShot(_) => None,
        };

        let id = schedule.id.clone();
        let cancel = CancellationToken::new();
        self.schedules.insert(id.clone(), schedule.clone());
        // Re-adding an id replaces its timer; the displaced task must be
        // cancelled or it would keep ticking unreachable forever.
        if let Some(old) = self.jobs.insert(id.clone(), cancel.clone()) {
            old.cancel();
        }

        info!(schedule = %id, trigger = ?schedule.trigger, "schedule registered");

        let this = Arc::clone(self);
        match (schedule.trigger.clone(), cron) {
            (Trigger::OneShot(at), _) => {
                tokio::spawn(async move {
                    this.one_shot_loop(id, at, cancel).await;
                });
            }
            (Trigger::Recurring(_), Some(cron)) => {
                tokio::spawn(async move {
                    this.recurring_loop(id, cron, cancel).await;
                });
            }
            // parse_cron already rejected this arm.
            (Trigger::Recurring(_), None) => {}
        }

        Ok(schedule.id)
    }

    /// Cancel and forget a schedule. Removing an unknown or already-fired
    /// id is a no-op.
    pub fn remove_schedule(&self, id: &ScheduleId) -> bool {
        if let Some((_, cancel)) = self.jobs.remove(id) {
            cancel.cancel();
        }
        let removed = self.schedules.remove(id).is_some();
        if removed {
            info!(schedule = %id, "schedule removed");
        }
        removed
    }

    pub fn set_enabled(&self, id: &ScheduleId, enabled: bool) -> bool {
        match self.schedules.get_mut(id) {
            Some(mut entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn schedules(&self) -> Vec<Schedule> {
        self.schedules.iter().map(|e| e.value().clone()).collect()
    }

    pub fn schedule(&self, id: &ScheduleId) -> Option<Schedule> {
        self.schedules.get(id).map(|e| e.value().clone())
    }

    async fn one_shot_loop(
        self: Arc<Self>,
        id: ScheduleId,
        at: chrono::DateTime<Utc>,
        cancel: CancellationToken,
    ) {
        let wait = (at - Utc::now()).to_std().unwrap_or_else(|_| {
            warn!(schedule = %id, %at, "one-shot instant is in the past, firing now");
            Duration::ZERO
        });

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(wait) => {}
        }

        self.fire(&id).await;
        // One-shot schedules consume themselves.
        self.remove_schedule(&id);
    }

    async fn recurring_loop(self: Arc<Self>, id: ScheduleId, cron: CronSchedule, cancel: CancellationToken) {
        loop {
            let next = match cron.upcoming(Utc).next() {
                Some(next) => next,
                None => {
                    warn!(schedule = %id, "cron expression has no future occurrence");
                    self.remove_schedule(&id);
                    return;
                }
            };
            let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(wait) => {}
            }

            self.fire(&id).await;
        }
    }

    async fn fire(&self, id: &ScheduleId) {
        let schedule = match self.schedules.get(id) {
            Some(entry) => entry.value().clone(),
            None => return,
        };
        if !schedule.enabled {
            return;
        }

        let case = match self.source.test_case(&schedule.test_case_id).await {
            Some(case) => case,
            None => {
                warn!(
                    schedule = %id,
                    test_case = %schedule.test_case_id,
                    "scheduled test case no longer exists, skipping"
                );
                return;
            }
        };

        let execution_id = self.launcher.launch(case.clone());
        info!(schedule = %id, execution = %execution_id, case = %case.name, "schedule fired");

        if let Some(mut entry) = self.schedules.get_mut(id) {
            entry.last_run = Some(Utc::now());
        }

        let _ = self
            .bus
            .publish(RunEvent::ScheduleTriggered(ScheduleTriggered {
                schedule_id: id.clone(),
                execution_id,
                test_case_id: case.id.clone(),
                test_case_name: case.name.clone(),
                started_at: Utc::now(),
            }))
            .await;
    }
}

/// Parse a cron expression, accepting the common five-field form by
/// assuming second zero.
fn parse_cron(expr: &str) -> Result<CronSchedule, ScheduleError> {
    let normalized = if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    };
    CronSchedule::from_str(&normalized).map_err(|e| ScheduleError::InvalidCron {
        expr: expr.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSource {
        cases: Vec<TestCase>,
    }

    #[async_trait]
    impl TestCaseSource for FixedSource {
        async fn test_case(&self, id: &TestCaseId) -> Option<TestCase> {
            self.cases.iter().find(|c| &c.id == id).cloned()
        }
    }

    #[derive(Default)]
    struct RecordingLauncher {
        launches: AtomicUsize,
        names: Mutex<Vec<String>>,
    }

    impl RunLauncher for RecordingLauncher {
        fn launch(&self, case: TestCase) -> ExecutionId {
            self.launches.fetch_add(1, Ordering::SeqCst);
            self.names.lock().push(case.name);
            ExecutionId::new()
        }
    }

    fn scheduler_with_case() -> (Arc<RunScheduler>, Arc<RecordingLauncher>, TestCase) {
        let case = TestCase::new("scheduled smoke", vec!["Open browser".into()]);
        let source = Arc::new(FixedSource {
            cases: vec![case.clone()],
        });
        let launcher = Arc::new(RecordingLauncher::default());
        let bus = ProgressBus::new(64);
        let scheduler = RunScheduler::new(source, Arc::clone(&launcher) as Arc<dyn RunLauncher>, bus);
        (scheduler, launcher, case)
    }

    async fn wait_for_launches(launcher: &RecordingLauncher, at_least: usize) {
        for _ in 0..200 {
            if launcher.launches.load(Ordering::SeqCst) >= at_least {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "expected at least {at_least} launches, saw {}",
            launcher.launches.load(Ordering::SeqCst)
        );
    }

    #[tokio::test]
    async fn one_shot_fires_once_and_deregisters() {
        let (scheduler, launcher, case) = scheduler_with_case();
        let schedule = Schedule::one_shot(case.id.clone(), Utc::now() + chrono::Duration::milliseconds(30));
        let id = scheduler.add_schedule(schedule).unwrap();

        wait_for_launches(&launcher, 1).await;
        // Self-removal may land just after the fire.
        for _ in 0..100 {
            if scheduler.schedule(&id).is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(scheduler.schedule(&id).is_none());
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
        assert_eq!(launcher.names.lock()[0], "scheduled smoke");
    }

    #[tokio::test]
    async fn one_shot_in_the_past_fires_immediately() {
        let (scheduler, launcher, case) = scheduler_with_case();
        let schedule =
            Schedule::one_shot(case.id.clone(), Utc::now() - chrono::Duration::minutes(5));
        scheduler.add_schedule(schedule).unwrap();
        wait_for_launches(&launcher, 1).await;
    }

    #[tokio::test]
    async fn removed_schedule_never_fires() {
        let (scheduler, launcher, case) = scheduler_with_case();
        let schedule =
            Schedule::one_shot(case.id.clone(), Utc::now() + chrono::Duration::milliseconds(100));
        let id = scheduler.add_schedule(schedule).unwrap();

        assert!(scheduler.remove_schedule(&id));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);
        assert!(!scheduler.remove_schedule(&id));
    }

    #[tokio::test]
    async fn re_adding_a_schedule_replaces_the_previous_timer() {
        let (scheduler, launcher, case) = scheduler_with_case();

        // First registration would fire in 50ms.
        let first = Schedule::one_shot(
            case.id.clone(),
            Utc::now() + chrono::Duration::milliseconds(50),
        );
        let id = scheduler.add_schedule(first).unwrap();

        // Re-add the same id with a far-future instant: the displaced
        // 50ms timer must be cancelled, not left ticking.
        let mut replacement =
            Schedule::one_shot(case.id.clone(), Utc::now() + chrono::Duration::minutes(10));
        replacement.id = id.clone();
        scheduler.add_schedule(replacement).unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);

        assert!(scheduler.remove_schedule(&id));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_cron_is_rejected_and_not_registered() {
        let (scheduler, _launcher, case) = scheduler_with_case();
        let schedule = Schedule::recurring(case.id.clone(), "not a cron");
        let err = scheduler.add_schedule(schedule).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidCron { .. }));
        assert!(scheduler.schedules().is_empty());
    }

    #[tokio::test]
    async fn recurring_fires_repeatedly_until_removed() {
        let (scheduler, launcher, case) = scheduler_with_case();
        // Every second; the five-field form gets second zero prepended,
        // so use the six-field form here.
        let schedule = Schedule::recurring(case.id.clone(), "* * * * * *");
        let id = scheduler.add_schedule(schedule).unwrap();

        wait_for_launches(&launcher, 2).await;
        assert!(scheduler.schedule(&id).unwrap().last_run.is_some());
        assert!(scheduler.remove_schedule(&id));

        let fired = launcher.launches.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(1_200)).await;
        assert_eq!(launcher.launches.load(Ordering::SeqCst), fired);
    }

    #[tokio::test]
    async fn five_field_expressions_are_accepted() {
        let (scheduler, _launcher, case) = scheduler_with_case();
        let schedule = Schedule::recurring(case.id.clone(), "0 9 * * 1");
        assert!(scheduler.add_schedule(schedule).is_ok());
    }

    #[tokio::test]
    async fn missing_test_case_skips_the_launch() {
        let source = Arc::new(FixedSource { cases: vec![] });
        let launcher = Arc::new(RecordingLauncher::default());
        let bus = ProgressBus::new(64);
        let scheduler =
            RunScheduler::new(source, Arc::clone(&launcher) as Arc<dyn RunLauncher>, bus);

        let schedule = Schedule::one_shot(TestCaseId::new(), Utc::now());
        scheduler.add_schedule(schedule).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn disabled_schedules_do_not_launch() {
        let (scheduler, launcher, case) = scheduler_with_case();
        let schedule =
            Schedule::one_shot(case.id.clone(), Utc::now() + chrono::Duration::milliseconds(50));
        let id = scheduler.add_schedule(schedule).unwrap();
        assert!(scheduler.set_enabled(&id, false));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);
    }
}
