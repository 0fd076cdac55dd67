//! Job model type definitions

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::errors::SchedulerError;
use crate::utils::schedule::{next_cron_fire, parse_cron, parse_interval};

/// A job's executable unit of work
///
/// An opaque zero-argument async action that may fail. The scheduler never
/// inspects what it does; external collaborators supply it at registration.
pub type JobUnit = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Wrap an async closure into a [`JobUnit`]
pub fn job_unit<F, Fut>(f: F) -> JobUnit
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

/// When a job should fire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "expression", rename_all = "lowercase")]
pub enum ScheduleSpec {
    /// A 5-, 6- or 7-field cron expression, evaluated in the configured
    /// fixed reference zone
    Cron(String),
    /// A fixed interval such as "10m", measured from the start of the
    /// previous fire, not wall-clock boundaries
    Periodic(String),
}

impl ScheduleSpec {
    /// The raw cron or duration expression string
    pub fn expression(&self) -> &str {
        match self {
            ScheduleSpec::Cron(expr) | ScheduleSpec::Periodic(expr) => expr,
        }
    }

    /// Compile the expression under its kind's grammar
    ///
    /// Invalid expressions fail here, at registration time, never at fire
    /// time.
    pub fn parse(&self) -> Result<CompiledSchedule, SchedulerError> {
        match self {
            ScheduleSpec::Cron(expr) => {
                parse_cron(expr)
                    .map(CompiledSchedule::Cron)
                    .map_err(|message| SchedulerError::ScheduleParse {
                        expression: expr.clone(),
                        message,
                    })
            }
            ScheduleSpec::Periodic(expr) => {
                parse_interval(expr)
                    .map(CompiledSchedule::Periodic)
                    .map_err(|message| SchedulerError::ScheduleParse {
                        expression: expr.clone(),
                        message,
                    })
            }
        }
    }
}

impl fmt::Display for ScheduleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleSpec::Cron(expr) => write!(f, "cron '{expr}'"),
            ScheduleSpec::Periodic(expr) => write!(f, "every {expr}"),
        }
    }
}

/// Compiled form of a [`ScheduleSpec`]
#[derive(Debug, Clone)]
pub enum CompiledSchedule {
    Cron(cron::Schedule),
    Periodic(Duration),
}

impl CompiledSchedule {
    /// Next fire time strictly after `anchor`
    ///
    /// Cron schedules evaluate the expression in `tz`; periodic schedules
    /// add the interval to the anchor (the previous tick). `None` means the
    /// schedule has no future fire times.
    pub fn next_fire(&self, tz: Tz, anchor: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            CompiledSchedule::Cron(schedule) => next_cron_fire(schedule, tz, anchor),
            CompiledSchedule::Periodic(interval) => {
                let interval = chrono::Duration::from_std(*interval).ok()?;
                anchor.checked_add_signed(interval)
            }
        }
    }
}

/// Everything needed to register a job
///
/// A plain struct plus a function value: job definitions are supplied by
/// explicit startup wiring, not discovered through any binding framework.
#[derive(Clone)]
pub struct JobDefinition {
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub managed: bool,
    pub schedule: ScheduleSpec,
    pub unit: JobUnit,
}

impl JobDefinition {
    /// Create an enabled, managed job definition
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schedule: ScheduleSpec,
        unit: JobUnit,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            enabled: true,
            managed: true,
            schedule,
            unit,
        }
    }

    /// Run on every node without cluster locking (node-local housekeeping)
    pub fn unmanaged(mut self) -> Self {
        self.managed = false;
        self
    }

    /// Register the job disabled; it can be enabled at runtime
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl fmt::Debug for JobDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("enabled", &self.enabled)
            .field("managed", &self.managed)
            .field("schedule", &self.schedule)
            .finish_non_exhaustive()
    }
}

/// A registered job
///
/// Immutable after registration except for the `enabled` flag, which may be
/// toggled at runtime by an administrative operation. The job's `name` is
/// also its cluster-lock key and log correlation key.
pub struct Job {
    name: String,
    description: String,
    enabled: AtomicBool,
    managed: bool,
    schedule: ScheduleSpec,
    compiled: CompiledSchedule,
    unit: JobUnit,
    running: AtomicBool,
    last_fired: Mutex<Option<DateTime<Utc>>>,
}

impl Job {
    pub(crate) fn from_definition(definition: JobDefinition) -> Result<Self, SchedulerError> {
        let compiled = definition.schedule.parse()?;
        Ok(Self {
            name: definition.name,
            description: definition.description,
            enabled: AtomicBool::new(definition.enabled),
            managed: definition.managed,
            schedule: definition.schedule,
            compiled,
            unit: definition.unit,
            running: AtomicBool::new(false),
            last_fired: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether the job participates in scheduling at the next evaluation tick
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Whether execution is gated by the cluster lock
    pub fn is_managed(&self) -> bool {
        self.managed
    }

    pub fn schedule(&self) -> &ScheduleSpec {
        &self.schedule
    }

    pub(crate) fn compiled(&self) -> &CompiledSchedule {
        &self.compiled
    }

    pub(crate) fn unit(&self) -> JobUnit {
        Arc::clone(&self.unit)
    }

    /// Whether an execution is currently in flight on this node
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Claim the per-node overlap guard; returns false if already running
    pub(crate) fn try_begin_run(&self) -> bool {
        !self.running.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn finish_run(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Start time of the most recent fire on this node, if any
    pub fn last_fired(&self) -> Option<DateTime<Utc>> {
        *self.last_fired.lock().unwrap()
    }

    pub(crate) fn record_fired(&self, at: DateTime<Utc>) {
        *self.last_fired.lock().unwrap() = Some(at);
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("enabled", &self.is_enabled())
            .field("managed", &self.managed)
            .field("schedule", &self.schedule)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Point-in-time view of one job for the operational surface
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub managed: bool,
    pub schedule: ScheduleSpec,
    pub running: bool,
    pub last_fired: Option<DateTime<Utc>>,
    pub next_fire: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noop_unit() -> JobUnit {
        job_unit(|| async { Ok(()) })
    }

    #[test]
    fn test_schedule_spec_parses_by_kind() {
        assert!(ScheduleSpec::Cron("0 */10 * * * *".to_string()).parse().is_ok());
        assert!(ScheduleSpec::Periodic("15m".to_string()).parse().is_ok());

        let err = ScheduleSpec::Cron("nonsense".to_string()).parse().unwrap_err();
        match err {
            SchedulerError::ScheduleParse { expression, .. } => {
                assert_eq!(expression, "nonsense");
            }
            other => panic!("unexpected error: {other}"),
        }

        // A duration is not a cron expression and vice versa.
        assert!(ScheduleSpec::Cron("15m".to_string()).parse().is_err());
        assert!(ScheduleSpec::Periodic("0 */10 * * * *".to_string()).parse().is_err());
    }

    #[test]
    fn test_schedule_spec_display() {
        assert_eq!(
            ScheduleSpec::Cron("0 0 * * * *".to_string()).to_string(),
            "cron '0 0 * * * *'"
        );
        assert_eq!(ScheduleSpec::Periodic("1h".to_string()).to_string(), "every 1h");
    }

    #[test]
    fn test_schedule_spec_toml_round_trip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Wrapper {
            schedule: ScheduleSpec,
        }

        let wrapper = Wrapper {
            schedule: ScheduleSpec::Periodic("30m".to_string()),
        };
        let encoded = toml::to_string(&wrapper).unwrap();
        let decoded: Wrapper = toml::from_str(&encoded).unwrap();
        assert_eq!(decoded, wrapper);

        let parsed: Wrapper =
            toml::from_str(r#"schedule = { kind = "cron", expression = "*/5 * * * *" }"#).unwrap();
        assert_eq!(
            parsed.schedule,
            ScheduleSpec::Cron("*/5 * * * *".to_string())
        );
    }

    #[test]
    fn test_periodic_next_fire_adds_interval_to_anchor() {
        let compiled = ScheduleSpec::Periodic("10m".to_string()).parse().unwrap();
        let anchor = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let next = compiled.next_fire(chrono_tz::UTC, anchor).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 1, 12, 10, 0).unwrap());
    }

    #[test]
    fn test_job_definition_defaults_and_modifiers() {
        let definition = JobDefinition::new(
            "cleanup",
            "Delete temporary files",
            ScheduleSpec::Periodic("1h".to_string()),
            noop_unit(),
        );
        assert!(definition.enabled);
        assert!(definition.managed);

        let definition = definition.unmanaged().disabled();
        assert!(!definition.enabled);
        assert!(!definition.managed);
    }

    #[test]
    fn test_job_overlap_guard_claims_once() {
        let job = Job::from_definition(JobDefinition::new(
            "cleanup",
            "",
            ScheduleSpec::Periodic("1h".to_string()),
            noop_unit(),
        ))
        .unwrap();

        assert!(job.try_begin_run());
        assert!(!job.try_begin_run());
        assert!(job.is_running());

        job.finish_run();
        assert!(!job.is_running());
        assert!(job.try_begin_run());
    }

    #[test]
    fn test_job_from_definition_rejects_bad_schedule() {
        let result = Job::from_definition(JobDefinition::new(
            "bad",
            "",
            ScheduleSpec::Cron("* * *".to_string()),
            noop_unit(),
        ));
        assert!(matches!(
            result,
            Err(SchedulerError::ScheduleParse { .. })
        ));
    }
}
