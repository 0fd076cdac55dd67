//! Scheduler service driving per-job timer loops

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use chrono_tz::Tz;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::registry::JobRegistry;
use super::types::{CompiledSchedule, Job, JobStatus};
use crate::cluster::ClusterLockService;
use crate::errors::{SchedulerError, SchedulerResult};

/// Settings governing the scheduler's run loop
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Fixed reference zone for evaluating cron expressions
    pub timezone: Tz,
    /// Bounded wait for in-flight job units during shutdown
    pub shutdown_grace: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::UTC,
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

/// Service responsible for firing registered jobs on their schedules
///
/// Each registered job gets its own timer task; firings run on independent
/// tokio tasks so a slow or hung job can never delay other jobs' fire
/// evaluation. Managed jobs are gated by the cluster lock under their own
/// name; unmanaged jobs run on every node with no coordination.
pub struct JobScheduler {
    registry: Arc<JobRegistry>,
    cluster_lock: Arc<ClusterLockService>,
    settings: SchedulerSettings,
    in_flight: Arc<AtomicUsize>,
}

impl JobScheduler {
    /// Create a new scheduler over the given registry and lock service
    pub fn new(
        registry: Arc<JobRegistry>,
        cluster_lock: Arc<ClusterLockService>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            registry,
            cluster_lock,
            settings,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Run the scheduler until the token is cancelled
    ///
    /// Spawns one timer task per job registered at this point; the registry
    /// contents are fixed for the scheduler's lifetime, only the per-job
    /// `enabled` flags stay live. On cancellation, stops issuing new fire
    /// attempts and waits a bounded grace period for in-flight units.
    pub async fn run(&self, cancellation_token: CancellationToken) -> anyhow::Result<()> {
        let jobs = self.registry.all();
        info!("Starting job scheduler with {} registered jobs", jobs.len());

        let mut timers = Vec::new();
        for job in jobs {
            debug!(
                "Starting timer for job '{}' ({}, {})",
                job.name(),
                job.schedule(),
                if job.is_managed() { "managed" } else { "unmanaged" },
            );
            timers.push(tokio::spawn(Self::run_job_timer(
                job,
                Arc::clone(&self.cluster_lock),
                self.settings.timezone,
                Arc::clone(&self.in_flight),
                cancellation_token.clone(),
            )));
        }

        cancellation_token.cancelled().await;
        info!("Job scheduler received cancellation signal, shutting down");

        for timer in timers {
            let _ = timer.await;
        }
        self.wait_for_in_flight_units().await;

        info!("Job scheduler stopped");
        Ok(())
    }

    /// Fire a job immediately, outside its schedule
    ///
    /// Honors the same gating as a scheduled fire (cluster lock for managed
    /// jobs, per-node overlap guard) but ignores the `enabled` flag: the
    /// operator asked explicitly. If the job is already running on this node
    /// the trigger is dropped, not queued.
    pub fn trigger(&self, name: &str) -> SchedulerResult<()> {
        let job = self
            .registry
            .get(name)
            .ok_or_else(|| SchedulerError::JobNotFound {
                name: name.to_string(),
            })?;

        if !job.try_begin_run() {
            debug!(
                "Manual trigger of job '{}' dropped: already running on this node",
                name
            );
            return Ok(());
        }

        info!("Manually triggering job '{}'", name);
        self.fire(job);
        Ok(())
    }

    /// Point-in-time snapshot of every registered job
    ///
    /// Next fire times are computed from now; for periodic jobs this is the
    /// worst-case estimate (one full interval out), which is what the timer
    /// would do if its tick landed this instant.
    pub fn status(&self) -> Vec<JobStatus> {
        let now = Utc::now();
        self.registry
            .all()
            .iter()
            .map(|job| JobStatus {
                name: job.name().to_string(),
                description: job.description().to_string(),
                enabled: job.is_enabled(),
                managed: job.is_managed(),
                schedule: job.schedule().clone(),
                running: job.is_running(),
                last_fired: job.last_fired(),
                next_fire: job.compiled().next_fire(self.settings.timezone, now),
            })
            .collect()
    }

    /// Number of job units currently executing on this node
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Timer loop for one job: sleep to the next fire time, evaluate, repeat
    async fn run_job_timer(
        job: Arc<Job>,
        cluster_lock: Arc<ClusterLockService>,
        timezone: Tz,
        in_flight: Arc<AtomicUsize>,
        cancellation_token: CancellationToken,
    ) {
        // Periodic schedules anchor to the previous evaluation tick; the
        // first fire lands one interval after scheduler start. Cron
        // schedules track the wall clock instead.
        let mut anchor = Utc::now();

        loop {
            let now = Utc::now();
            let reference = match job.compiled() {
                CompiledSchedule::Cron(_) => now,
                CompiledSchedule::Periodic(_) => anchor,
            };
            let Some(next) = job.compiled().next_fire(timezone, reference) else {
                info!("Job '{}' has no future fire times, parking timer", job.name());
                cancellation_token.cancelled().await;
                return;
            };

            let delay = (next - now).to_std().unwrap_or(Duration::ZERO);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancellation_token.cancelled() => {
                    debug!("Timer for job '{}' stopped", job.name());
                    return;
                }
            }

            // Evaluation tick. The anchor moves regardless of the outcome:
            // a missed or skipped tick is rescheduled one interval later,
            // never queued for catch-up.
            anchor = Utc::now();

            if !job.is_enabled() {
                debug!("Skipping disabled job '{}'", job.name());
                continue;
            }

            if !job.try_begin_run() {
                trace!(
                    "Job '{}' still running from previous fire, skipping tick",
                    job.name()
                );
                continue;
            }

            Self::fire_with(
                job.clone(),
                Arc::clone(&cluster_lock),
                Arc::clone(&in_flight),
            );
        }
    }

    fn fire(&self, job: Arc<Job>) {
        Self::fire_with(job, Arc::clone(&self.cluster_lock), Arc::clone(&self.in_flight));
    }

    /// Execute one firing on its own task
    ///
    /// The caller must already hold the job's overlap guard
    /// (`try_begin_run`); this function guarantees the guard and the
    /// in-flight counter are released however the unit ends.
    fn fire_with(job: Arc<Job>, cluster_lock: Arc<ClusterLockService>, in_flight: Arc<AtomicUsize>) {
        in_flight.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            let timer = std::time::Instant::now();
            let unit = job.unit();
            let action = {
                let job = Arc::clone(&job);
                async move {
                    job.record_fired(Utc::now());
                    (unit)().await
                }
            };

            let outcome = if job.is_managed() {
                cluster_lock.lock(job.name(), action).await
            } else {
                Some(action.await)
            };

            match outcome {
                None => {
                    trace!(
                        "Job '{}' not fired: cluster lock held by another node",
                        job.name()
                    );
                }
                Some(Ok(())) => {
                    info!("Job '{}' completed in {:?}", job.name(), timer.elapsed());
                }
                Some(Err(e)) => {
                    error!(
                        "Job '{}' failed after {:?}: {:#}",
                        job.name(),
                        timer.elapsed(),
                        e
                    );
                }
            }

            job.finish_run();
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });
    }

    /// Wait for in-flight job units to finish, up to the shutdown grace
    async fn wait_for_in_flight_units(&self) {
        if self.in_flight.load(Ordering::SeqCst) == 0 {
            return;
        }

        info!(
            "Waiting up to {:?} for {} in-flight job units to complete",
            self.settings.shutdown_grace,
            self.in_flight.load(Ordering::SeqCst)
        );

        let start = std::time::Instant::now();
        let mut check = tokio::time::interval(Duration::from_millis(100));
        loop {
            let running = self.in_flight.load(Ordering::SeqCst);
            if running == 0 {
                info!("All job units completed");
                break;
            }
            if start.elapsed() > self.settings.shutdown_grace {
                warn!(
                    "Timeout waiting for {} job units to complete, proceeding with shutdown",
                    running
                );
                break;
            }
            check.tick().await;
        }
    }
}
