//! Declarative job catalog

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::info;

use super::types::{Job, JobDefinition};
use crate::errors::{SchedulerError, SchedulerResult};

/// Process-scoped catalog of jobs
///
/// Populated once at startup by explicit wiring, looked up and toggled at
/// runtime. The registry itself is not persisted; it is rebuilt on every
/// process start. All methods are safe to call concurrently with active
/// scheduling.
#[derive(Debug, Default)]
pub struct JobRegistry {
    state: RwLock<RegistryState>,
}

#[derive(Debug, Default)]
struct RegistryState {
    /// Jobs in stable registration order, for deterministic iteration
    order: Vec<Arc<Job>>,
    by_name: HashMap<String, Arc<Job>>,
}

impl JobRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job
    ///
    /// Validates that the name is unused and that the schedule expression
    /// parses. On failure nothing is registered; already-registered jobs
    /// are unaffected.
    pub fn register(&self, definition: JobDefinition) -> SchedulerResult<()> {
        // Compile the schedule before touching registry state so a failed
        // registration cannot leave a partial entry behind.
        let job = Job::from_definition(definition)?;

        let mut state = self.state.write().unwrap();
        if state.by_name.contains_key(job.name()) {
            return Err(SchedulerError::DuplicateJob {
                name: job.name().to_string(),
            });
        }

        info!(
            "Registered job '{}' ({}, {}{})",
            job.name(),
            job.schedule(),
            if job.is_managed() { "managed" } else { "unmanaged" },
            if job.is_enabled() { "" } else { ", disabled" },
        );

        let job = Arc::new(job);
        state.by_name.insert(job.name().to_string(), Arc::clone(&job));
        state.order.push(job);
        Ok(())
    }

    /// Look up a job by name
    pub fn get(&self, name: &str) -> Option<Arc<Job>> {
        self.state.read().unwrap().by_name.get(name).cloned()
    }

    /// All jobs in registration order
    pub fn all(&self) -> Vec<Arc<Job>> {
        self.state.read().unwrap().order.clone()
    }

    /// Number of registered jobs
    pub fn len(&self) -> usize {
        self.state.read().unwrap().order.len()
    }

    /// Whether the registry has no jobs
    pub fn is_empty(&self) -> bool {
        self.state.read().unwrap().order.is_empty()
    }

    /// Toggle a job's enabled flag
    ///
    /// Takes effect at the job's next scheduling evaluation; an in-flight
    /// execution is never interrupted by disabling.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> SchedulerResult<()> {
        let state = self.state.read().unwrap();
        match state.by_name.get(name) {
            Some(job) => {
                job.set_enabled(enabled);
                info!(
                    "Job '{}' {}",
                    name,
                    if enabled { "enabled" } else { "disabled" }
                );
                Ok(())
            }
            None => Err(SchedulerError::JobNotFound {
                name: name.to_string(),
            }),
        }
    }
}
