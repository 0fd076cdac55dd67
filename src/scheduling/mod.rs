//! Job scheduling subsystem for jobmesh
//!
//! This module provides the declarative job model and the scheduler that
//! drives it:
//! - `JobRegistry`: process-scoped catalog of named jobs
//! - `JobScheduler`: per-job timer loops with cluster-lock-gated firing
//!
//! Jobs are registered once at startup by explicit wiring; the scheduler
//! evaluates each enabled job on its own timeline and delegates cluster-wide
//! mutual exclusion to `ClusterLockService`.

pub mod registry;
pub mod scheduler;
pub mod types;

pub use registry::JobRegistry;
pub use scheduler::{JobScheduler, SchedulerSettings};
pub use types::*;
