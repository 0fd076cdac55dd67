//! Error type definitions for the jobmesh scheduling core
//!
//! This module defines the error types used throughout the crate,
//! providing a small hierarchical error system that makes debugging and
//! error handling more straightforward. Job units fail with opaque
//! `anyhow::Error` values instead; those are caught and logged at the
//! firing boundary rather than typed here.

use thiserror::Error;

/// Errors raised by the job registry and the scheduler's administrative surface
///
/// All variants are registration-time or admin-time failures; nothing here
/// is raised at fire time.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// A job with the same name is already registered
    #[error("Job '{name}' is already registered")]
    DuplicateJob { name: String },

    /// The schedule expression does not parse under its kind's grammar
    #[error("Invalid schedule expression '{expression}': {message}")]
    ScheduleParse { expression: String, message: String },

    /// No job with the given name exists in the registry
    #[error("No job named '{name}' is registered")]
    JobNotFound { name: String },
}

/// Failure of the lock backing store to answer a request
///
/// Distinct from the routine "already held by another node" outcome, which
/// is not an error at all. `ClusterLockService::try_lock` treats these
/// failures as "lock not acquired" (fail-closed).
#[derive(Error, Debug)]
pub enum LockStoreError {
    /// The backing store could not be reached or did not answer
    #[error("Lock backing store unavailable: {message}")]
    Unavailable { message: String },
}
