//! Centralized error handling for the jobmesh scheduling core
//!
//! # Error Categories
//!
//! - **Scheduler Errors**: registration-time and administrative failures
//! - **Lock Store Errors**: the lock backing store failing to answer

pub mod types;

pub use types::*;

/// Convenience type alias for Results using SchedulerError
pub type SchedulerResult<T> = Result<T, SchedulerError>;
