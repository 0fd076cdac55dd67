//! Utility modules for the jobmesh scheduling core
//!
//! This module contains reusable utilities that can be used
//! across different parts of the system.

pub mod schedule;
