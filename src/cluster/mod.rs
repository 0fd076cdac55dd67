//! Cluster-wide mutual exclusion
//!
//! A cluster lock is a named mutual-exclusion token enforced across all
//! cooperating nodes, not just within one process. The backing store is the
//! sole source of truth for ownership; this module only defines the store
//! seam ([`LockStore`]) and the service that guards critical sections with
//! it ([`ClusterLockService`]).

pub mod lock;
pub mod store;

pub use lock::ClusterLockService;
pub use store::{LockStore, MemoryLockStore, StandaloneLockStore};
