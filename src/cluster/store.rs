//! Lock backing store implementations
//!
//! The store must provide atomic "acquire if absent" semantics so that
//! acquisition is truly exclusive under concurrent callers across
//! processes. A consensus-backed key store (etcd, consul) satisfies the
//! contract for real clusters; it is injected as an external capability
//! and not implemented here.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::errors::LockStoreError;

/// Key-based exclusive-acquire/release capability backing the cluster lock
///
/// `try_acquire` must atomically insert `owner` under `name` iff the key is
/// absent, returning whether the caller became the holder. `release` must
/// remove the key only when it is held by `owner`; releasing an absent or
/// foreign-owned key is a no-op, never an error.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Atomically acquire `name` for `owner` if no holder exists
    async fn try_acquire(&self, name: &str, owner: &str) -> Result<bool, LockStoreError>;

    /// Release `name` if currently held by `owner`
    async fn release(&self, name: &str, owner: &str) -> Result<(), LockStoreError>;
}

/// Process-local lock store with genuine exclusivity
///
/// The default store for single-node deployments and tests. Holders live in
/// one in-memory map, so exclusion holds between all callers sharing this
/// store instance but not across processes.
#[derive(Debug, Default)]
pub struct MemoryLockStore {
    holders: Mutex<HashMap<String, String>>,
}

impl MemoryLockStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Current holder of `name`, if any (diagnostics)
    pub fn holder(&self, name: &str) -> Option<String> {
        self.holders.lock().unwrap().get(name).cloned()
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn try_acquire(&self, name: &str, owner: &str) -> Result<bool, LockStoreError> {
        let mut holders = self.holders.lock().unwrap();
        if holders.contains_key(name) {
            return Ok(false);
        }
        holders.insert(name.to_string(), owner.to_string());
        Ok(true)
    }

    async fn release(&self, name: &str, owner: &str) -> Result<(), LockStoreError> {
        let mut holders = self.holders.lock().unwrap();
        match holders.get(name) {
            Some(holder) if holder == owner => {
                holders.remove(name);
            }
            Some(holder) => {
                debug!(
                    "Ignoring release of lock '{}' by '{}': held by '{}'",
                    name, owner, holder
                );
            }
            None => {}
        }
        Ok(())
    }
}

/// Always-grant stand-in for deployments with no coordination concerns
///
/// Satisfies the [`LockStore`] contract trivially: every acquisition
/// succeeds and release touches no state. Only suitable where cluster-wide
/// exclusion is moot (a single node, or tests that exercise scheduling
/// without contention).
#[derive(Debug, Default)]
pub struct StandaloneLockStore;

impl StandaloneLockStore {
    /// Create the stand-in store
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LockStore for StandaloneLockStore {
    async fn try_acquire(&self, _name: &str, _owner: &str) -> Result<bool, LockStoreError> {
        Ok(true)
    }

    async fn release(&self, _name: &str, _owner: &str) -> Result<(), LockStoreError> {
        Ok(())
    }
}
