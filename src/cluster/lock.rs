//! Cluster lock service guarding critical sections by name

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::store::LockStore;

/// Service for cluster-wide single-ownership of named critical sections
///
/// Wraps the injected [`LockStore`] with this node's owner identity.
/// Acquisition is non-blocking and fail-closed: if the backing store cannot
/// answer, the lock is treated as not acquired, preferring a missed
/// execution over risking double-execution.
pub struct ClusterLockService {
    store: Arc<dyn LockStore>,
    owner: String,
}

impl ClusterLockService {
    /// Create a new lock service for this node
    pub fn new(store: Arc<dyn LockStore>, owner: impl Into<String>) -> Self {
        Self {
            store,
            owner: owner.into(),
        }
    }

    /// This node's identity in the lock namespace (diagnostics only)
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Try to become the exclusive holder of `lock_name` cluster-wide
    ///
    /// Never blocks waiting for the lock. Returns `false` both when another
    /// holder exists (routine, trace-level) and when the backing store
    /// failed to answer (fail-closed, logged distinctly as a warning).
    pub async fn try_lock(&self, lock_name: &str) -> bool {
        match self.store.try_acquire(lock_name, &self.owner).await {
            Ok(true) => {
                debug!("Acquired cluster lock '{}' for '{}'", lock_name, self.owner);
                true
            }
            Ok(false) => {
                trace!("Cluster lock '{}' already held, skipping", lock_name);
                false
            }
            Err(e) => {
                warn!(
                    "Lock store failed answering try_lock('{}'): {} - treating as not acquired",
                    lock_name, e
                );
                false
            }
        }
    }

    /// Release `lock_name` if held by this node
    ///
    /// Idempotent: releasing a lock this node does not hold is a no-op.
    /// Store failures are logged and swallowed; release is never an error
    /// path for callers.
    pub async fn release_lock(&self, lock_name: &str) {
        match self.store.release(lock_name, &self.owner).await {
            Ok(()) => {
                debug!("Released cluster lock '{}'", lock_name);
            }
            Err(e) => {
                warn!("Lock store failed releasing '{}': {}", lock_name, e);
            }
        }
    }

    /// Run `action` under the named lock, if it can be acquired
    ///
    /// Returns `None` when the lock was not acquired; the action is skipped
    /// silently, which is the routine outcome when another cluster member is
    /// already running the guarded work. When acquired, the lock is released
    /// after the action completes whether it succeeded or failed, and the
    /// action's result is handed back untouched.
    pub async fn lock<F, T>(&self, lock_name: &str, action: F) -> Option<anyhow::Result<T>>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        if !self.try_lock(lock_name).await {
            return None;
        }
        let result = action.await;
        self.release_lock(lock_name).await;
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::store::{MemoryLockStore, StandaloneLockStore};
    use crate::errors::LockStoreError;
    use async_trait::async_trait;

    /// Store that fails every request, for the fail-closed path
    struct BrokenLockStore;

    #[async_trait]
    impl LockStore for BrokenLockStore {
        async fn try_acquire(&self, _name: &str, _owner: &str) -> Result<bool, LockStoreError> {
            Err(LockStoreError::Unavailable {
                message: "partitioned from coordination service".to_string(),
            })
        }

        async fn release(&self, _name: &str, _owner: &str) -> Result<(), LockStoreError> {
            Err(LockStoreError::Unavailable {
                message: "partitioned from coordination service".to_string(),
            })
        }
    }

    fn two_nodes() -> (ClusterLockService, ClusterLockService) {
        let store = Arc::new(MemoryLockStore::new());
        (
            ClusterLockService::new(store.clone(), "node-1"),
            ClusterLockService::new(store, "node-2"),
        )
    }

    #[tokio::test]
    async fn test_try_lock_is_exclusive_across_nodes() {
        let (node1, node2) = two_nodes();

        assert!(node1.try_lock("x").await);
        assert!(!node2.try_lock("x").await);
        // Same node, second call: still held.
        assert!(!node1.try_lock("x").await);

        node1.release_lock("x").await;
        assert!(node2.try_lock("x").await);
    }

    #[tokio::test]
    async fn test_release_is_idempotent_and_owner_checked() {
        let (node1, node2) = two_nodes();
        assert!(node1.try_lock("x").await);

        // A node that never held the lock releasing it changes nothing.
        node2.release_lock("x").await;
        assert!(!node2.try_lock("x").await);

        node1.release_lock("x").await;
        node1.release_lock("x").await;
        assert!(node2.try_lock("x").await);
    }

    #[tokio::test]
    async fn test_lock_runs_action_and_releases() {
        let (node1, node2) = two_nodes();

        let result = node1.lock("x", async { Ok::<_, anyhow::Error>(42) }).await;
        assert_eq!(result.unwrap().unwrap(), 42);

        // Released on the success path: a different caller can acquire.
        assert!(node2.try_lock("x").await);
    }

    #[tokio::test]
    async fn test_lock_releases_when_action_fails() {
        let (node1, node2) = two_nodes();

        let result = node1
            .lock("x", async { Err::<(), _>(anyhow::anyhow!("unit blew up")) })
            .await;
        let err = result.unwrap().unwrap_err();
        assert!(err.to_string().contains("unit blew up"));

        // Released on the failure path too.
        assert!(node2.try_lock("x").await);
    }

    #[tokio::test]
    async fn test_lock_skips_action_when_held() {
        let (node1, node2) = two_nodes();
        assert!(node1.try_lock("x").await);

        let ran = std::sync::atomic::AtomicBool::new(false);
        let result = node2
            .lock("x", async {
                ran.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok::<_, anyhow::Error>(())
            })
            .await;

        assert!(result.is_none());
        assert!(!ran.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_try_lock_fails_closed_on_store_error() {
        let service = ClusterLockService::new(Arc::new(BrokenLockStore), "node-1");
        assert!(!service.try_lock("x").await);
        // Release against a broken store must not panic or error out.
        service.release_lock("x").await;
    }

    #[tokio::test]
    async fn test_standalone_store_grants_everything() {
        let service = ClusterLockService::new(Arc::new(StandaloneLockStore::new()), "node-1");
        assert!(service.try_lock("x").await);
        assert!(service.try_lock("x").await);
        let result = service.lock("x", async { Ok::<_, anyhow::Error>(()) }).await;
        assert!(result.unwrap().is_ok());
    }
}
