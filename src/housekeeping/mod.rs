//! Built-in node housekeeping jobs
//!
//! These are the jobs the service binary wires into the registry at
//! startup. The scheduling core knows nothing about them; they are ordinary
//! job definitions built from configuration, and deployments embedding the
//! library are free to ignore them entirely.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::Result;
use sysinfo::System;
use tracing::{debug, info, warn};

use crate::rotation::RotationPool;
use crate::scheduling::{JobDefinition, ScheduleSpec, job_unit};

/// Managed periodic job that deletes expired spool files
///
/// Each fire picks the next volume from the rotation pool, so sweep load
/// spreads evenly across volumes instead of hammering all of them at once.
pub fn spool_sweep_job(
    pool: Arc<RotationPool<PathBuf>>,
    retention: Duration,
    interval: String,
) -> JobDefinition {
    JobDefinition::new(
        "spool-sweep",
        "Deletes spool files past their retention, one volume per fire",
        ScheduleSpec::Periodic(interval),
        job_unit(move || {
            let pool = Arc::clone(&pool);
            async move {
                let Some(volume) = pool.next() else {
                    debug!("No spool volumes in rotation, nothing to sweep");
                    return Ok(());
                };
                sweep_volume(&volume, retention).await
            }
        }),
    )
}

/// Managed cron job that reconciles the volume pool against the filesystem
///
/// Volumes that appeared on disk join the rotation; volumes that vanished
/// leave it. This plays the inventory-collaborator role for the pool.
pub fn volume_scan_job(
    pool: Arc<RotationPool<PathBuf>>,
    configured: Vec<PathBuf>,
    cron: String,
) -> JobDefinition {
    JobDefinition::new(
        "volume-scan",
        "Reconciles the spool volume rotation against the directories on disk",
        ScheduleSpec::Cron(cron),
        job_unit(move || {
            let pool = Arc::clone(&pool);
            let configured = configured.clone();
            async move {
                for path in &configured {
                    let exists = tokio::fs::metadata(path)
                        .await
                        .map(|m| m.is_dir())
                        .unwrap_or(false);
                    let present = pool.contains(path);
                    if exists && !present {
                        info!("Volume {:?} came online, adding to rotation", path);
                        pool.add(path.clone());
                    } else if !exists && present {
                        warn!("Volume {:?} is gone, removing from rotation", path);
                        pool.remove(path);
                    }
                }
                Ok(())
            }
        }),
    )
}

/// Unmanaged periodic job reporting this node's memory and load
///
/// Strictly node-local: every node reports its own numbers, so the job runs
/// everywhere with no cluster coordination.
pub fn node_status_job(interval: String) -> JobDefinition {
    JobDefinition::new(
        "node-status",
        "Logs this node's memory usage and load averages",
        ScheduleSpec::Periodic(interval),
        job_unit(|| async {
            let mut system = System::new();
            system.refresh_memory();
            let load = System::load_average();
            info!(
                "Node status: memory {:.0}/{:.0} MiB used, load {:.2} {:.2} {:.2}",
                system.used_memory() as f64 / (1024.0 * 1024.0),
                system.total_memory() as f64 / (1024.0 * 1024.0),
                load.one,
                load.five,
                load.fifteen,
            );
            Ok(())
        }),
    )
    .unmanaged()
}

async fn sweep_volume(volume: &Path, retention: Duration) -> Result<()> {
    let cutoff = SystemTime::now()
        .checked_sub(retention)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut removed = 0usize;
    let mut entries = tokio::fs::read_dir(volume).await?;
    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let Ok(modified) = metadata.modified() else {
            continue;
        };
        if modified < cutoff {
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove {:?}: {}", entry.path(), e),
            }
        }
    }

    info!("Swept {:?}: removed {} expired files", volume, removed);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_sweep_volume_removes_only_expired_files() {
        let dir = tempfile::tempdir().unwrap();
        let old_file = dir.path().join("old.dat");
        let fresh_file = dir.path().join("fresh.dat");
        fs::write(&old_file, b"old").unwrap();

        // Age the first file past the retention window, then write the second.
        tokio::time::sleep(Duration::from_millis(200)).await;
        fs::write(&fresh_file, b"fresh").unwrap();

        sweep_volume(dir.path(), Duration::from_millis(100))
            .await
            .unwrap();

        assert!(!old_file.exists());
        assert!(fresh_file.exists());
    }

    #[tokio::test]
    async fn test_sweep_job_with_empty_pool_is_a_noop() {
        let pool: Arc<RotationPool<PathBuf>> = Arc::new(RotationPool::new());
        let definition = spool_sweep_job(pool, Duration::from_secs(60), "15m".to_string());
        assert!(definition.managed);

        let result = (definition.unit)().await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_volume_scan_adds_and_removes_volumes() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("vol-a");
        let missing = dir.path().join("vol-b");
        fs::create_dir(&existing).unwrap();

        let pool: Arc<RotationPool<PathBuf>> = Arc::new(RotationPool::new());
        pool.add(missing.clone());

        let definition = volume_scan_job(
            Arc::clone(&pool),
            vec![existing.clone(), missing.clone()],
            "0 0 * * * *".to_string(),
        );
        (definition.unit)().await.unwrap();

        assert!(pool.contains(&existing));
        assert!(!pool.contains(&missing));
    }

    #[test]
    fn test_node_status_job_is_unmanaged() {
        let definition = node_status_job("1m".to_string());
        assert!(!definition.managed);
        assert_eq!(definition.name, "node-status");
    }
}
