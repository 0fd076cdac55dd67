use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;

pub mod defaults;

use defaults::*;

use crate::scheduling::{JobDefinition, ScheduleSpec, SchedulerSettings};

/// Top-level service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Node identity in the cluster's lock namespace; generated from the
    /// host name when absent
    #[serde(default)]
    pub node_name: Option<String>,
    /// Fixed reference zone for evaluating cron expressions
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    /// Per-job overrides keyed by job name, applied at registration
    #[serde(default)]
    pub jobs: HashMap<String, JobOverrideConfig>,
}

/// Scheduler run-loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How long shutdown waits for in-flight job units
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace: String,
}

/// Cluster coordination configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Which lock backing store to use
    #[serde(default = "default_lock_backend")]
    pub lock_backend: LockBackend,
}

/// Lock backing store selection
///
/// `Memory` is exclusive within one process (single-node deployments);
/// `Standalone` always grants and is only suitable where coordination is
/// moot. Consensus-backed stores are wired in by the embedding deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockBackend {
    Memory,
    Standalone,
}

/// Tuning for the built-in spool housekeeping jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Spool volumes the sweep job rotates through
    #[serde(default = "default_spool_paths")]
    pub spool_paths: Vec<PathBuf>,
    /// Files older than this are deleted by the sweep
    #[serde(default = "default_sweep_retention")]
    pub retention: String,
    /// Interval between sweep fires
    #[serde(default = "default_sweep_interval")]
    pub interval: String,
    /// Cron expression for reconciling the volume pool against disk
    #[serde(default = "default_volume_scan_cron")]
    pub volume_scan_cron: String,
    /// Interval between node status reports
    #[serde(default = "default_status_interval")]
    pub status_interval: String,
}

/// Per-job configuration overrides
///
/// Lets a deployment retune or disable a wired-in job without code changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobOverrideConfig {
    pub enabled: Option<bool>,
    pub schedule: Option<ScheduleSpec>,
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}
fn default_shutdown_grace() -> String {
    DEFAULT_SHUTDOWN_GRACE.to_string()
}
fn default_lock_backend() -> LockBackend {
    LockBackend::Memory
}
fn default_spool_paths() -> Vec<PathBuf> {
    vec![PathBuf::from(DEFAULT_SPOOL_PATH)]
}
fn default_sweep_retention() -> String {
    DEFAULT_SWEEP_RETENTION.to_string()
}
fn default_sweep_interval() -> String {
    DEFAULT_SWEEP_INTERVAL.to_string()
}
fn default_volume_scan_cron() -> String {
    DEFAULT_VOLUME_SCAN_CRON.to_string()
}
fn default_status_interval() -> String {
    DEFAULT_STATUS_INTERVAL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_name: None,
            timezone: default_timezone(),
            scheduler: SchedulerConfig::default(),
            cluster: ClusterConfig::default(),
            sweep: SweepConfig::default(),
            jobs: HashMap::new(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            lock_backend: default_lock_backend(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            spool_paths: default_spool_paths(),
            retention: default_sweep_retention(),
            interval: default_sweep_interval(),
            volume_scan_cron: default_volume_scan_cron(),
            status_interval: default_status_interval(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_file(&config_file)
    }

    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            Ok(default_config)
        }
    }

    /// Resolve the scheduler settings from their string forms
    pub fn scheduler_settings(&self) -> Result<SchedulerSettings> {
        let timezone = self
            .timezone
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid timezone '{}': {}", self.timezone, e))?;
        let shutdown_grace =
            humantime::parse_duration(&self.scheduler.shutdown_grace).map_err(|e| {
                anyhow::anyhow!(
                    "Invalid shutdown_grace '{}': {}",
                    self.scheduler.shutdown_grace,
                    e
                )
            })?;
        Ok(SchedulerSettings {
            timezone,
            shutdown_grace,
        })
    }

    /// Apply any `[jobs.<name>]` override to a definition before registration
    pub fn apply_job_overrides(&self, mut definition: JobDefinition) -> JobDefinition {
        if let Some(overrides) = self.jobs.get(&definition.name) {
            if let Some(enabled) = overrides.enabled {
                definition.enabled = enabled;
            }
            if let Some(schedule) = &overrides.schedule {
                definition.schedule = schedule.clone();
            }
        }
        definition
    }
}
