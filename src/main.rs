use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Use the library instead of redeclaring modules
use jobmesh::{
    cluster::{ClusterLockService, LockStore, MemoryLockStore, StandaloneLockStore},
    config::{Config, LockBackend},
    housekeeping,
    rotation::RotationPool,
    scheduling::{JobRegistry, JobScheduler},
};

#[derive(Parser)]
#[command(name = "jobmesh")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cluster-coordinated background job scheduling")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Node name in the cluster's lock namespace (overrides config file)
    #[arg(short, long, value_name = "NAME")]
    node_name: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging with specified level
    let log_filter = format!("jobmesh={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting jobmesh v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration from specified file
    let mut config = Config::load_from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    // Override config with CLI arguments
    if let Some(node_name) = cli.node_name {
        config.node_name = Some(node_name);
    }

    let node_name = config.node_name.clone().unwrap_or_else(generate_node_name);
    info!("Node identity: {}", node_name);

    let settings = config.scheduler_settings()?;

    // Explicit wiring, leaves first: lock store, lock service, rotation
    // pool, registry, then the scheduler over all of them. No binding
    // framework; every dependency is constructed and passed by hand.
    let store: Arc<dyn LockStore> = match config.cluster.lock_backend {
        LockBackend::Memory => Arc::new(MemoryLockStore::new()),
        LockBackend::Standalone => Arc::new(StandaloneLockStore::new()),
    };
    let cluster_lock = Arc::new(ClusterLockService::new(store, node_name));
    info!(
        "Cluster lock service initialized ({:?} backend)",
        config.cluster.lock_backend
    );

    let volume_pool: Arc<RotationPool<PathBuf>> = Arc::new(RotationPool::new());
    for path in &config.sweep.spool_paths {
        if path.is_dir() {
            volume_pool.add(path.clone());
        } else {
            warn!(
                "Spool volume {:?} does not exist yet, leaving it to the volume scan",
                path
            );
        }
    }
    info!(
        "Volume rotation initialized with {} of {} configured volumes",
        volume_pool.len(),
        config.sweep.spool_paths.len()
    );

    let retention = humantime::parse_duration(&config.sweep.retention).map_err(|e| {
        anyhow::anyhow!("Invalid sweep retention '{}': {}", config.sweep.retention, e)
    })?;

    let registry = Arc::new(JobRegistry::new());
    for definition in [
        housekeeping::spool_sweep_job(
            Arc::clone(&volume_pool),
            retention,
            config.sweep.interval.clone(),
        ),
        housekeeping::volume_scan_job(
            Arc::clone(&volume_pool),
            config.sweep.spool_paths.clone(),
            config.sweep.volume_scan_cron.clone(),
        ),
        housekeeping::node_status_job(config.sweep.status_interval.clone()),
    ] {
        registry.register(config.apply_job_overrides(definition))?;
    }
    info!("Job registry populated with {} jobs", registry.len());

    let scheduler = JobScheduler::new(Arc::clone(&registry), cluster_lock, settings);

    let cancellation_token = tokio_util::sync::CancellationToken::new();
    let signal_token = cancellation_token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown signal received");
        signal_token.cancel();
    });

    scheduler.run(cancellation_token).await?;
    Ok(())
}

/// Node identity when none is configured: host name plus a short unique tail
fn generate_node_name() -> String {
    let host = sysinfo::System::host_name().unwrap_or_else(|| "node".to_string());
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", host, &id[..8])
}
