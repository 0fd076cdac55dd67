/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Node defaults
pub const DEFAULT_TIMEZONE: &str = "UTC";

// Scheduler defaults
pub const DEFAULT_SHUTDOWN_GRACE: &str = "30s";

// Spool sweep defaults
pub const DEFAULT_SPOOL_PATH: &str = "./data/spool";
pub const DEFAULT_SWEEP_RETENTION: &str = "24h";
pub const DEFAULT_SWEEP_INTERVAL: &str = "15m";
pub const DEFAULT_VOLUME_SCAN_CRON: &str = "0 0 * * * *";

// Node status defaults
pub const DEFAULT_STATUS_INTERVAL: &str = "1m";
