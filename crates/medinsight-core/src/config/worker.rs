//! Delivery worker configuration.

use serde::{Deserialize, Serialize};

/// Outbox delivery worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the worker runs inside the server process.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Number of concurrent delivery tasks.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Interval in milliseconds between queue polls when the queue is empty.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Tasks left `running` longer than this are handed back to the queue.
    #[serde(default = "default_stale_after")]
    pub stale_after_seconds: i64,
    /// Completed and failed tasks older than this are purged.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    /// Cron expression for the maintenance pass.
    #[serde(default = "default_maintenance_cron")]
    pub maintenance_cron: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            concurrency: default_concurrency(),
            poll_interval_ms: default_poll_interval(),
            stale_after_seconds: default_stale_after(),
            retention_days: default_retention_days(),
            maintenance_cron: default_maintenance_cron(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    4
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_stale_after() -> i64 {
    300
}

fn default_retention_days() -> i64 {
    7
}

fn default_maintenance_cron() -> String {
    "0 * * * * *".to_string()
}
