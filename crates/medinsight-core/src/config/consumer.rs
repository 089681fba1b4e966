//! Consumer group configuration.

use serde::{Deserialize, Serialize};

/// Settings shared by the audit and notification listener containers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Consumer group of the audit consumer.
    #[serde(default = "default_audit_group")]
    pub audit_group: String,
    /// Consumer group of the notification consumer.
    #[serde(default = "default_notification_group")]
    pub notification_group: String,
    /// Group members started per listener container.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// How long one poll waits for a record, in milliseconds.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_ms: u64,
    /// Redeliveries granted to a transient failure before dead-lettering.
    #[serde(default = "default_max_redeliveries")]
    pub max_redeliveries: u32,
    /// First redelivery delay in milliseconds. Doubles per attempt.
    #[serde(default = "default_backoff_initial")]
    pub backoff_initial_ms: u64,
    /// Upper bound of the redelivery delay in milliseconds.
    #[serde(default = "default_backoff_max")]
    pub backoff_max_ms: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            audit_group: default_audit_group(),
            notification_group: default_notification_group(),
            concurrency: default_concurrency(),
            poll_timeout_ms: default_poll_timeout(),
            max_redeliveries: default_max_redeliveries(),
            backoff_initial_ms: default_backoff_initial(),
            backoff_max_ms: default_backoff_max(),
        }
    }
}

fn default_audit_group() -> String {
    "audit-service-group".to_string()
}

fn default_notification_group() -> String {
    "notification-service-group".to_string()
}

fn default_concurrency() -> usize {
    1
}

fn default_poll_timeout() -> u64 {
    500
}

fn default_max_redeliveries() -> u32 {
    3
}

fn default_backoff_initial() -> u64 {
    200
}

fn default_backoff_max() -> u64 {
    10_000
}
