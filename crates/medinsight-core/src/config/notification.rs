//! Notification delivery configuration.

use serde::{Deserialize, Serialize};

/// Where the channel send happens relative to the broker offset commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// The consumer sends before committing. A failed send marks the
    /// notification FAILED and dead-letters the record.
    Inline,
    /// The consumer stores the notification with a delivery task and
    /// commits. The delivery worker sends and retries.
    #[default]
    Outbox,
}

/// Notification consumer and delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Delivery mode.
    #[serde(default)]
    pub delivery_mode: DeliveryMode,
    /// Delivery attempts per outbox task.
    #[serde(default = "default_max_attempts")]
    pub max_delivery_attempts: i32,
    /// Base delay between outbox retries, in seconds. Doubles per attempt.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_seconds: u64,
    /// Link placed in the welcome email.
    #[serde(default = "default_portal_url")]
    pub portal_url: String,
    /// Address used when an email notification carries no recipient email.
    #[serde(default)]
    pub fallback_email: Option<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            delivery_mode: DeliveryMode::default(),
            max_delivery_attempts: default_max_attempts(),
            retry_backoff_seconds: default_retry_backoff(),
            portal_url: default_portal_url(),
            fallback_email: None,
        }
    }
}

fn default_max_attempts() -> i32 {
    5
}

fn default_retry_backoff() -> u64 {
    30
}

fn default_portal_url() -> String {
    "https://portal.medinsight.local".to_string()
}
