//! Dead-letter routing configuration.

use serde::{Deserialize, Serialize};

/// Bounds for republishing failed records to their dead-letter topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterConfig {
    /// Attempts at sending one record to its dead-letter topic before the
    /// record is quarantined.
    #[serde(default = "default_max_send_attempts")]
    pub max_send_attempts: u32,
    /// First retry delay in milliseconds after a failed dead-letter send.
    #[serde(default = "default_backoff_initial")]
    pub backoff_initial_ms: u64,
    /// Upper bound of the retry delay in milliseconds.
    #[serde(default = "default_backoff_max")]
    pub backoff_max_ms: u64,
}

impl Default for DeadLetterConfig {
    fn default() -> Self {
        Self {
            max_send_attempts: default_max_send_attempts(),
            backoff_initial_ms: default_backoff_initial(),
            backoff_max_ms: default_backoff_max(),
        }
    }
}

fn default_max_send_attempts() -> u32 {
    5
}

fn default_backoff_initial() -> u64 {
    500
}

fn default_backoff_max() -> u64 {
    30_000
}
