//! Pipeline counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::json;

/// Counters shared by the listener containers and the dead-letter handler.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    processed: AtomicU64,
    redelivered: AtomicU64,
    dead_lettered: AtomicU64,
    dead_letter_retries: AtomicU64,
    poisoned: AtomicU64,
}

impl PipelineMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// A handler succeeded.
    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    /// A record was handed back for another attempt.
    pub fn record_redelivery(&self) {
        self.redelivered.fetch_add(1, Ordering::Relaxed);
    }

    /// A record reached its dead-letter topic.
    pub fn record_dead_letter(&self) {
        self.dead_lettered.fetch_add(1, Ordering::Relaxed);
    }

    /// A dead-letter send failed and will be retried.
    pub fn record_dead_letter_retry(&self) {
        self.dead_letter_retries.fetch_add(1, Ordering::Relaxed);
    }

    /// A record was quarantined.
    pub fn record_poison(&self) {
        self.poisoned.fetch_add(1, Ordering::Relaxed);
    }

    /// Records handled successfully.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Redeliveries requested.
    pub fn redelivered(&self) -> u64 {
        self.redelivered.load(Ordering::Relaxed)
    }

    /// Records sent to a dead-letter topic.
    pub fn dead_lettered(&self) -> u64 {
        self.dead_lettered.load(Ordering::Relaxed)
    }

    /// Dead-letter sends retried.
    pub fn dead_letter_retries(&self) -> u64 {
        self.dead_letter_retries.load(Ordering::Relaxed)
    }

    /// Records quarantined.
    pub fn poisoned(&self) -> u64 {
        self.poisoned.load(Ordering::Relaxed)
    }

    /// Snapshot as JSON.
    pub fn snapshot(&self) -> serde_json::Value {
        json!({
            "processed": self.processed(),
            "redelivered": self.redelivered(),
            "dead_lettered": self.dead_lettered(),
            "dead_letter_retries": self.dead_letter_retries(),
            "poisoned": self.poisoned(),
        })
    }
}
