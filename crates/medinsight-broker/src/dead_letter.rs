//! Dead-letter routing for records whose handler failed.
//!
//! Per record:
//!
//! ```text
//! RECEIVED ─ok─> PROCESSED (commit)
//!    │
//!  failed ─transient, budget left─> REDELIVER ─> RECEIVED
//!    │
//!    └─> send to DLQ ─ok─> DLQ_SENT (commit)
//!              │   ^
//!              │   └─ budget left: wait, resend
//!              │
//!            failed, budget spent
//!              │
//!              └─> POISONED: quarantine, alert, commit
//! ```
//!
//! Dead-letter sends are retried in place: the handler never runs again for
//! a record that already failed. Redelivery counters live in memory keyed by
//! `(topic, partition, offset)` and are dropped once the record is committed.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{error, info, warn};

use medinsight_core::AppResult;
use medinsight_core::config::{ConsumerConfig, DeadLetterConfig};

use crate::backoff::Backoff;
use crate::listener::ListenerError;
use crate::metrics::PipelineMetrics;
use crate::record::{
    ConsumerRecord, HEADER_EXCEPTION_MESSAGE, HEADER_ORIGINAL_OFFSET, HEADER_ORIGINAL_PARTITION,
    HEADER_ORIGINAL_TOPIC, OutboundRecord,
};
use crate::topics::TopicRegistry;
use crate::traits::MessageProducer;

/// A record that could not be dead-lettered.
#[derive(Debug, Clone)]
pub struct QuarantinedRecord {
    /// The record as consumed.
    pub record: ConsumerRecord,
    /// Why the handler failed.
    pub processing_error: String,
    /// Why the last dead-letter send failed.
    pub send_error: String,
    /// Dead-letter sends attempted.
    pub attempts: u32,
    /// Where the record should have gone.
    pub dead_letter_topic: String,
}

/// Terminal destination for poisoned records.
#[async_trait]
pub trait PoisonSink: Send + Sync + Debug + 'static {
    /// Keep the record for operators and raise an alert.
    async fn quarantine(&self, quarantined: QuarantinedRecord) -> AppResult<()>;
}

/// What the listener container does with a failed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Rewind and hand the record out again after the delay.
    Redeliver(Duration),
    /// The record is on this dead-letter topic. Commit.
    DeadLettered(String),
    /// The record was quarantined. Commit.
    Poisoned,
}

impl Disposition {
    /// Whether the record's offset should be committed.
    pub fn commits(&self) -> bool {
        !matches!(self, Self::Redeliver(_))
    }
}

/// Retry bounds of the dead-letter handler.
#[derive(Debug, Clone, Copy)]
pub struct DeadLetterPolicy {
    /// Redeliveries granted to transient handler failures.
    pub max_redeliveries: u32,
    /// Delay schedule between redeliveries.
    pub redelivery_backoff: Backoff,
    /// Dead-letter sends before quarantine.
    pub max_send_attempts: u32,
    /// Delay schedule between dead-letter sends.
    pub send_backoff: Backoff,
}

impl DeadLetterPolicy {
    /// Build the policy from configuration.
    pub fn from_config(consumer: &ConsumerConfig, dead_letter: &DeadLetterConfig) -> Self {
        Self {
            max_redeliveries: consumer.max_redeliveries,
            redelivery_backoff: Backoff::from_millis(
                consumer.backoff_initial_ms,
                consumer.backoff_max_ms,
            ),
            max_send_attempts: dead_letter.max_send_attempts.max(1),
            send_backoff: Backoff::from_millis(
                dead_letter.backoff_initial_ms,
                dead_letter.backoff_max_ms,
            ),
        }
    }
}

type AttemptKey = (String, i32, i64);

fn attempt_key(record: &ConsumerRecord) -> AttemptKey {
    (record.topic.clone(), record.partition, record.offset)
}

/// Routes failed records to their dead-letter topic.
#[derive(Debug)]
pub struct DeadLetterErrorHandler {
    producer: Arc<dyn MessageProducer>,
    topics: Arc<TopicRegistry>,
    sink: Arc<dyn PoisonSink>,
    policy: DeadLetterPolicy,
    redeliveries: DashMap<AttemptKey, u32>,
    metrics: Arc<PipelineMetrics>,
}

impl DeadLetterErrorHandler {
    /// Create a handler.
    pub fn new(
        producer: Arc<dyn MessageProducer>,
        topics: Arc<TopicRegistry>,
        sink: Arc<dyn PoisonSink>,
        policy: DeadLetterPolicy,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            producer,
            topics,
            sink,
            policy,
            redeliveries: DashMap::new(),
            metrics,
        }
    }

    /// Forget the attempt history of a record that was committed.
    pub fn clear(&self, record: &ConsumerRecord) {
        self.redeliveries.remove(&attempt_key(record));
    }

    /// Decide what happens to a record whose handler returned `failure`.
    pub async fn handle_failure(
        &self,
        record: &ConsumerRecord,
        failure: &ListenerError,
    ) -> Disposition {
        let key = attempt_key(record);
        error!(
            record = %record.position(),
            error = %failure,
            "Error processing record"
        );

        if failure.is_retryable() {
            let mut entry = self.redeliveries.entry(key.clone()).or_default();
            if *entry < self.policy.max_redeliveries {
                *entry += 1;
                let delay = self.policy.redelivery_backoff.delay(*entry);
                drop(entry);
                warn!(
                    record = %record.position(),
                    delay_ms = delay.as_millis() as u64,
                    "Redelivering after transient failure"
                );
                self.metrics.record_redelivery();
                return Disposition::Redeliver(delay);
            }
        }

        let dlq_topic = self.topics.dead_letter_for(&record.topic);
        let outbound = OutboundRecord {
            topic: dlq_topic.clone(),
            key: record.key.clone(),
            payload: record.payload.clone(),
            headers: record.headers.clone(),
        }
        .with_header(HEADER_ORIGINAL_TOPIC, record.topic.clone())
        .with_header(HEADER_ORIGINAL_PARTITION, record.partition.to_string())
        .with_header(HEADER_ORIGINAL_OFFSET, record.offset.to_string())
        .with_header(HEADER_EXCEPTION_MESSAGE, failure.to_string());

        self.redeliveries.remove(&key);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let send_error = match self.producer.send(outbound.clone()).await {
                Ok(()) => {
                    self.metrics.record_dead_letter();
                    info!(record = %record.position(), dlq = %dlq_topic, "Sent failed record to DLQ");
                    return Disposition::DeadLettered(dlq_topic);
                }
                Err(e) => e,
            };

            if attempt >= self.policy.max_send_attempts {
                self.poison(QuarantinedRecord {
                    record: record.clone(),
                    processing_error: failure.to_string(),
                    send_error: send_error.to_string(),
                    attempts: attempt,
                    dead_letter_topic: dlq_topic,
                })
                .await;
                return Disposition::Poisoned;
            }

            let delay = self.policy.send_backoff.delay(attempt);
            error!(
                record = %record.position(),
                dlq = %dlq_topic,
                attempt,
                error = %send_error,
                "Failed to send record to DLQ, will retry"
            );
            self.metrics.record_dead_letter_retry();
            tokio::time::sleep(delay).await;
        }
    }

    async fn poison(&self, quarantined: QuarantinedRecord) {
        let position = quarantined.record.position();
        error!(
            record = %position,
            dlq = %quarantined.dead_letter_topic,
            attempts = quarantined.attempts,
            processing_error = %quarantined.processing_error,
            send_error = %quarantined.send_error,
            "Record poisoned: dead-letter send attempts exhausted"
        );
        self.metrics.record_poison();

        let payload = String::from_utf8_lossy(&quarantined.record.payload).into_owned();
        if let Err(e) = self.sink.quarantine(quarantined).await {
            // Last trace of the record; log the full value.
            error!(
                record = %position,
                payload = %payload,
                error = %e,
                "Failed to quarantine poisoned record"
            );
        }
    }
}
