//! Listener containers: drive a consumer group and hand records to a handler.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time;

use medinsight_core::error::ErrorKind;
use medinsight_core::{AppError, AppResult};

use crate::dead_letter::{DeadLetterErrorHandler, Disposition};
use crate::metrics::PipelineMetrics;
use crate::record::ConsumerRecord;
use crate::traits::{MessageBroker, MessageConsumer};

/// Why a handler could not process a record.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ListenerError {
    /// The payload can never be processed.
    #[error("malformed record: {0}")]
    Malformed(String),
    /// A dependency failed; another attempt may succeed.
    #[error("transient failure: {0}")]
    Transient(String),
    /// Processing finished with an outcome that must not be retried.
    #[error("rejected: {0}")]
    Rejected(String),
}

impl ListenerError {
    /// Whether the record deserves a redelivery before dead-lettering.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<AppError> for ListenerError {
    fn from(err: AppError) -> Self {
        match err.kind {
            ErrorKind::Serialization | ErrorKind::Validation => Self::Malformed(err.to_string()),
            _ if err.is_transient() => Self::Transient(err.to_string()),
            _ => Self::Rejected(err.to_string()),
        }
    }
}

/// Processes one record.
#[async_trait]
pub trait RecordHandler: Send + Sync + Debug + 'static {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Process `record`. `Ok` commits its offset.
    async fn handle(&self, record: &ConsumerRecord) -> Result<(), ListenerError>;
}

/// Runs `concurrency` members of one consumer group.
#[derive(Debug)]
pub struct ListenerContainer {
    group: String,
    topics: Vec<String>,
    broker: Arc<dyn MessageBroker>,
    handler: Arc<dyn RecordHandler>,
    error_handler: Arc<DeadLetterErrorHandler>,
    metrics: Arc<PipelineMetrics>,
    concurrency: usize,
    poll_timeout: Duration,
}

impl ListenerContainer {
    /// Create a container with one member and a 500ms poll timeout.
    pub fn new(
        group: impl Into<String>,
        topics: Vec<String>,
        broker: Arc<dyn MessageBroker>,
        handler: Arc<dyn RecordHandler>,
        error_handler: Arc<DeadLetterErrorHandler>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            group: group.into(),
            topics,
            broker,
            handler,
            error_handler,
            metrics,
            concurrency: 1,
            poll_timeout: Duration::from_millis(500),
        }
    }

    /// Set the number of group members.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set how long one poll waits for a record.
    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    /// The consumer group.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Run until `cancel` turns true. A record being processed when the
    /// signal arrives is finished first.
    pub async fn run(self: Arc<Self>, cancel: watch::Receiver<bool>) -> AppResult<()> {
        let mut consumers = Vec::with_capacity(self.concurrency);
        for _ in 0..self.concurrency {
            consumers.push(self.broker.subscribe(&self.group, &self.topics).await?);
        }

        tracing::info!(
            "Listener '{}' started: group={}, topics={:?}, concurrency={}",
            self.handler.name(),
            self.group,
            self.topics,
            self.concurrency
        );

        let mut members = Vec::with_capacity(consumers.len());
        for (member, consumer) in consumers.into_iter().enumerate() {
            let container = Arc::clone(&self);
            let cancel = cancel.clone();
            members.push(tokio::spawn(async move {
                container.run_member(member, consumer, cancel).await;
            }));
        }

        for member in members {
            if let Err(e) = member.await {
                tracing::error!("Listener '{}' member panicked: {}", self.handler.name(), e);
            }
        }

        tracing::info!("Listener '{}' stopped", self.handler.name());
        Ok(())
    }

    async fn run_member(
        &self,
        member: usize,
        consumer: Box<dyn MessageConsumer>,
        mut cancel: watch::Receiver<bool>,
    ) {
        loop {
            if *cancel.borrow() {
                break;
            }

            let polled = tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        break;
                    }
                    continue;
                }
                polled = consumer.poll(self.poll_timeout) => polled,
            };

            match polled {
                Ok(Some(record)) => self.process(consumer.as_ref(), record, &mut cancel).await,
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(
                        "Listener '{}' member {} failed to poll: {}",
                        self.handler.name(),
                        member,
                        e
                    );
                    time::sleep(self.poll_timeout).await;
                }
            }
        }

        tracing::debug!("Listener '{}' member {} exiting", self.handler.name(), member);
    }

    /// Handle one record and settle its offset.
    async fn process(
        &self,
        consumer: &dyn MessageConsumer,
        record: ConsumerRecord,
        cancel: &mut watch::Receiver<bool>,
    ) {
        tracing::debug!("Listener '{}' received {}", self.handler.name(), record.position());

        match self.handler.handle(&record).await {
            Ok(()) => {
                self.error_handler.clear(&record);
                self.metrics.record_processed();
                self.commit(consumer, &record).await;
            }
            Err(failure) => match self.error_handler.handle_failure(&record, &failure).await {
                Disposition::Redeliver(delay) => {
                    tokio::select! {
                        _ = time::sleep(delay) => {}
                        _ = cancel.changed() => {}
                    }
                    if let Err(e) = consumer.rewind(&record).await {
                        tracing::error!("Failed to rewind {}: {}", record.position(), e);
                    }
                }
                Disposition::DeadLettered(_) | Disposition::Poisoned => {
                    self.commit(consumer, &record).await;
                }
            },
        }
    }

    async fn commit(&self, consumer: &dyn MessageConsumer, record: &ConsumerRecord) {
        if let Err(e) = consumer.commit(record).await {
            tracing::error!("Failed to commit {}: {}", record.position(), e);
        }
    }
}
