//! Shared test helpers for integration tests.
#![allow(dead_code)]

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use medinsight_broker::{
    ConsumerRecord, InMemoryBroker, MessageBroker, MessageConsumer, MessageProducer,
    OutboundRecord,
};
use medinsight_core::config::{AppConfig, DeliveryMode};
use medinsight_core::events::NotificationChannel;
use medinsight_core::{AppError, AppResult};
use medinsight_database::Stores;
use medinsight_runtime::{Application, RunningApplication};
use medinsight_service::delivery::{ChannelSender, OutgoingMessage, SendError};

/// Configuration with short timeouts so tests settle quickly.
pub fn fast_config(mode: DeliveryMode) -> AppConfig {
    let mut config = AppConfig::default();
    config.broker.partitions = 1;
    config.consumer.poll_timeout_ms = 20;
    config.consumer.max_redeliveries = 2;
    config.consumer.backoff_initial_ms = 5;
    config.consumer.backoff_max_ms = 20;
    config.dead_letter.max_send_attempts = 3;
    config.dead_letter.backoff_initial_ms = 5;
    config.dead_letter.backoff_max_ms = 20;
    config.notification.delivery_mode = mode;
    config.notification.retry_backoff_seconds = 0;
    config.worker.poll_interval_ms = 20;
    config
}

/// Test application context
pub struct TestApp {
    /// The assembled pipeline
    pub app: Application,
    /// Handles to the started consumers and worker
    pub running: Option<RunningApplication>,
    /// The broker behind the pipeline
    pub broker: Arc<InMemoryBroker>,
    /// Recording sender installed for every channel
    pub sender: Arc<RecordingSender>,
}

impl TestApp {
    /// Build and start a pipeline on the in-memory broker and stores.
    pub async fn start(config: AppConfig) -> Self {
        let broker = Arc::new(InMemoryBroker::new(config.broker.partitions));
        Self::start_with_broker(config, broker.clone(), broker).await
    }

    /// Build and start a pipeline over `pipeline_broker`, inspecting
    /// records through `broker`.
    pub async fn start_with_broker(
        config: AppConfig,
        broker: Arc<InMemoryBroker>,
        pipeline_broker: Arc<dyn MessageBroker>,
    ) -> Self {
        let sender = Arc::new(RecordingSender::default());
        let mut builder = Application::builder(config)
            .with_stores(Stores::memory())
            .with_broker(pipeline_broker);
        for channel in NotificationChannel::ALL {
            builder = builder.with_sender(Arc::new(ChannelView {
                channel,
                inner: sender.clone(),
            }));
        }
        let app = builder.build().await.expect("Failed to build application");
        let running = app.start().await.expect("Failed to start application");

        Self {
            app,
            running: Some(running),
            broker,
            sender,
        }
    }

    /// Stop consumers and worker.
    pub async fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.shutdown().await.expect("Failed to shut down");
        }
    }

    /// Append a raw payload to `topic`.
    pub async fn send_raw(&self, topic: &str, key: Option<&str>, payload: &[u8]) {
        self.broker
            .send(OutboundRecord::new(
                topic,
                key.map(str::to_string),
                payload.to_vec(),
            ))
            .await
            .expect("Failed to append record");
    }

    /// Records currently on `topic`.
    pub fn records(&self, topic: &str) -> Vec<ConsumerRecord> {
        self.broker.records(topic)
    }
}

/// Poll `check` until it returns true or five seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..250 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

/// Records every message sent over any channel.
#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(NotificationChannel, OutgoingMessage)>>,
    failure: Mutex<Option<SendError>>,
}

impl RecordingSender {
    /// Fail every send with `error` until cleared.
    pub fn fail_with(&self, error: Option<SendError>) {
        *self.failure.lock().unwrap() = error;
    }

    /// Messages sent so far.
    pub fn sent(&self) -> Vec<(NotificationChannel, OutgoingMessage)> {
        self.sent.lock().unwrap().clone()
    }

    fn record(
        &self,
        channel: NotificationChannel,
        message: &OutgoingMessage,
    ) -> Result<(), SendError> {
        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }
        self.sent.lock().unwrap().push((channel, message.clone()));
        Ok(())
    }
}

/// One channel's view of a shared [`RecordingSender`].
#[derive(Debug)]
struct ChannelView {
    channel: NotificationChannel,
    inner: Arc<RecordingSender>,
}

#[async_trait]
impl ChannelSender for ChannelView {
    fn channel(&self) -> NotificationChannel {
        self.channel
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<(), SendError> {
        self.inner.record(self.channel, message)
    }
}

/// Broker whose producer cannot reach topics ending in `-dlq`.
#[derive(Debug)]
pub struct DlqDownBroker {
    pub inner: Arc<InMemoryBroker>,
}

#[async_trait]
impl MessageBroker for DlqDownBroker {
    fn name(&self) -> &'static str {
        "dlq-down"
    }

    fn producer(&self) -> Arc<dyn MessageProducer> {
        Arc::new(DlqDownProducer {
            inner: self.inner.producer(),
        })
    }

    async fn subscribe(
        &self,
        group: &str,
        topics: &[String],
    ) -> AppResult<Box<dyn MessageConsumer>> {
        self.inner.subscribe(group, topics).await
    }

    async fn ensure_topics(&self, topics: &[String]) -> AppResult<()> {
        self.inner.ensure_topics(topics).await
    }

    async fn topic_depth(&self, topic: &str) -> AppResult<Option<u64>> {
        self.inner.topic_depth(topic).await
    }
}

#[derive(Debug)]
struct DlqDownProducer {
    inner: Arc<dyn MessageProducer>,
}

#[async_trait]
impl MessageProducer for DlqDownProducer {
    async fn send(&self, record: OutboundRecord) -> AppResult<()> {
        if record.topic.ends_with("-dlq") {
            return Err(AppError::broker(format!("{} unavailable", record.topic)));
        }
        self.inner.send(record).await
    }
}
