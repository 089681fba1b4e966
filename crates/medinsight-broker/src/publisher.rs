//! Fire-and-forget event publisher.
//!
//! Domain services call the publisher after their own write has committed.
//! A failed publish is logged and dropped; it never fails the caller.

use std::sync::Arc;

use tracing::{info, warn};

use medinsight_core::AppResult;
use medinsight_core::events::{AuditEvent, NotificationEvent, PipelineEvent};

use crate::record::OutboundRecord;
use crate::topics::TopicRegistry;
use crate::traits::MessageProducer;

/// Publishes pipeline events to their topics.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    producer: Arc<dyn MessageProducer>,
    topics: Arc<TopicRegistry>,
}

impl EventPublisher {
    /// Create a publisher.
    pub fn new(producer: Arc<dyn MessageProducer>, topics: Arc<TopicRegistry>) -> Self {
        Self { producer, topics }
    }

    /// Publish an audit event to the audit topic.
    pub async fn publish_audit_event(&self, event: AuditEvent) {
        self.publish(&event).await;
    }

    /// Publish a notification event to the notification topic.
    pub async fn publish_notification_event(&self, event: NotificationEvent) {
        self.publish(&event).await;
    }

    /// Publish to the topic bound to the event's kind.
    pub async fn publish<E: PipelineEvent>(&self, event: &E) {
        let topic = self.topics.topic_for(E::KIND).to_string();
        self.publish_to(event, &topic).await;
    }

    /// Publish to an explicit topic. Failures are logged, not returned.
    pub async fn publish_to<E: PipelineEvent>(&self, event: &E, topic: &str) {
        match self.try_publish_to(event, topic).await {
            Ok(()) => info!(kind = %E::KIND, topic, "Published event"),
            Err(e) => warn!(kind = %E::KIND, topic, error = %e, "Failed to publish event"),
        }
    }

    /// Publish to an explicit topic and report the outcome.
    pub async fn try_publish_to<E: PipelineEvent>(&self, event: &E, topic: &str) -> AppResult<()> {
        let payload = event.to_payload()?;
        self.producer
            .send(OutboundRecord::new(topic, event.partition_key(), payload))
            .await
    }

    /// Append a raw record, as stored, to `topic`.
    pub async fn republish(
        &self,
        topic: &str,
        key: Option<String>,
        payload: Vec<u8>,
    ) -> AppResult<()> {
        self.producer
            .send(OutboundRecord::new(topic, key, payload))
            .await
    }

    /// The registry this publisher resolves topics with.
    pub fn topics(&self) -> &TopicRegistry {
        &self.topics
    }
}
