//! Operator view over dead-letter topics and quarantined records.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use medinsight_broker::{EventPublisher, MessageBroker, TopicRegistry};
use medinsight_core::types::{PageRequest, PageResponse, PoisonMessageId};
use medinsight_core::{AppError, AppResult};
use medinsight_database::PoisonMessageStore;
use medinsight_entity::dead_letter::PoisonMessage;

use crate::audit::AuditService;

/// Depth of one dead-letter topic.
#[derive(Debug, Clone, Serialize)]
pub struct DlqTopicStats {
    /// Topic name.
    pub topic: String,
    /// Records retained, or `None` when the broker cannot tell.
    pub depth: Option<u64>,
}

/// Dead-letter overview.
#[derive(Debug, Clone, Serialize)]
pub struct DlqStats {
    /// Every dead-letter topic.
    pub dlq_topics: Vec<DlqTopicStats>,
    /// Records in quarantine.
    pub quarantined_messages: u64,
    /// Open security alerts.
    pub unresolved_alerts: u64,
    /// Audit log entries.
    pub total_audit_logs: u64,
}

/// Reads dead-letter state and replays quarantined records.
#[derive(Debug, Clone)]
pub struct DlqMonitor {
    broker: Arc<dyn MessageBroker>,
    topics: Arc<TopicRegistry>,
    publisher: Arc<EventPublisher>,
    poison: Arc<dyn PoisonMessageStore>,
    audit: Arc<AuditService>,
}

impl DlqMonitor {
    /// Create a monitor.
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        topics: Arc<TopicRegistry>,
        publisher: Arc<EventPublisher>,
        poison: Arc<dyn PoisonMessageStore>,
        audit: Arc<AuditService>,
    ) -> Self {
        Self {
            broker,
            topics,
            publisher,
            poison,
            audit,
        }
    }

    /// Current dead-letter statistics.
    pub async fn stats(&self) -> AppResult<DlqStats> {
        let mut dlq_topics = Vec::new();
        for topic in self.topics.dead_letter_topics() {
            let depth = match self.broker.topic_depth(&topic).await {
                Ok(depth) => depth,
                Err(e) => {
                    warn!(topic = %topic, error = %e, "Could not read topic depth");
                    None
                }
            };
            dlq_topics.push(DlqTopicStats { topic, depth });
        }
        Ok(DlqStats {
            dlq_topics,
            quarantined_messages: self.poison.count().await?,
            unresolved_alerts: self.audit.unresolved_alerts().await?,
            total_audit_logs: self.audit.count().await?,
        })
    }

    /// Quarantined records, newest first.
    pub async fn list(&self, page: &PageRequest) -> AppResult<PageResponse<PoisonMessage>> {
        self.poison.list(page).await
    }

    /// One quarantined record.
    pub async fn get(&self, id: PoisonMessageId) -> AppResult<PoisonMessage> {
        self.poison
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Poison message {id} not found")))
    }

    /// Publish a quarantined record back to its source topic unchanged.
    pub async fn replay(&self, id: PoisonMessageId) -> AppResult<PoisonMessage> {
        let mut message = self.get(id).await?;
        if let Some(at) = message.replayed_at {
            return Err(AppError::conflict(format!(
                "Poison message {id} was already replayed at {at}"
            )));
        }

        let now = Utc::now();
        if !self.poison.mark_replayed(id, now).await? {
            warn!(poison_message_id = %id, "Replay lost to a concurrent replay");
            return Err(AppError::conflict(format!(
                "Poison message {id} is already being replayed"
            )));
        }

        if let Err(e) = self
            .publisher
            .republish(
                &message.source_topic,
                message.message_key.clone(),
                message.payload.clone(),
            )
            .await
        {
            if let Err(clear) = self.poison.clear_replayed(id).await {
                error!(
                    poison_message_id = %id,
                    error = %clear,
                    "Failed to release replay claim"
                );
            }
            return Err(e);
        }
        message.replayed_at = Some(now);

        info!(
            poison_message_id = %id,
            topic = %message.source_topic,
            "Quarantined record replayed"
        );
        Ok(message)
    }
}
