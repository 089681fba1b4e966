//! Terminal sink for records that could not be dead-lettered.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::error;

use medinsight_broker::{PoisonSink, QuarantinedRecord};
use medinsight_core::AppResult;
use medinsight_core::types::PoisonMessageId;
use medinsight_database::PoisonMessageStore;
use medinsight_entity::audit::{AlertSeverity, NewSecurityAlert};
use medinsight_entity::dead_letter::PoisonMessage;

use crate::audit::AuditService;

/// Alert type raised for every quarantined record.
pub const POISON_MESSAGE_ALERT: &str = "POISON_MESSAGE";

/// Persists poisoned records and raises a CRITICAL security alert for each.
#[derive(Debug, Clone)]
pub struct QuarantineService {
    store: Arc<dyn PoisonMessageStore>,
    audit: Arc<AuditService>,
}

impl QuarantineService {
    /// Create the sink.
    pub fn new(store: Arc<dyn PoisonMessageStore>, audit: Arc<AuditService>) -> Self {
        Self { store, audit }
    }
}

#[async_trait]
impl PoisonSink for QuarantineService {
    async fn quarantine(&self, quarantined: QuarantinedRecord) -> AppResult<()> {
        let record = &quarantined.record;
        let message = PoisonMessage {
            id: PoisonMessageId::new(),
            source_topic: record.topic.clone(),
            source_partition: record.partition,
            source_offset: record.offset,
            message_key: record.key.clone(),
            payload: record.payload.clone(),
            error: format!(
                "{}; dead-letter send to {} failed: {}",
                quarantined.processing_error, quarantined.dead_letter_topic, quarantined.send_error
            ),
            attempts: i32::try_from(quarantined.attempts).unwrap_or(i32::MAX),
            quarantined_at: Utc::now(),
            replayed_at: None,
        };
        self.store.insert(&message).await?;
        error!(
            poison_message_id = %message.id,
            record = %record.position(),
            "Record quarantined"
        );

        self.audit
            .raise_alert(NewSecurityAlert {
                severity: AlertSeverity::Critical,
                alert_type: POISON_MESSAGE_ALERT.to_string(),
                description: format!(
                    "Record {} could not be dead-lettered after {} attempts and was quarantined as {}",
                    record.position(),
                    quarantined.attempts,
                    message.id
                ),
                source_ip: None,
                actor_id: None,
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use medinsight_broker::ConsumerRecord;
    use medinsight_core::types::PageRequest;
    use medinsight_database::Stores;

    use super::*;

    #[tokio::test]
    async fn test_quarantine_stores_record_and_raises_alert() {
        let stores = Stores::memory();
        let audit = Arc::new(AuditService::new(stores.audit_logs.clone(), stores.alerts.clone()));
        let sink = QuarantineService::new(stores.poison.clone(), audit.clone());

        sink.quarantine(QuarantinedRecord {
            record: ConsumerRecord {
                topic: "audit-events".into(),
                partition: 2,
                offset: 99,
                key: Some("Patient:42".into()),
                payload: b"{}".to_vec(),
                headers: Vec::new(),
                timestamp: Utc::now(),
            },
            processing_error: "malformed record: missing field".into(),
            send_error: "broker unavailable".into(),
            attempts: 5,
            dead_letter_topic: "audit-events-dlq".into(),
        })
        .await
        .unwrap();

        let page = stores.poison.list(&PageRequest::default()).await.unwrap();
        assert_eq!(page.items.len(), 1);
        let stored = &page.items[0];
        assert_eq!(stored.source_offset, 99);
        assert_eq!(stored.attempts, 5);
        assert!(stored.error.contains("broker unavailable"));

        let alerts = audit
            .list_alerts(Some(AlertSeverity::Critical), Some(false))
            .await
            .unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, POISON_MESSAGE_ALERT);
    }
}
