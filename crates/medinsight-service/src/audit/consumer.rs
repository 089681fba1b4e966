//! Consumer of the audit event topic.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use medinsight_broker::{ConsumerRecord, ListenerError, RecordHandler};
use medinsight_core::events::{AuditEvent, PipelineEvent};

use super::service::AuditService;

/// Maps each audit event 1:1 onto an audit log entry.
///
/// An undecodable payload or unknown action is malformed and goes straight
/// to the dead-letter topic. A store failure is transient.
#[derive(Debug, Clone)]
pub struct AuditEventHandler {
    service: Arc<AuditService>,
}

impl AuditEventHandler {
    /// Create a handler writing through `service`.
    pub fn new(service: Arc<AuditService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl RecordHandler for AuditEventHandler {
    fn name(&self) -> &'static str {
        "audit"
    }

    async fn handle(&self, record: &ConsumerRecord) -> Result<(), ListenerError> {
        let event = AuditEvent::from_payload(&record.payload)?;
        info!(
            action = %event.action,
            entity_type = %event.entity_type,
            entity_id = %event.entity_id,
            "Consumed audit event"
        );
        self.service.record(&event).await?;
        Ok(())
    }
}
