//! Audit log entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use medinsight_core::events::{AuditAction, AuditEvent};
use medinsight_core::types::AuditLogId;

/// One immutable audit trail entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AuditLog {
    /// Unique entry identifier.
    pub id: AuditLogId,
    /// The acting user.
    pub actor_id: Option<Uuid>,
    /// Display name of the acting user.
    pub actor_name: Option<String>,
    /// What was done.
    pub action: AuditAction,
    /// Type of the affected record.
    pub entity_type: String,
    /// Identifier of the affected record.
    pub entity_id: String,
    /// Client address.
    pub ip_address: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
    /// Changed fields as a JSON object.
    pub changes: serde_json::Value,
    /// When the action happened, as stamped by the publisher.
    pub timestamp: DateTime<Utc>,
    /// When this entry was written.
    pub recorded_at: DateTime<Utc>,
}

impl AuditLog {
    /// Map an event field by field into a new entry.
    pub fn from_event(event: &AuditEvent) -> Self {
        let changes = event
            .changes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<serde_json::Map<_, _>>();

        Self {
            id: AuditLogId::new(),
            actor_id: event.actor_id,
            actor_name: event.actor_name.clone(),
            action: event.action,
            entity_type: event.entity_type.clone(),
            entity_id: event.entity_id.clone(),
            ip_address: event.ip_address.clone(),
            user_agent: event.user_agent.clone(),
            changes: serde_json::Value::Object(changes),
            timestamp: event.timestamp,
            recorded_at: Utc::now(),
        }
    }
}

/// Criteria for searching the audit trail. Unset fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditLogFilter {
    /// Only entries by this user.
    pub actor_id: Option<Uuid>,
    /// Only entries with this action.
    pub action: Option<AuditAction>,
    /// Only entries about this record type.
    pub entity_type: Option<String>,
    /// Only entries about this record.
    pub entity_id: Option<String>,
    /// Inclusive lower bound on the event timestamp.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the event timestamp.
    pub to: Option<DateTime<Utc>>,
}

impl AuditLogFilter {
    /// Check an entry against the filter.
    pub fn matches(&self, log: &AuditLog) -> bool {
        self.actor_id.is_none_or(|id| log.actor_id == Some(id))
            && self.action.is_none_or(|action| log.action == action)
            && self
                .entity_type
                .as_deref()
                .is_none_or(|t| log.entity_type == t)
            && self.entity_id.as_deref().is_none_or(|id| log.entity_id == id)
            && self.from.is_none_or(|from| log.timestamp >= from)
            && self.to.is_none_or(|to| log.timestamp <= to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_event_copies_every_field() {
        let actor = Uuid::new_v4();
        let event = AuditEvent::new(AuditAction::Delete, "Patient", "42")
            .with_actor(actor, "admin")
            .with_origin("192.168.1.5", "Mozilla/5.0")
            .with_change("status", "ARCHIVED");

        let log = AuditLog::from_event(&event);

        assert_eq!(log.actor_id, Some(actor));
        assert_eq!(log.actor_name.as_deref(), Some("admin"));
        assert_eq!(log.action, AuditAction::Delete);
        assert_eq!(log.entity_type, "Patient");
        assert_eq!(log.entity_id, "42");
        assert_eq!(log.ip_address.as_deref(), Some("192.168.1.5"));
        assert_eq!(log.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(log.changes["status"], "ARCHIVED");
        assert_eq!(log.timestamp, event.timestamp);
    }

    #[test]
    fn test_filter_matches_on_action_and_range() {
        let event = AuditEvent::new(AuditAction::Export, "LabResult", "9");
        let log = AuditLog::from_event(&event);

        let mut filter = AuditLogFilter {
            action: Some(AuditAction::Export),
            from: Some(event.timestamp - chrono::Duration::minutes(1)),
            ..Default::default()
        };
        assert!(filter.matches(&log));

        filter.to = Some(event.timestamp - chrono::Duration::seconds(1));
        assert!(!filter.matches(&log));
    }
}
