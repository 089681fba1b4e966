//! Audit log writes, queries, and security alert management.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use medinsight_core::events::{AuditAction, AuditEvent};
use medinsight_core::types::{AuditLogId, PageRequest, PageResponse, SecurityAlertId};
use medinsight_core::{AppError, AppResult};
use medinsight_database::{AuditLogStore, SecurityAlertStore};
use medinsight_entity::audit::{
    AlertSeverity, AuditLog, AuditLogFilter, NewSecurityAlert, SecurityAlert,
};

/// Owns the audit trail and the security alerts raised beside it.
#[derive(Debug, Clone)]
pub struct AuditService {
    /// Audit log store.
    logs: Arc<dyn AuditLogStore>,
    /// Security alert store.
    alerts: Arc<dyn SecurityAlertStore>,
}

impl AuditService {
    /// Creates a new audit service.
    pub fn new(logs: Arc<dyn AuditLogStore>, alerts: Arc<dyn SecurityAlertStore>) -> Self {
        Self { logs, alerts }
    }

    /// Persist a consumed event. The event timestamp is kept as published.
    pub async fn record(&self, event: &AuditEvent) -> AppResult<AuditLog> {
        let log = AuditLog::from_event(event);
        self.logs.insert(&log).await?;
        info!(
            audit_log_id = %log.id,
            action = %log.action,
            entity = %format!("{}/{}", log.entity_type, log.entity_id),
            "Audit log saved"
        );
        Ok(log)
    }

    /// Write an entry directly, stamped with the current time.
    pub async fn log_action(&self, mut event: AuditEvent) -> AppResult<AuditLog> {
        event.validate()?;
        event.timestamp = Utc::now();
        self.record(&event).await
    }

    /// Fetch one entry.
    pub async fn get(&self, id: AuditLogId) -> AppResult<AuditLog> {
        self.logs
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Audit log {id} not found")))
    }

    /// Entries matching `filter`, newest first.
    pub async fn search(
        &self,
        filter: &AuditLogFilter,
        page: &PageRequest,
    ) -> AppResult<PageResponse<AuditLog>> {
        if matches!((filter.from, filter.to), (Some(from), Some(to)) if from > to) {
            return Err(AppError::validation("Range start must not be after its end"));
        }
        self.logs.search(filter, page).await
    }

    /// Entries written by one actor.
    pub async fn by_actor(
        &self,
        actor_id: Uuid,
        page: &PageRequest,
    ) -> AppResult<PageResponse<AuditLog>> {
        let filter = AuditLogFilter {
            actor_id: Some(actor_id),
            ..Default::default()
        };
        self.search(&filter, page).await
    }

    /// Entries with one action.
    pub async fn by_action(
        &self,
        action: AuditAction,
        page: &PageRequest,
    ) -> AppResult<PageResponse<AuditLog>> {
        let filter = AuditLogFilter {
            action: Some(action),
            ..Default::default()
        };
        self.search(&filter, page).await
    }

    /// Entries about one entity type.
    pub async fn by_entity_type(
        &self,
        entity_type: &str,
        page: &PageRequest,
    ) -> AppResult<PageResponse<AuditLog>> {
        let filter = AuditLogFilter {
            entity_type: Some(entity_type.to_string()),
            ..Default::default()
        };
        self.search(&filter, page).await
    }

    /// Entries whose timestamp falls in `[from, to]`.
    pub async fn in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        page: &PageRequest,
    ) -> AppResult<PageResponse<AuditLog>> {
        let filter = AuditLogFilter {
            from: Some(from),
            to: Some(to),
            ..Default::default()
        };
        self.search(&filter, page).await
    }

    /// Total number of entries.
    pub async fn count(&self) -> AppResult<u64> {
        self.logs.count().await
    }

    /// Open a security alert.
    pub async fn raise_alert(&self, new: NewSecurityAlert) -> AppResult<SecurityAlert> {
        let alert = SecurityAlert::open(new);
        self.alerts.insert(&alert).await?;
        warn!(
            alert_id = %alert.id,
            severity = %alert.severity,
            alert_type = %alert.alert_type,
            "Security alert raised: {}",
            alert.description
        );
        Ok(alert)
    }

    /// Alerts filtered by severity and resolved flag.
    pub async fn list_alerts(
        &self,
        severity: Option<AlertSeverity>,
        resolved: Option<bool>,
    ) -> AppResult<Vec<SecurityAlert>> {
        self.alerts.list(severity, resolved).await
    }

    /// Mark an alert resolved.
    pub async fn resolve_alert(&self, id: SecurityAlertId) -> AppResult<SecurityAlert> {
        let alert = self
            .alerts
            .resolve(id, Utc::now())
            .await?
            .ok_or_else(|| AppError::not_found(format!("Security alert {id} not found")))?;
        info!(alert_id = %id, "Security alert resolved");
        Ok(alert)
    }

    /// Number of open alerts.
    pub async fn unresolved_alerts(&self) -> AppResult<u64> {
        self.alerts.count_unresolved().await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use medinsight_core::error::ErrorKind;
    use medinsight_database::Stores;

    use super::*;

    fn service() -> AuditService {
        let stores = Stores::memory();
        AuditService::new(stores.audit_logs, stores.alerts)
    }

    #[tokio::test]
    async fn test_record_keeps_event_timestamp() {
        let service = service();
        let published = Utc::now() - Duration::hours(3);
        let mut event = AuditEvent::new(AuditAction::Delete, "Patient", "42");
        event.timestamp = published;

        let log = service.record(&event).await.unwrap();
        assert_eq!(log.timestamp, published);
        assert_eq!(service.get(log.id).await.unwrap().entity_id, "42");
    }

    #[tokio::test]
    async fn test_log_action_stamps_now() {
        let service = service();
        let mut event = AuditEvent::new(AuditAction::Export, "Report", "r-1");
        event.timestamp = Utc::now() - Duration::days(1);

        let before = Utc::now();
        let log = service.log_action(event).await.unwrap();
        assert!(log.timestamp >= before);
    }

    #[tokio::test]
    async fn test_log_action_rejects_invalid_event() {
        let err = service()
            .log_action(AuditEvent::new(AuditAction::Read, "", "1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_queries() {
        let service = service();
        let actor = Uuid::new_v4();
        service
            .log_action(AuditEvent::new(AuditAction::Login, "Session", "s-1").with_actor(actor, "dr.house"))
            .await
            .unwrap();
        service
            .log_action(AuditEvent::new(AuditAction::Update, "Patient", "7"))
            .await
            .unwrap();

        let page = PageRequest::default();
        assert_eq!(service.by_actor(actor, &page).await.unwrap().items.len(), 1);
        assert_eq!(
            service.by_action(AuditAction::Update, &page).await.unwrap().items[0].entity_id,
            "7"
        );
        assert_eq!(service.by_entity_type("Session", &page).await.unwrap().total_items, 1);
        let now = Utc::now();
        assert_eq!(
            service
                .in_range(now - Duration::minutes(1), now + Duration::minutes(1), &page)
                .await
                .unwrap()
                .total_items,
            2
        );
        assert!(service.in_range(now, now - Duration::minutes(1), &page).await.is_err());
    }

    #[tokio::test]
    async fn test_alert_lifecycle() {
        let service = service();
        let alert = service
            .raise_alert(NewSecurityAlert {
                severity: AlertSeverity::High,
                alert_type: "BRUTE_FORCE".into(),
                description: "Ten failed logins".into(),
                source_ip: Some("203.0.113.9".into()),
                actor_id: None,
            })
            .await
            .unwrap();
        assert_eq!(service.unresolved_alerts().await.unwrap(), 1);

        let resolved = service.resolve_alert(alert.id).await.unwrap();
        assert!(resolved.resolved);
        assert_eq!(service.unresolved_alerts().await.unwrap(), 0);
        assert_eq!(
            service.list_alerts(None, Some(true)).await.unwrap().len(),
            1
        );

        let missing = service.resolve_alert(SecurityAlertId::new()).await.unwrap_err();
        assert_eq!(missing.kind, ErrorKind::NotFound);
    }
}
