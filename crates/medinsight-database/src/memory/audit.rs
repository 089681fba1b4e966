use async_trait::async_trait;
use chrono::{DateTime, Utc};

use medinsight_core::AppResult;
use medinsight_core::types::{AuditLogId, PageRequest, PageResponse, SecurityAlertId};
use medinsight_entity::audit::{AlertSeverity, AuditLog, AuditLogFilter, SecurityAlert};

use super::MemoryStore;
use crate::store::{AuditLogStore, SecurityAlertStore};

#[async_trait]
impl AuditLogStore for MemoryStore {
    async fn insert(&self, log: &AuditLog) -> AppResult<()> {
        self.audit_logs.write().await.push(log.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: AuditLogId) -> AppResult<Option<AuditLog>> {
        let logs = self.audit_logs.read().await;
        Ok(logs.iter().find(|log| log.id == id).cloned())
    }

    async fn search(
        &self,
        filter: &AuditLogFilter,
        page: &PageRequest,
    ) -> AppResult<PageResponse<AuditLog>> {
        let logs = self.audit_logs.read().await;
        let mut matching: Vec<AuditLog> =
            logs.iter().filter(|log| filter.matches(log)).cloned().collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(PageResponse::from_vec(matching, page))
    }

    async fn count(&self) -> AppResult<u64> {
        Ok(self.audit_logs.read().await.len() as u64)
    }
}

#[async_trait]
impl SecurityAlertStore for MemoryStore {
    async fn insert(&self, alert: &SecurityAlert) -> AppResult<()> {
        self.alerts.insert(alert.id, alert.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: SecurityAlertId) -> AppResult<Option<SecurityAlert>> {
        Ok(self.alerts.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list(
        &self,
        severity: Option<AlertSeverity>,
        resolved: Option<bool>,
    ) -> AppResult<Vec<SecurityAlert>> {
        let mut alerts: Vec<SecurityAlert> = self
            .alerts
            .iter()
            .filter(|entry| severity.is_none_or(|s| entry.severity == s))
            .filter(|entry| resolved.is_none_or(|r| entry.resolved == r))
            .map(|entry| entry.value().clone())
            .collect();
        alerts.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
        Ok(alerts)
    }

    async fn resolve(
        &self,
        id: SecurityAlertId,
        at: DateTime<Utc>,
    ) -> AppResult<Option<SecurityAlert>> {
        Ok(self.alerts.get_mut(&id).map(|mut entry| {
            entry.resolved = true;
            entry.resolved_at.get_or_insert(at);
            entry.value().clone()
        }))
    }

    async fn count_unresolved(&self) -> AppResult<u64> {
        Ok(self.alerts.iter().filter(|entry| !entry.resolved).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use medinsight_core::events::{AuditAction, AuditEvent};
    use medinsight_entity::audit::NewSecurityAlert;

    use super::*;

    #[tokio::test]
    async fn test_search_filters_and_pages() {
        let store = MemoryStore::new();
        for id in 0..5 {
            let event = AuditEvent::new(AuditAction::Read, "Patient", id.to_string());
            AuditLogStore::insert(&store, &AuditLog::from_event(&event)).await.unwrap();
        }
        let delete = AuditEvent::new(AuditAction::Delete, "Patient", "42");
        AuditLogStore::insert(&store, &AuditLog::from_event(&delete)).await.unwrap();

        let filter = AuditLogFilter {
            action: Some(AuditAction::Read),
            ..Default::default()
        };
        let page = store.search(&filter, &PageRequest::new(1, 2)).await.unwrap();
        assert_eq!(page.total_items, 5);
        assert_eq!(page.items.len(), 2);
        assert_eq!(AuditLogStore::count(&store).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_resolve_keeps_first_resolution_time() {
        let store = MemoryStore::new();
        let alert = SecurityAlert::open(NewSecurityAlert {
            severity: AlertSeverity::High,
            alert_type: "BRUTE_FORCE".to_string(),
            description: "20 failed logins".to_string(),
            source_ip: Some("203.0.113.9".to_string()),
            actor_id: None,
        });
        SecurityAlertStore::insert(&store, &alert).await.unwrap();
        assert_eq!(store.count_unresolved().await.unwrap(), 1);

        let first = Utc::now();
        let resolved = store.resolve(alert.id, first).await.unwrap().unwrap();
        assert!(resolved.resolved);
        let again = store
            .resolve(alert.id, first + chrono::Duration::minutes(5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.resolved_at, Some(first));
        assert_eq!(store.count_unresolved().await.unwrap(), 0);

        let open = store.list(None, Some(false)).await.unwrap();
        assert!(open.is_empty());
    }
}
