//! Security alert repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use medinsight_core::error::{AppError, ErrorKind};
use medinsight_core::result::AppResult;
use medinsight_core::types::SecurityAlertId;
use medinsight_entity::audit::{AlertSeverity, SecurityAlert};

use crate::store::SecurityAlertStore;

/// Repository for security alerts.
#[derive(Debug, Clone)]
pub struct SecurityAlertRepository {
    pool: PgPool,
}

impl SecurityAlertRepository {
    /// Create a new security alert repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SecurityAlertStore for SecurityAlertRepository {
    async fn insert(&self, alert: &SecurityAlert) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO security_alerts (id, severity, alert_type, description, source_ip, \
             actor_id, resolved, detected_at, resolved_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(alert.id)
        .bind(alert.severity)
        .bind(&alert.alert_type)
        .bind(&alert.description)
        .bind(&alert.source_ip)
        .bind(alert.actor_id)
        .bind(alert.resolved)
        .bind(alert.detected_at)
        .bind(alert.resolved_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to insert security alert", e))?;
        Ok(())
    }

    async fn find_by_id(&self, id: SecurityAlertId) -> AppResult<Option<SecurityAlert>> {
        sqlx::query_as::<_, SecurityAlert>("SELECT * FROM security_alerts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find security alert", e))
    }

    async fn list(
        &self,
        severity: Option<AlertSeverity>,
        resolved: Option<bool>,
    ) -> AppResult<Vec<SecurityAlert>> {
        sqlx::query_as::<_, SecurityAlert>(
            "SELECT * FROM security_alerts \
             WHERE ($1::alert_severity IS NULL OR severity = $1) \
             AND ($2::boolean IS NULL OR resolved = $2) \
             ORDER BY detected_at DESC",
        )
        .bind(severity)
        .bind(resolved)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list security alerts", e))
    }

    async fn resolve(
        &self,
        id: SecurityAlertId,
        at: DateTime<Utc>,
    ) -> AppResult<Option<SecurityAlert>> {
        sqlx::query_as::<_, SecurityAlert>(
            "UPDATE security_alerts SET resolved = TRUE, resolved_at = COALESCE(resolved_at, $2) \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to resolve security alert", e))
    }

    async fn count_unresolved(&self) -> AppResult<u64> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM security_alerts WHERE resolved = FALSE")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to count security alerts", e)
                })?;
        Ok(total as u64)
    }
}
