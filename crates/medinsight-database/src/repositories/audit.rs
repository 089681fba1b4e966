//! Audit log repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;

use medinsight_core::error::{AppError, ErrorKind};
use medinsight_core::result::AppResult;
use medinsight_core::types::{AuditLogId, PageRequest, PageResponse};
use medinsight_entity::audit::{AuditLog, AuditLogFilter};

use crate::store::AuditLogStore;

/// Repository for audit log entries.
#[derive(Debug, Clone)]
pub struct AuditLogRepository {
    pool: PgPool,
}

impl AuditLogRepository {
    /// Create a new audit log repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLogStore for AuditLogRepository {
    async fn insert(&self, log: &AuditLog) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO audit_logs (id, actor_id, actor_name, action, entity_type, entity_id, \
             ip_address, user_agent, changes, timestamp, recorded_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(log.id)
        .bind(log.actor_id)
        .bind(&log.actor_name)
        .bind(log.action)
        .bind(&log.entity_type)
        .bind(&log.entity_id)
        .bind(&log.ip_address)
        .bind(&log.user_agent)
        .bind(&log.changes)
        .bind(log.timestamp)
        .bind(log.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to insert audit log", e))?;
        Ok(())
    }

    async fn find_by_id(&self, id: AuditLogId) -> AppResult<Option<AuditLog>> {
        sqlx::query_as::<_, AuditLog>("SELECT * FROM audit_logs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find audit log", e))
    }

    async fn search(
        &self,
        filter: &AuditLogFilter,
        page: &PageRequest,
    ) -> AppResult<PageResponse<AuditLog>> {
        let mut conditions = Vec::new();
        let mut param_idx = 1u32;

        let mut push = |column: &str, op: &str| {
            conditions.push(format!("{column} {op} ${param_idx}"));
            param_idx += 1;
        };
        if filter.actor_id.is_some() {
            push("actor_id", "=");
        }
        if filter.action.is_some() {
            push("action", "=");
        }
        if filter.entity_type.is_some() {
            push("entity_type", "=");
        }
        if filter.entity_id.is_some() {
            push("entity_id", "=");
        }
        if filter.from.is_some() {
            push("timestamp", ">=");
        }
        if filter.to.is_some() {
            push("timestamp", "<=");
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM audit_logs {where_clause}");
        let select_sql = format!(
            "SELECT * FROM audit_logs {where_clause} ORDER BY timestamp DESC LIMIT ${param_idx} OFFSET ${}",
            param_idx + 1
        );

        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        let mut select_query = sqlx::query_as::<_, AuditLog>(&select_sql);

        if let Some(actor_id) = filter.actor_id {
            count_query = count_query.bind(actor_id);
            select_query = select_query.bind(actor_id);
        }
        if let Some(action) = filter.action {
            count_query = count_query.bind(action);
            select_query = select_query.bind(action);
        }
        if let Some(entity_type) = filter.entity_type.as_deref() {
            count_query = count_query.bind(entity_type);
            select_query = select_query.bind(entity_type);
        }
        if let Some(entity_id) = filter.entity_id.as_deref() {
            count_query = count_query.bind(entity_id);
            select_query = select_query.bind(entity_id);
        }
        if let Some(from) = filter.from {
            count_query = count_query.bind(from);
            select_query = select_query.bind(from);
        }
        if let Some(to) = filter.to {
            count_query = count_query.bind(to);
            select_query = select_query.bind(to);
        }

        let total = count_query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count audit logs", e))?;

        let items = select_query
            .bind(page.limit() as i64)
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to search audit logs", e))?;

        Ok(PageResponse::new(items, page, total as u64))
    }

    async fn count(&self) -> AppResult<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_logs")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count audit logs", e))?;
        Ok(total as u64)
    }
}
