//! Store traits for every persisted record.
//!
//! Each trait has a PostgreSQL implementation in
//! [`repositories`](crate::repositories) and an in-memory implementation in
//! [`memory`](crate::memory).

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use medinsight_core::AppResult;
use medinsight_core::types::{
    AuditLogId, DeliveryTaskId, NotificationId, PageRequest, PageResponse, PoisonMessageId,
    SecurityAlertId,
};
use medinsight_entity::audit::{AlertSeverity, AuditLog, AuditLogFilter, SecurityAlert};
use medinsight_entity::dead_letter::PoisonMessage;
use medinsight_entity::delivery::{DeliveryStatus, DeliveryTask};
use medinsight_entity::notification::{Notification, NotificationStatus};

/// Append-only audit trail.
#[async_trait]
pub trait AuditLogStore: Send + Sync + Debug + 'static {
    /// Append one entry.
    async fn insert(&self, log: &AuditLog) -> AppResult<()>;

    /// Find an entry by ID.
    async fn find_by_id(&self, id: AuditLogId) -> AppResult<Option<AuditLog>>;

    /// Entries matching `filter`, newest first.
    async fn search(
        &self,
        filter: &AuditLogFilter,
        page: &PageRequest,
    ) -> AppResult<PageResponse<AuditLog>>;

    /// Total number of entries.
    async fn count(&self) -> AppResult<u64>;
}

/// Security alerts raised for operators.
#[async_trait]
pub trait SecurityAlertStore: Send + Sync + Debug + 'static {
    /// Store a new alert.
    async fn insert(&self, alert: &SecurityAlert) -> AppResult<()>;

    /// Find an alert by ID.
    async fn find_by_id(&self, id: SecurityAlertId) -> AppResult<Option<SecurityAlert>>;

    /// Alerts filtered by severity and resolved flag, newest first.
    async fn list(
        &self,
        severity: Option<AlertSeverity>,
        resolved: Option<bool>,
    ) -> AppResult<Vec<SecurityAlert>>;

    /// Mark an alert resolved. Returns `None` when no such alert exists.
    async fn resolve(
        &self,
        id: SecurityAlertId,
        at: DateTime<Utc>,
    ) -> AppResult<Option<SecurityAlert>>;

    /// Number of open alerts.
    async fn count_unresolved(&self) -> AppResult<u64>;
}

/// Notification records.
#[async_trait]
pub trait NotificationStore: Send + Sync + Debug + 'static {
    /// Store a new notification.
    async fn insert(&self, notification: &Notification) -> AppResult<()>;

    /// Store a new notification together with the task that delivers it.
    /// Either both are stored or neither is.
    async fn insert_with_task(
        &self,
        notification: &Notification,
        task: &DeliveryTask,
    ) -> AppResult<()>;

    /// Find a notification by ID.
    async fn find_by_id(&self, id: NotificationId) -> AppResult<Option<Notification>>;

    /// Notifications for one recipient, newest first, optionally by status.
    async fn list_by_recipient(
        &self,
        recipient_id: Uuid,
        status: Option<NotificationStatus>,
    ) -> AppResult<Vec<Notification>>;

    /// Notifications in `status`, oldest schedule first.
    async fn list_by_status(&self, status: NotificationStatus) -> AppResult<Vec<Notification>>;

    /// Write the status fields of `notification` if the stored status is
    /// still `expected`. Returns `false` when another writer moved it first.
    async fn update_status(
        &self,
        notification: &Notification,
        expected: NotificationStatus,
    ) -> AppResult<bool>;
}

/// Outbox delivery tasks.
#[async_trait]
pub trait DeliveryTaskStore: Send + Sync + Debug + 'static {
    /// Store a new task.
    async fn enqueue(&self, task: &DeliveryTask) -> AppResult<()>;

    /// Claim the earliest due pending task for `worker_id`. The claim sets
    /// the task running and counts one attempt.
    async fn claim_next(
        &self,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<DeliveryTask>>;

    /// Find a task by ID.
    async fn find_by_id(&self, id: DeliveryTaskId) -> AppResult<Option<DeliveryTask>>;

    /// Mark a task completed.
    async fn complete(&self, id: DeliveryTaskId) -> AppResult<()>;

    /// Return a task to pending, due at `run_after`.
    async fn reschedule(
        &self,
        id: DeliveryTaskId,
        run_after: DateTime<Utc>,
        error: &str,
    ) -> AppResult<()>;

    /// Mark a task failed for good.
    async fn fail(&self, id: DeliveryTaskId, error: &str) -> AppResult<()>;

    /// Number of tasks in `status`.
    async fn count_by_status(&self, status: DeliveryStatus) -> AppResult<u64>;

    /// Return running tasks not touched since `before` to pending.
    async fn requeue_stale(&self, before: DateTime<Utc>) -> AppResult<u64>;

    /// Delete completed and failed tasks last touched before `before`.
    async fn purge_finished(&self, before: DateTime<Utc>) -> AppResult<u64>;
}

/// Quarantined broker records.
#[async_trait]
pub trait PoisonMessageStore: Send + Sync + Debug + 'static {
    /// Store a quarantined record.
    async fn insert(&self, message: &PoisonMessage) -> AppResult<()>;

    /// Find a record by ID.
    async fn find_by_id(&self, id: PoisonMessageId) -> AppResult<Option<PoisonMessage>>;

    /// Records newest first.
    async fn list(&self, page: &PageRequest) -> AppResult<PageResponse<PoisonMessage>>;

    /// Total number of records.
    async fn count(&self) -> AppResult<u64>;

    /// Stamp a record as replayed unless it already is. Returns `false` when
    /// another replay got there first.
    async fn mark_replayed(&self, id: PoisonMessageId, at: DateTime<Utc>) -> AppResult<bool>;

    /// Drop the replay stamp of a record whose republish failed.
    async fn clear_replayed(&self, id: PoisonMessageId) -> AppResult<()>;
}
