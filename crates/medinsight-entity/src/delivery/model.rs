//! Delivery task entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use medinsight_core::events::NotificationChannel;
use medinsight_core::types::{DeliveryTaskId, NotificationId};

use super::status::DeliveryStatus;

/// Task kind that sends one notification over its channel.
pub const NOTIFICATION_DELIVERY: &str = "notification_delivery";

/// A unit of outbound delivery work, written next to the notification it
/// sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DeliveryTask {
    /// Unique task identifier.
    pub id: DeliveryTaskId,
    /// Handler selector.
    pub task_kind: String,
    /// The notification to send.
    pub notification_id: NotificationId,
    /// Channel of that notification.
    pub channel: NotificationChannel,
    /// Current status.
    pub status: DeliveryStatus,
    /// Executions started so far.
    pub attempts: i32,
    /// Executions allowed before giving up.
    pub max_attempts: i32,
    /// Not claimed before this time.
    pub run_after: DateTime<Utc>,
    /// Error of the last failed execution.
    pub last_error: Option<String>,
    /// Worker holding the task while running.
    pub worker_id: Option<String>,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
    /// When the task was last changed.
    pub updated_at: DateTime<Utc>,
}

impl DeliveryTask {
    /// Create a pending task that becomes due at `run_after`.
    pub fn for_notification(
        notification_id: NotificationId,
        channel: NotificationChannel,
        max_attempts: i32,
        run_after: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: DeliveryTaskId::new(),
            task_kind: NOTIFICATION_DELIVERY.to_string(),
            notification_id,
            channel,
            status: DeliveryStatus::Pending,
            attempts: 0,
            max_attempts,
            run_after,
            last_error: None,
            worker_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether another execution is allowed after the current one.
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_is_pending_with_no_attempts() {
        let task = DeliveryTask::for_notification(
            NotificationId::new(),
            NotificationChannel::Sms,
            3,
            Utc::now(),
        );
        assert_eq!(task.status, DeliveryStatus::Pending);
        assert_eq!(task.attempts, 0);
        assert_eq!(task.task_kind, NOTIFICATION_DELIVERY);
        assert!(task.can_retry());
    }

    #[test]
    fn test_retry_budget() {
        let mut task = DeliveryTask::for_notification(
            NotificationId::new(),
            NotificationChannel::Email,
            2,
            Utc::now(),
        );
        task.attempts = 2;
        assert!(!task.can_retry());
    }
}
