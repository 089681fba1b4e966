//! Notification entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use medinsight_core::events::{NotificationChannel, NotificationEvent, NotificationType};
use medinsight_core::types::NotificationId;
use medinsight_core::{AppError, AppResult};

use super::status::NotificationStatus;

/// A notification addressed to one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Notification {
    /// Unique notification identifier.
    pub id: NotificationId,
    /// The user to notify.
    pub recipient_id: Uuid,
    /// Email address for the EMAIL channel.
    pub recipient_email: Option<String>,
    /// Phone number for the SMS channel.
    pub recipient_phone: Option<String>,
    /// What the notification is about.
    pub notification_type: NotificationType,
    /// Delivery transport.
    pub channel: NotificationChannel,
    /// Subject line.
    pub subject: String,
    /// Body text.
    pub message: String,
    /// Delivery status.
    pub status: NotificationStatus,
    /// Earliest send time.
    pub scheduled_at: DateTime<Utc>,
    /// When the channel accepted the message.
    pub sent_at: Option<DateTime<Utc>>,
    /// Why the last send failed.
    pub failure_reason: Option<String>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last changed.
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    /// Build a PENDING record from an event. A missing schedule means now.
    pub fn pending_from_event(event: &NotificationEvent) -> Self {
        let now = Utc::now();
        Self {
            id: NotificationId::new(),
            recipient_id: event.recipient_id,
            recipient_email: event.recipient_email.clone(),
            recipient_phone: event.recipient_phone.clone(),
            notification_type: event.notification_type,
            channel: event.channel,
            subject: event.subject.clone(),
            message: event.message.clone(),
            status: NotificationStatus::Pending,
            scheduled_at: event.scheduled_at.unwrap_or(now),
            sent_at: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `next`, rejecting edges the status machine does not allow.
    ///
    /// Entering SENT stamps `sent_at`. Entering FAILED records `reason`.
    pub fn transition(&mut self, next: NotificationStatus, reason: Option<String>) -> AppResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::conflict(format!(
                "Notification {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        let now = Utc::now();
        if next == NotificationStatus::Sent {
            self.sent_at = Some(now);
        }
        if next == NotificationStatus::Failed {
            self.failure_reason = reason;
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}
