//! Notification status machine.
//!
//! ```text
//! PENDING ──> SENT ──> DELIVERED
//!    │
//!    └──────> FAILED
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Delivery status of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    /// Stored, not yet sent.
    Pending,
    /// Handed to the channel.
    Sent,
    /// The channel confirmed receipt.
    Delivered,
    /// The send failed.
    Failed,
}

impl NotificationStatus {
    /// Whether `self -> next` is a legal edge.
    pub fn can_transition_to(&self, next: NotificationStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Sent) | (Self::Pending, Self::Failed) | (Self::Sent, Self::Delivered)
        )
    }

    /// Whether no further edge leaves this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }

    /// Return the wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Sent => "SENT",
            Self::Delivered => "DELIVERED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for NotificationStatus {
    type Err = medinsight_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "SENT" => Ok(Self::Sent),
            "DELIVERED" => Ok(Self::Delivered),
            "FAILED" => Ok(Self::Failed),
            other => Err(medinsight_core::AppError::validation(format!(
                "Unknown notification status: {other}"
            ))),
        }
    }
}
