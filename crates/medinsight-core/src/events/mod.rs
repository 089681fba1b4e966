//! Event wire types carried on the broker topics.
//!
//! Events are JSON objects with camelCase field names. Enum values travel
//! as SCREAMING_SNAKE_CASE strings, so an unknown action, channel, or
//! notification type fails deserialization and is treated as malformed.

pub mod audit;
pub mod notification;

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use validator::Validate;

pub use audit::{AuditAction, AuditEvent};
pub use notification::{NotificationChannel, NotificationEvent, NotificationType};

use crate::error::AppError;

/// Logical event kinds. Each kind is bound to one main topic and one
/// dead-letter topic through [`TopicsConfig`](crate::config::TopicsConfig).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Audit trail events.
    Audit,
    /// User notification events.
    Notification,
}

impl EventKind {
    /// Every event kind.
    pub const ALL: [EventKind; 2] = [EventKind::Audit, EventKind::Notification];

    /// Return the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audit => "audit",
            Self::Notification => "notification",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An event that can travel through the pipeline.
pub trait PipelineEvent: Serialize + DeserializeOwned + Validate + Send + Sync {
    /// The kind that selects the event's topics.
    const KIND: EventKind;

    /// Key used for partition assignment. Records with the same key land on
    /// the same partition and are consumed in publish order.
    fn partition_key(&self) -> Option<String>;

    /// Encode for the wire.
    fn to_payload(&self) -> Result<Vec<u8>, AppError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode and validate a wire payload.
    fn from_payload(payload: &[u8]) -> Result<Self, AppError> {
        let event: Self = serde_json::from_slice(payload)?;
        event.validate()?;
        Ok(event)
    }
}
