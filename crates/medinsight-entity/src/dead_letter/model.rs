//! Poison message entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use medinsight_core::types::PoisonMessageId;

/// A broker record that failed processing and could not be republished to
/// its dead-letter topic. Kept verbatim so an operator can replay it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PoisonMessage {
    /// Unique identifier.
    pub id: PoisonMessageId,
    /// Topic the record was consumed from.
    pub source_topic: String,
    /// Partition the record was consumed from.
    pub source_partition: i32,
    /// Offset of the record.
    pub source_offset: i64,
    /// Record key.
    pub message_key: Option<String>,
    /// Record value, unmodified.
    pub payload: Vec<u8>,
    /// Processing error, then the dead-letter send error.
    pub error: String,
    /// Dead-letter sends attempted.
    pub attempts: i32,
    /// When the record was quarantined.
    pub quarantined_at: DateTime<Utc>,
    /// When an operator last replayed the record.
    pub replayed_at: Option<DateTime<Utc>>,
}

impl PoisonMessage {
    /// Payload as text for display. Invalid UTF-8 is replaced.
    pub fn payload_lossy(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}
