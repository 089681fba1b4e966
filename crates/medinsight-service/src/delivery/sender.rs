//! The channel sender seam.

use std::fmt::Debug;

use async_trait::async_trait;

use medinsight_core::events::NotificationChannel;
use medinsight_core::types::NotificationId;

/// Why a send failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// Retrying cannot help: no address, invalid address, rejected content.
    #[error("permanent send failure: {0}")]
    Permanent(String),
    /// The transport failed; a later attempt may succeed.
    #[error("transient send failure: {0}")]
    Transient(String),
}

impl SendError {
    /// Whether a retry is worthwhile.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// Plain text.
    Text(String),
    /// HTML with a plain text alternative.
    Html {
        /// HTML part.
        html: String,
        /// Plain text part.
        text: String,
    },
}

impl MessageBody {
    /// The plain text rendition.
    pub fn text(&self) -> &str {
        match self {
            Self::Text(text) | Self::Html { text, .. } => text,
        }
    }
}

/// A rendered notification addressed for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// The notification being delivered.
    pub notification_id: NotificationId,
    /// Channel-specific address: email, phone number, or user id.
    pub recipient: String,
    /// Subject line.
    pub subject: String,
    /// Content.
    pub body: MessageBody,
}

/// Delivers messages over one channel.
#[async_trait]
pub trait ChannelSender: Send + Sync + Debug + 'static {
    /// The channel this sender serves.
    fn channel(&self) -> NotificationChannel;

    /// Deliver one message.
    async fn send(&self, message: &OutgoingMessage) -> Result<(), SendError>;
}
