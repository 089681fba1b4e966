//! Channels without a transport yet.

use async_trait::async_trait;
use tracing::info;

use medinsight_core::events::NotificationChannel;

use super::sender::{ChannelSender, OutgoingMessage, SendError};

/// Logs the message and reports success. Used for PUSH and IN_APP.
#[derive(Debug, Clone, Copy)]
pub struct LogOnlySender {
    channel: NotificationChannel,
}

impl LogOnlySender {
    /// A sender for `channel`.
    pub fn new(channel: NotificationChannel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl ChannelSender for LogOnlySender {
    fn channel(&self) -> NotificationChannel {
        self.channel
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<(), SendError> {
        info!(
            channel = %self.channel,
            notification_id = %message.notification_id,
            recipient = %message.recipient,
            "No transport for channel, treating as sent"
        );
        Ok(())
    }
}
