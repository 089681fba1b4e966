//! SMS channel. No provider is wired in; messages are logged.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::info;

use medinsight_core::events::NotificationChannel;

use super::sender::{ChannelSender, OutgoingMessage, SendError};

static PHONE_NUMBER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9]\d{1,14}$").ok());

/// Whether `phone` looks like an E.164 number.
pub fn is_valid_phone_number(phone: &str) -> bool {
    PHONE_NUMBER
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(phone))
}

/// Mock SMS sender.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmsSender;

impl SmsSender {
    /// Create the sender.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChannelSender for SmsSender {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Sms
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<(), SendError> {
        if !is_valid_phone_number(&message.recipient) {
            return Err(SendError::Permanent(format!(
                "Invalid phone number '{}'",
                message.recipient
            )));
        }
        info!(
            notification_id = %message.notification_id,
            to = %message.recipient,
            body = %message.body.text(),
            "SMS sent (mock)"
        );
        Ok(())
    }
}
