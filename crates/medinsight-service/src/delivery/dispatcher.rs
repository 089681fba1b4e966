//! Routes a notification to the sender of its channel.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use validator::ValidateEmail;

use medinsight_core::config::{MailConfig, NotificationConfig};
use medinsight_core::events::{NotificationChannel, NotificationType};
use medinsight_entity::notification::Notification;

use super::email::EmailSender;
use super::noop::LogOnlySender;
use super::sender::{ChannelSender, MessageBody, OutgoingMessage, SendError};
use super::sms::SmsSender;
use crate::notification::templates;

/// Renders notifications and hands them to channel senders.
#[derive(Debug, Clone)]
pub struct DeliveryDispatcher {
    senders: HashMap<NotificationChannel, Arc<dyn ChannelSender>>,
    portal_url: String,
    fallback_email: Option<String>,
}

impl DeliveryDispatcher {
    /// A dispatcher with no senders registered.
    pub fn new(config: &NotificationConfig) -> Self {
        Self {
            senders: HashMap::new(),
            portal_url: config.portal_url.clone(),
            fallback_email: config.fallback_email.clone(),
        }
    }

    /// A dispatcher with the standard sender for every channel.
    pub fn from_config(notification: &NotificationConfig, mail: &MailConfig) -> Self {
        Self::new(notification)
            .with_sender(Arc::new(EmailSender::new(mail.clone())))
            .with_sender(Arc::new(SmsSender::new()))
            .with_sender(Arc::new(LogOnlySender::new(NotificationChannel::Push)))
            .with_sender(Arc::new(LogOnlySender::new(NotificationChannel::InApp)))
    }

    /// Register `sender` for its channel, replacing any previous one.
    pub fn with_sender(mut self, sender: Arc<dyn ChannelSender>) -> Self {
        self.senders.insert(sender.channel(), sender);
        self
    }

    /// Address and render `notification` for its channel.
    pub fn render(&self, notification: &Notification) -> Result<OutgoingMessage, SendError> {
        let recipient = self.recipient(notification)?;
        let body = match (notification.channel, notification.notification_type) {
            (NotificationChannel::Email, NotificationType::PatientWelcome) => MessageBody::Html {
                html: templates::welcome_email_html(
                    &templates::greeting_name(notification.recipient_email.as_deref()),
                    &notification.message,
                    &self.portal_url,
                ),
                text: notification.message.clone(),
            },
            _ => MessageBody::Text(notification.message.clone()),
        };
        Ok(OutgoingMessage {
            notification_id: notification.id,
            recipient,
            subject: notification.subject.clone(),
            body,
        })
    }

    /// Render and send `notification`.
    pub async fn deliver(&self, notification: &Notification) -> Result<(), SendError> {
        let sender = self.senders.get(&notification.channel).ok_or_else(|| {
            SendError::Permanent(format!("No sender for channel {}", notification.channel))
        })?;
        let message = self.render(notification)?;
        debug!(
            notification_id = %notification.id,
            channel = %notification.channel,
            "Dispatching notification"
        );
        sender.send(&message).await
    }

    fn recipient(&self, notification: &Notification) -> Result<String, SendError> {
        match notification.channel {
            NotificationChannel::Email => {
                let email = notification
                    .recipient_email
                    .as_deref()
                    .or(self.fallback_email.as_deref())
                    .ok_or_else(|| {
                        SendError::Permanent(format!(
                            "Notification {} has no recipient email",
                            notification.id
                        ))
                    })?;
                if !email.validate_email() {
                    return Err(SendError::Permanent(format!(
                        "Invalid recipient email '{email}'"
                    )));
                }
                Ok(email.to_string())
            }
            NotificationChannel::Sms => notification.recipient_phone.clone().ok_or_else(|| {
                SendError::Permanent(format!(
                    "Notification {} has no recipient phone",
                    notification.id
                ))
            }),
            NotificationChannel::Push | NotificationChannel::InApp => {
                Ok(notification.recipient_id.to_string())
            }
        }
    }
}
