//! Email channel over SMTP.

use std::time::Duration;

use async_trait::async_trait;
use mail_builder::MessageBuilder;
use mail_send::SmtpClientBuilder;
use tracing::{debug, info};

use medinsight_core::config::MailConfig;
use medinsight_core::events::NotificationChannel;

use super::sender::{ChannelSender, MessageBody, OutgoingMessage, SendError};

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends email through the configured SMTP relay.
///
/// With `mail.enabled = false` messages are logged and reported sent.
#[derive(Debug, Clone)]
pub struct EmailSender {
    config: MailConfig,
}

impl EmailSender {
    /// Create a sender from mail settings.
    pub fn new(config: MailConfig) -> Self {
        if !config.enabled {
            info!("Email delivery disabled by configuration");
        }
        Self { config }
    }

    fn build<'x>(&'x self, message: &'x OutgoingMessage) -> MessageBuilder<'x> {
        let builder = MessageBuilder::new()
            .from((self.config.from_name.as_str(), self.config.from_email.as_str()))
            .to(message.recipient.as_str())
            .subject(message.subject.as_str());
        match &message.body {
            MessageBody::Text(text) => builder.text_body(text.as_str()),
            MessageBody::Html { html, text } => {
                builder.html_body(html.as_str()).text_body(text.as_str())
            }
        }
    }
}

#[async_trait]
impl ChannelSender for EmailSender {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Email
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<(), SendError> {
        if !self.config.enabled {
            debug!(
                notification_id = %message.notification_id,
                to = %message.recipient,
                "Email disabled, skipping send"
            );
            return Ok(());
        }

        let mut smtp = SmtpClientBuilder::new(self.config.smtp_host.as_str(), self.config.smtp_port)
            .implicit_tls(self.config.implicit_tls)
            .timeout(SMTP_TIMEOUT);
        if let (Some(user), Some(pass)) = (&self.config.username, &self.config.password) {
            smtp = smtp.credentials((user.as_str(), pass.as_str()));
        }

        let mut client = smtp
            .connect()
            .await
            .map_err(|e| SendError::Transient(format!("SMTP connection failed: {e}")))?;
        client
            .send(self.build(message))
            .await
            .map_err(|e| SendError::Transient(format!("Failed to send email: {e}")))?;

        info!(
            notification_id = %message.notification_id,
            to = %message.recipient,
            "Email sent"
        );
        Ok(())
    }
}
