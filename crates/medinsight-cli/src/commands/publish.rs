//! Publish audit and notification events.

use clap::{Args, Subcommand};
use uuid::Uuid;
use validator::Validate;

use crate::output;
use medinsight_core::config::BrokerProvider;
use medinsight_core::error::AppError;
use medinsight_core::events::{
    AuditAction, AuditEvent, NotificationChannel, NotificationEvent, NotificationType,
    PipelineEvent,
};
use medinsight_runtime::Application;

/// Arguments for publish commands
#[derive(Debug, Args)]
pub struct PublishArgs {
    /// Publish subcommand
    #[command(subcommand)]
    pub command: PublishCommand,
}

/// Publish subcommands
#[derive(Debug, Subcommand)]
pub enum PublishCommand {
    /// Publish an audit event
    Audit {
        /// Action performed (CREATE, READ, UPDATE, DELETE, LOGIN, ...)
        #[arg(short, long)]
        action: AuditAction,
        /// Record type, e.g. Patient
        #[arg(long)]
        entity_type: String,
        /// Record identifier
        #[arg(long)]
        entity_id: String,
        /// Acting user ID
        #[arg(long)]
        actor_id: Option<Uuid>,
        /// Acting user name
        #[arg(long, requires = "actor_id")]
        actor_name: Option<String>,
        /// Client IP address
        #[arg(long)]
        ip: Option<String>,
        /// Client user agent
        #[arg(long)]
        user_agent: Option<String>,
        /// Changed field as `name=value`; repeatable
        #[arg(long = "change", value_parser = parse_change)]
        changes: Vec<(String, String)>,
    },
    /// Publish a notification event
    Notification {
        /// Recipient user ID
        #[arg(short, long)]
        recipient: Uuid,
        /// Notification type, e.g. PATIENT_WELCOME
        #[arg(short = 't', long = "type")]
        notification_type: NotificationType,
        /// Delivery channel (EMAIL, SMS, PUSH, IN_APP)
        #[arg(short, long)]
        channel: NotificationChannel,
        /// Subject line
        #[arg(short, long)]
        subject: String,
        /// Body text
        #[arg(short, long)]
        message: String,
        /// Recipient email address
        #[arg(long)]
        email: Option<String>,
        /// Recipient phone number
        #[arg(long)]
        phone: Option<String>,
    },
}

fn parse_change(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected name=value, got '{s}'"))
}

/// Execute publish commands
pub async fn execute(args: &PublishArgs, config_path: Option<&str>) -> Result<(), AppError> {
    let app = super::open_app(config_path).await?;
    if app.config().broker.provider == BrokerProvider::Memory {
        output::print_warning(
            "broker.provider is \"memory\"; the event only reaches consumers in this process.",
        );
    }

    match &args.command {
        PublishCommand::Audit {
            action,
            entity_type,
            entity_id,
            actor_id,
            actor_name,
            ip,
            user_agent,
            changes,
        } => {
            let mut event = AuditEvent::new(*action, entity_type, entity_id);
            event.actor_id = *actor_id;
            event.actor_name = actor_name.clone();
            event.ip_address = ip.clone();
            event.user_agent = user_agent.clone();
            for (field, value) in changes {
                event = event.with_change(field, value.as_str());
            }
            send(&app, &event).await?;
        }
        PublishCommand::Notification {
            recipient,
            notification_type,
            channel,
            subject,
            message,
            email,
            phone,
        } => {
            let mut event = NotificationEvent::new(
                *recipient,
                *notification_type,
                *channel,
                subject,
                message,
            );
            event.recipient_email = email.clone();
            event.recipient_phone = phone.clone();
            send(&app, &event).await?;
        }
    }

    app.close().await;
    Ok(())
}

async fn send<E: PipelineEvent>(app: &Application, event: &E) -> Result<(), AppError> {
    event.validate()?;
    let topic = app.topics().topic_for(E::KIND).to_string();
    app.publisher().try_publish_to(event, &topic).await?;
    output::print_success(&format!("Published {} event to '{}'", E::KIND, topic));
    Ok(())
}
