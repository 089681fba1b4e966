//! Notification record CLI commands.

use clap::{Args, Subcommand, ValueEnum};
use serde::Serialize;
use tabled::Tabled;
use uuid::Uuid;

use crate::output::{self, OutputFormat};
use medinsight_core::error::AppError;
use medinsight_core::types::NotificationId;
use medinsight_entity::notification::{Notification, NotificationStatus};

/// Arguments for notification commands
#[derive(Debug, Args)]
pub struct NotificationArgs {
    /// Notification subcommand
    #[command(subcommand)]
    pub command: NotificationCommand,
}

/// Status an operator may set by hand
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MarkStatus {
    /// PENDING -> SENT
    Sent,
    /// SENT -> DELIVERED
    Delivered,
    /// PENDING -> FAILED
    Failed,
}

/// Notification subcommands
#[derive(Debug, Subcommand)]
pub enum NotificationCommand {
    /// List a recipient's notifications
    List {
        /// Recipient user ID
        recipient: Uuid,
        /// Only this status
        #[arg(short, long)]
        status: Option<NotificationStatus>,
    },
    /// List notifications waiting to be sent
    Pending,
    /// Move a notification to a new status
    Mark {
        /// Notification ID
        id: NotificationId,
        /// Target status
        #[arg(value_enum)]
        status: MarkStatus,
        /// Failure reason, for `failed`
        #[arg(short, long, default_value = "Marked failed by operator")]
        reason: String,
    },
}

/// Notification display row
#[derive(Debug, Serialize, Tabled)]
struct NotificationRow {
    /// ID
    id: String,
    /// Recipient
    recipient: String,
    /// Type
    kind: String,
    /// Channel
    channel: String,
    /// Status
    status: String,
    /// Scheduled
    scheduled: String,
    /// Subject
    subject: String,
}

impl From<&Notification> for NotificationRow {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id.to_string(),
            recipient: n.recipient_id.to_string(),
            kind: n.notification_type.to_string(),
            channel: n.channel.to_string(),
            status: n.status.to_string(),
            scheduled: output::short_time(&n.scheduled_at),
            subject: n.subject.clone(),
        }
    }
}

/// Execute notification commands
pub async fn execute(
    args: &NotificationArgs,
    config_path: Option<&str>,
    format: OutputFormat,
) -> Result<(), AppError> {
    let app = super::open_app(config_path).await?;
    let notifications = app.notifications();

    match &args.command {
        NotificationCommand::List { recipient, status } => {
            let items = match status {
                Some(status) => {
                    notifications
                        .list_for_recipient_with_status(*recipient, *status)
                        .await?
                }
                None => notifications.list_for_recipient(*recipient).await?,
            };
            let rows: Vec<NotificationRow> = items.iter().map(NotificationRow::from).collect();
            output::print_list(&rows, format);
        }
        NotificationCommand::Pending => {
            let items = notifications.list_pending().await?;
            let rows: Vec<NotificationRow> = items.iter().map(NotificationRow::from).collect();
            output::print_list(&rows, format);
        }
        NotificationCommand::Mark { id, status, reason } => {
            let updated = match status {
                MarkStatus::Sent => notifications.mark_sent(*id).await?,
                MarkStatus::Delivered => notifications.mark_delivered(*id).await?,
                MarkStatus::Failed => notifications.mark_failed(*id, reason.as_str()).await?,
            };
            output::print_success(&format!(
                "Notification {} is now {}",
                updated.id, updated.status
            ));
        }
    }

    app.close().await;
    Ok(())
}
