//! Dead-letter and quarantine CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use medinsight_core::error::AppError;
use medinsight_core::types::{PageRequest, PoisonMessageId};
use medinsight_entity::dead_letter::PoisonMessage;

/// Arguments for DLQ commands
#[derive(Debug, Args)]
pub struct DlqArgs {
    /// DLQ subcommand
    #[command(subcommand)]
    pub command: DlqCommand,
}

/// DLQ subcommands
#[derive(Debug, Subcommand)]
pub enum DlqCommand {
    /// Dead-letter topic depths and quarantine counts
    Stats,
    /// List quarantined records
    List {
        /// Page number
        #[arg(short, long, default_value = "1")]
        page: u64,
        /// Results per page
        #[arg(short, long, default_value = "50")]
        limit: u64,
    },
    /// Show one quarantined record with its payload
    Show {
        /// Poison message ID
        id: PoisonMessageId,
    },
    /// Send a quarantined record back to its source topic
    Replay {
        /// Poison message ID
        id: PoisonMessageId,
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

/// Topic depth row
#[derive(Debug, Serialize, Tabled)]
struct TopicRow {
    /// Topic
    topic: String,
    /// Records
    depth: String,
}

/// Poison message row
#[derive(Debug, Serialize, Tabled)]
struct PoisonRow {
    /// ID
    id: String,
    /// Source
    source: String,
    /// Attempts
    attempts: i32,
    /// Quarantined
    quarantined: String,
    /// Replayed
    replayed: String,
    /// Error
    error: String,
}

impl From<&PoisonMessage> for PoisonRow {
    fn from(m: &PoisonMessage) -> Self {
        Self {
            id: m.id.to_string(),
            source: format!("{}[{}]@{}", m.source_topic, m.source_partition, m.source_offset),
            attempts: m.attempts,
            quarantined: output::short_time(&m.quarantined_at),
            replayed: output::or_dash(m.replayed_at.as_ref().map(output::short_time)),
            error: m.error.clone(),
        }
    }
}

/// Execute DLQ commands
pub async fn execute(
    args: &DlqArgs,
    config_path: Option<&str>,
    format: OutputFormat,
) -> Result<(), AppError> {
    let app = super::open_app(config_path).await?;
    let dlq = app.dlq();

    match &args.command {
        DlqCommand::Stats => {
            let stats = dlq.stats().await?;
            match format {
                OutputFormat::Json => output::print_item(&stats, format),
                OutputFormat::Table => {
                    let rows: Vec<TopicRow> = stats
                        .dlq_topics
                        .iter()
                        .map(|t| TopicRow {
                            topic: t.topic.clone(),
                            depth: output::or_dash(t.depth),
                        })
                        .collect();
                    output::print_list(&rows, format);
                    output::print_kv("Quarantined messages", &stats.quarantined_messages.to_string());
                    output::print_kv("Unresolved alerts", &stats.unresolved_alerts.to_string());
                    output::print_kv("Total audit logs", &stats.total_audit_logs.to_string());
                }
            }
        }
        DlqCommand::List { page, limit } => {
            let response = dlq.list(&PageRequest::new(*page, *limit)).await?;
            let rows: Vec<PoisonRow> = response.items.iter().map(PoisonRow::from).collect();
            output::print_list(&rows, format);
            output::print_page_footer(
                response.page,
                response.total_pages(),
                response.total_items,
                format,
            );
        }
        DlqCommand::Show { id } => {
            let message = dlq.get(*id).await?;
            match format {
                OutputFormat::Json => output::print_item(&message, format),
                OutputFormat::Table => {
                    output::print_kv("ID", &message.id.to_string());
                    output::print_kv("Source topic", &message.source_topic);
                    output::print_kv("Partition", &message.source_partition.to_string());
                    output::print_kv("Offset", &message.source_offset.to_string());
                    output::print_kv("Key", &output::or_dash(message.message_key.as_deref()));
                    output::print_kv("Attempts", &message.attempts.to_string());
                    output::print_kv("Error", &message.error);
                    output::print_kv("Payload", &message.payload_lossy());
                }
            }
        }
        DlqCommand::Replay { id, force } => {
            let message = dlq.get(*id).await?;
            let prompt = format!(
                "Replay record {} to '{}'? Consumers will process it again.",
                message.id, message.source_topic
            );
            if !output::confirm(&prompt, *force)? {
                println!("Cancelled.");
                return Ok(());
            }

            let replayed = dlq.replay(*id).await?;
            output::print_success(&format!(
                "Replayed {} to '{}'",
                replayed.id, replayed.source_topic
            ));
        }
    }

    app.close().await;
    Ok(())
}
