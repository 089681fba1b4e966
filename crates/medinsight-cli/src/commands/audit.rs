//! Audit log CLI commands.

use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;
use uuid::Uuid;

use crate::output::{self, OutputFormat};
use medinsight_core::error::AppError;
use medinsight_core::events::AuditAction;
use medinsight_core::types::{PageRequest, SecurityAlertId};
use medinsight_entity::audit::{AlertSeverity, AuditLog, AuditLogFilter, SecurityAlert};

/// Arguments for audit commands
#[derive(Debug, Args)]
pub struct AuditArgs {
    /// Audit subcommand
    #[command(subcommand)]
    pub command: AuditCommand,
}

/// Filters shared by search and export
#[derive(Debug, Clone, Args)]
pub struct FilterArgs {
    /// Filter by actor (user ID)
    #[arg(long)]
    actor: Option<Uuid>,
    /// Filter by action
    #[arg(short, long)]
    action: Option<AuditAction>,
    /// Filter by record type
    #[arg(long)]
    entity_type: Option<String>,
    /// Filter by record ID
    #[arg(long)]
    entity_id: Option<String>,
    /// Earliest timestamp (RFC 3339)
    #[arg(long)]
    from: Option<DateTime<Utc>>,
    /// Latest timestamp (RFC 3339)
    #[arg(long)]
    to: Option<DateTime<Utc>>,
}

impl FilterArgs {
    fn to_filter(&self) -> AuditLogFilter {
        AuditLogFilter {
            actor_id: self.actor,
            action: self.action,
            entity_type: self.entity_type.clone(),
            entity_id: self.entity_id.clone(),
            from: self.from,
            to: self.to,
        }
    }
}

/// Audit subcommands
#[derive(Debug, Subcommand)]
pub enum AuditCommand {
    /// Search audit log
    Search {
        #[command(flatten)]
        filter: FilterArgs,
        /// Page number
        #[arg(short, long, default_value = "1")]
        page: u64,
        /// Results per page
        #[arg(short, long, default_value = "50")]
        limit: u64,
    },
    /// Export matching audit entries to a JSON file
    Export {
        #[command(flatten)]
        filter: FilterArgs,
        /// Output file path
        #[arg(short, long, default_value = "audit_export.json")]
        output: String,
        /// Days of history to export when --from is not given
        #[arg(short, long, default_value = "30")]
        days: i64,
    },
    /// List security alerts
    Alerts {
        /// Only this severity
        #[arg(short, long)]
        severity: Option<AlertSeverity>,
        /// Only unresolved alerts
        #[arg(long, conflicts_with = "resolved")]
        open: bool,
        /// Only resolved alerts
        #[arg(long)]
        resolved: bool,
    },
    /// Mark a security alert resolved
    ResolveAlert {
        /// Alert ID
        id: SecurityAlertId,
    },
}

/// Audit display row
#[derive(Debug, Serialize, Tabled)]
struct AuditRow {
    /// Time
    time: String,
    /// Actor
    actor: String,
    /// Action
    action: String,
    /// Entity
    entity: String,
    /// IP
    ip: String,
}

impl From<&AuditLog> for AuditRow {
    fn from(log: &AuditLog) -> Self {
        Self {
            time: output::short_time(&log.timestamp),
            actor: log
                .actor_name
                .clone()
                .or_else(|| log.actor_id.map(|id| id.to_string()))
                .unwrap_or_else(|| "-".to_string()),
            action: log.action.to_string(),
            entity: format!("{}/{}", log.entity_type, log.entity_id),
            ip: output::or_dash(log.ip_address.as_deref()),
        }
    }
}

/// Alert display row
#[derive(Debug, Serialize, Tabled)]
struct AlertRow {
    /// ID
    id: String,
    /// Severity
    severity: String,
    /// Type
    alert_type: String,
    /// Detected
    detected: String,
    /// Resolved
    resolved: String,
    /// Description
    description: String,
}

impl From<&SecurityAlert> for AlertRow {
    fn from(alert: &SecurityAlert) -> Self {
        Self {
            id: alert.id.to_string(),
            severity: alert.severity.to_string(),
            alert_type: alert.alert_type.clone(),
            detected: output::short_time(&alert.detected_at),
            resolved: output::or_dash(alert.resolved_at.as_ref().map(output::short_time)),
            description: alert.description.clone(),
        }
    }
}

/// Execute audit commands
pub async fn execute(
    args: &AuditArgs,
    config_path: Option<&str>,
    format: OutputFormat,
) -> Result<(), AppError> {
    let app = super::open_app(config_path).await?;
    let audit = app.audit();

    match &args.command {
        AuditCommand::Search {
            filter,
            page,
            limit,
        } => {
            let response = audit
                .search(&filter.to_filter(), &PageRequest::new(*page, *limit))
                .await?;
            let rows: Vec<AuditRow> = response.items.iter().map(AuditRow::from).collect();
            output::print_list(&rows, format);
            output::print_page_footer(
                response.page,
                response.total_pages(),
                response.total_items,
                format,
            );
        }
        AuditCommand::Export {
            filter,
            output: out_path,
            days,
        } => {
            let mut filter = filter.to_filter();
            if filter.from.is_none() {
                filter.from = Some(Utc::now() - chrono::Duration::days(*days));
            }

            let mut entries = Vec::new();
            let mut page = PageRequest::new(1, 500);
            loop {
                let response = audit.search(&filter, &page).await?;
                let has_next = response.has_next();
                entries.extend(response.items);
                if !has_next {
                    break;
                }
                page = PageRequest::new(page.page + 1, page.page_size);
            }

            let json = serde_json::to_string_pretty(&entries)?;
            tokio::fs::write(out_path, json)
                .await
                .map_err(|e| AppError::internal(format!("Failed to write file: {}", e)))?;

            output::print_success(&format!(
                "Exported {} audit entries to '{}'",
                entries.len(),
                out_path
            ));
        }
        AuditCommand::Alerts {
            severity,
            open,
            resolved,
        } => {
            let resolved_filter = match (open, resolved) {
                (true, _) => Some(false),
                (_, true) => Some(true),
                _ => None,
            };
            let alerts = audit.list_alerts(*severity, resolved_filter).await?;
            let rows: Vec<AlertRow> = alerts.iter().map(AlertRow::from).collect();
            output::print_list(&rows, format);
        }
        AuditCommand::ResolveAlert { id } => {
            let alert = audit.resolve_alert(*id).await?;
            output::print_success(&format!(
                "Resolved {} alert {} ({})",
                alert.severity, alert.id, alert.alert_type
            ));
        }
    }

    app.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use medinsight_core::events::AuditEvent;

    use super::*;

    #[test]
    fn test_row_prefers_actor_name() {
        let event = AuditEvent::new(AuditAction::Delete, "Patient", "42")
            .with_actor(Uuid::new_v4(), "dr.house");
        let row = AuditRow::from(&AuditLog::from_event(&event));
        assert_eq!(row.actor, "dr.house");
        assert_eq!(row.entity, "Patient/42");
        assert_eq!(row.ip, "-");
    }
}
