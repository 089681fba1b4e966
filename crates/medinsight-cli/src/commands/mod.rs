//! CLI command definitions and dispatch.

pub mod audit;
pub mod config;
pub mod dlq;
pub mod migrate;
pub mod notification;
pub mod publish;
pub mod serve;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use medinsight_core::config::AppConfig;
use medinsight_core::error::AppError;
use medinsight_runtime::Application;

/// MedInsight+ event pipeline operations
#[derive(Debug, Parser)]
#[command(name = "medinsight", version, about, long_about = None)]
pub struct Cli {
    /// Path to a configuration file. Without it, `config/default` and
    /// `config/$MEDINSIGHT_ENV` are merged.
    #[arg(short, long)]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the consumers and the delivery worker
    Serve(serve::ServeArgs),
    /// Database migration management
    Migrate(migrate::MigrateArgs),
    /// Publish a pipeline event
    Publish(publish::PublishArgs),
    /// Audit log and security alerts
    Audit(audit::AuditArgs),
    /// Notification records
    Notification(notification::NotificationArgs),
    /// Dead-letter topics and quarantined records
    Dlq(dlq::DlqArgs),
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        let config_path = self.config.as_deref();
        match &self.command {
            Commands::Serve(args) => serve::execute(args, config_path).await,
            Commands::Migrate(args) => migrate::execute(args, config_path).await,
            Commands::Publish(args) => publish::execute(args, config_path).await,
            Commands::Audit(args) => audit::execute(args, config_path, self.format).await,
            Commands::Notification(args) => {
                notification::execute(args, config_path, self.format).await
            }
            Commands::Dlq(args) => dlq::execute(args, config_path, self.format).await,
            Commands::Config(args) => config::execute(args, config_path, self.format).await,
        }
    }
}

/// Helper: load configuration from an explicit file or the environment
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig, AppError> {
    match config_path {
        Some(path) => AppConfig::from_file(path),
        None => {
            let env =
                std::env::var("MEDINSIGHT_ENV").unwrap_or_else(|_| "development".to_string());
            AppConfig::load(&env)
        }
    }
}

/// Helper: assemble the pipeline without starting it
pub async fn open_app(config_path: Option<&str>) -> Result<Application, AppError> {
    let config = load_config(config_path)?;
    Application::builder(config).build().await
}
