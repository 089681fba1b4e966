//! Configuration management CLI commands.

use clap::{Args, Subcommand};

use crate::output::{self, OutputFormat};
use medinsight_core::config::{AppConfig, BrokerProvider, StoreBackend};
use medinsight_core::error::AppError;
use medinsight_database::connection::mask_password;

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the merged configuration
    Show,
    /// Validate the configuration
    Validate,
}

/// Execute config commands
pub async fn execute(
    args: &ConfigArgs,
    config_path: Option<&str>,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            let mut config = super::load_config(config_path)?;
            redact(&mut config);
            output::print_item(&config, format);
        }
        ConfigCommand::Validate => match super::load_config(config_path) {
            Ok(config) => {
                output::print_success(&format!(
                    "Configuration '{}' is valid",
                    config_path.unwrap_or("config/default")
                ));
                println!("{}", summary(&config));
            }
            Err(e) => {
                output::print_error(&format!("Configuration invalid: {}", e));
                return Err(e);
            }
        },
    }

    Ok(())
}

fn redact(config: &mut AppConfig) {
    config.database.url = mask_password(&config.database.url);
    if config.mail.password.is_some() {
        config.mail.password = Some("****".to_string());
    }
}

fn summary(config: &AppConfig) -> String {
    let broker = match config.broker.provider {
        BrokerProvider::Memory => "memory".to_string(),
        BrokerProvider::Kafka => format!("kafka ({})", config.broker.kafka.bootstrap_servers),
    };
    let store = match config.database.backend {
        StoreBackend::Memory => "memory".to_string(),
        StoreBackend::Postgres => format!("postgres ({})", mask_password(&config.database.url)),
    };
    [
        format!("  Broker: {broker}"),
        format!("  Store: {store}"),
        format!(
            "  Topics: {} -> {}, {} -> {}",
            config.topics.audit.name,
            config.topics.audit.dead_letter,
            config.topics.notification.name,
            config.topics.notification.dead_letter
        ),
        format!("  Delivery mode: {:?}", config.notification.delivery_mode),
        format!(
            "  Worker: {}",
            if config.worker.enabled { "enabled" } else { "disabled" }
        ),
    ]
    .join("\n")
}
