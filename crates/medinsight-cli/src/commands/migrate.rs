//! Database migration management commands.

use clap::{Args, Subcommand};

use crate::output;
use medinsight_core::config::StoreBackend;
use medinsight_core::error::AppError;
use medinsight_database::DatabasePool;

/// Arguments for the migrate command
#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Migration subcommand
    #[command(subcommand)]
    pub command: MigrateCommand,
}

/// Migration subcommands
#[derive(Debug, Subcommand)]
pub enum MigrateCommand {
    /// Run all pending migrations
    Run,
}

/// Execute migration commands
pub async fn execute(args: &MigrateArgs, config_path: Option<&str>) -> Result<(), AppError> {
    let config = super::load_config(config_path)?;
    if config.database.backend != StoreBackend::Postgres {
        output::print_warning("database.backend is \"memory\"; nothing to migrate.");
        return Ok(());
    }

    let pool = DatabasePool::connect(&config.database).await?;

    match &args.command {
        MigrateCommand::Run => {
            println!("Running database migrations...");
            medinsight_database::migration::run_migrations(pool.pool()).await?;
            output::print_success("All migrations applied successfully.");
        }
    }

    pool.close().await;
    Ok(())
}
