//! MedInsight+ Event Pipeline
//!
//! Main entry point: loads configuration, initialises logging, and runs the
//! consumers and delivery worker until a shutdown signal arrives.

use tracing_subscriber::{EnvFilter, fmt};

use medinsight_core::config::{AppConfig, LogFormat};
use medinsight_core::error::AppError;
use medinsight_runtime::{Application, shutdown_signal};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Pipeline error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    match std::env::var("MEDINSIGHT_CONFIG") {
        Ok(path) => AppConfig::from_file(&path),
        Err(_) => {
            let env =
                std::env::var("MEDINSIGHT_ENV").unwrap_or_else(|_| "development".to_string());
            AppConfig::load(&env)
        }
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        LogFormat::Pretty => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main pipeline run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting MedInsight pipeline v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Stores, broker, services ─────────────────────────
    let app = Application::builder(config).build().await?;

    // ── Step 2: Consumers and worker until shutdown ──────────────
    app.run_until(shutdown_signal()).await
}
