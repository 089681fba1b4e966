//! Run the pipeline in the foreground.

use clap::Args;

use medinsight_core::config::{BrokerProvider, DeliveryMode, StoreBackend};
use medinsight_core::error::AppError;
use medinsight_runtime::{Application, shutdown_signal};

/// Arguments for the serve command
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Override `consumer.concurrency`
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Override `notification.delivery_mode`
    #[arg(long, value_parser = parse_delivery_mode)]
    pub delivery_mode: Option<DeliveryMode>,

    /// Do not start the delivery worker
    #[arg(long)]
    pub no_worker: bool,
}

fn parse_delivery_mode(s: &str) -> Result<DeliveryMode, String> {
    match s.to_ascii_lowercase().as_str() {
        "inline" => Ok(DeliveryMode::Inline),
        "outbox" => Ok(DeliveryMode::Outbox),
        other => Err(format!("unknown delivery mode '{other}' (inline|outbox)")),
    }
}

/// Execute the serve command
pub async fn execute(args: &ServeArgs, config_path: Option<&str>) -> Result<(), AppError> {
    let mut config = super::load_config(config_path)?;

    if let Some(concurrency) = args.concurrency {
        config.consumer.concurrency = concurrency;
    }
    if let Some(mode) = args.delivery_mode {
        config.notification.delivery_mode = mode;
    }
    if args.no_worker {
        config.worker.enabled = false;
    }

    println!("Starting MedInsight pipeline...");
    println!(
        "  Broker: {}",
        match config.broker.provider {
            BrokerProvider::Memory => "memory",
            BrokerProvider::Kafka => "kafka",
        }
    );
    println!(
        "  Store: {}",
        match config.database.backend {
            StoreBackend::Memory => "memory",
            StoreBackend::Postgres => "postgres",
        }
    );
    println!("  Delivery mode: {:?}", config.notification.delivery_mode);

    let app = Application::builder(config).build().await?;
    app.run_until(shutdown_signal()).await
}
