//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section. Every section has defaults, so an empty configuration runs the
//! whole pipeline in-process on the memory backends.

pub mod broker;
pub mod consumer;
pub mod database;
pub mod dead_letter;
pub mod logging;
pub mod mail;
pub mod notification;
pub mod topics;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use self::broker::{BrokerConfig, BrokerProvider, KafkaConfig};
pub use self::consumer::ConsumerConfig;
pub use self::database::{DatabaseConfig, StoreBackend};
pub use self::dead_letter::DeadLetterConfig;
pub use self::logging::{LogFormat, LoggingConfig};
pub use self::mail::MailConfig;
pub use self::notification::{DeliveryMode, NotificationConfig};
pub use self::topics::{TopicBinding, TopicsConfig};
pub use self::worker::WorkerConfig;

use crate::error::AppError;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "MEDINSIGHT";

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Record store settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Broker client settings.
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Topic names per event kind.
    #[serde(default)]
    pub topics: TopicsConfig,
    /// Listener container settings.
    #[serde(default)]
    pub consumer: ConsumerConfig,
    /// Dead-letter routing bounds.
    #[serde(default)]
    pub dead_letter: DeadLetterConfig,
    /// Notification delivery settings.
    #[serde(default)]
    pub notification: NotificationConfig,
    /// SMTP settings.
    #[serde(default)]
    pub mail: MailConfig,
    /// Delivery worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges `config/default` with an environment-specific overlay and
    /// environment variables prefixed with `MEDINSIGHT__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false));
        Self::finish(builder)
    }

    /// Load configuration from an explicit file plus environment overrides.
    pub fn from_file(path: &str) -> Result<Self, AppError> {
        let builder =
            config::Config::builder().add_source(config::File::with_name(path).required(true));
        Self::finish(builder)
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, AppError> {
        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        self.topics.validate()?;

        if self.database.backend == StoreBackend::Postgres && self.database.url.trim().is_empty() {
            return Err(AppError::configuration(
                "database.url is required when database.backend = \"postgres\"",
            ));
        }
        if self.broker.partitions == 0 {
            return Err(AppError::configuration("broker.partitions must be at least 1"));
        }
        if self.consumer.concurrency == 0 {
            return Err(AppError::configuration("consumer.concurrency must be at least 1"));
        }
        if self.consumer.audit_group == self.consumer.notification_group {
            return Err(AppError::configuration(
                "consumer.audit_group and consumer.notification_group must differ",
            ));
        }
        if self.dead_letter.max_send_attempts == 0 {
            return Err(AppError::configuration(
                "dead_letter.max_send_attempts must be at least 1",
            ));
        }
        if self.notification.max_delivery_attempts < 1 {
            return Err(AppError::configuration(
                "notification.max_delivery_attempts must be at least 1",
            ));
        }
        if self.worker.concurrency == 0 {
            return Err(AppError::configuration("worker.concurrency must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.database.backend, StoreBackend::Memory);
        assert_eq!(config.broker.provider, BrokerProvider::Memory);
        assert_eq!(config.notification.delivery_mode, DeliveryMode::Outbox);
    }

    #[test]
    fn test_postgres_requires_url() {
        let mut config = AppConfig::default();
        config.database.backend = StoreBackend::Postgres;
        assert!(config.validate().is_err());

        config.database.url = "postgres://localhost/medinsight".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_dead_letter_attempts() {
        let mut config = AppConfig::default();
        config.dead_letter.max_send_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_shared_consumer_group() {
        let mut config = AppConfig::default();
        config.consumer.notification_group = config.consumer.audit_group.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let raw = r#"
            [notification]
            delivery_mode = "inline"

            [topics.audit]
            name = "audit-v2"
            dead_letter = "audit-v2-dlq"
        "#;
        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .and_then(|c| c.try_deserialize())
            .expect("config should deserialize");

        assert_eq!(config.notification.delivery_mode, DeliveryMode::Inline);
        assert_eq!(config.topics.audit.name, "audit-v2");
        assert_eq!(config.topics.notification.name, "notification-events");
        assert_eq!(config.consumer.max_redeliveries, 3);
    }
}
