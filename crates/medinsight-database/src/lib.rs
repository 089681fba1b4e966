//! # medinsight-database
//!
//! Record stores for the pipeline. Each consumer persists through a store
//! trait from [`store`]; [`repositories`] implements them on PostgreSQL and
//! [`memory`] keeps everything in process.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

use std::sync::Arc;

use tracing::info;

use medinsight_core::AppResult;
use medinsight_core::config::{DatabaseConfig, StoreBackend};

pub use connection::DatabasePool;
pub use memory::MemoryStore;
pub use store::{
    AuditLogStore, DeliveryTaskStore, NotificationStore, PoisonMessageStore, SecurityAlertStore,
};

/// One handle per record store, shared by services and consumers.
#[derive(Debug, Clone)]
pub struct Stores {
    /// Audit trail.
    pub audit_logs: Arc<dyn AuditLogStore>,
    /// Security alerts.
    pub alerts: Arc<dyn SecurityAlertStore>,
    /// Notifications.
    pub notifications: Arc<dyn NotificationStore>,
    /// Outbox delivery tasks.
    pub deliveries: Arc<dyn DeliveryTaskStore>,
    /// Quarantined broker records.
    pub poison: Arc<dyn PoisonMessageStore>,
}

impl Stores {
    /// Stores backed by one shared [`MemoryStore`].
    pub fn memory() -> Self {
        Self::from_memory(Arc::new(MemoryStore::new()))
    }

    /// Stores backed by an existing [`MemoryStore`].
    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            audit_logs: store.clone(),
            alerts: store.clone(),
            notifications: store.clone(),
            deliveries: store.clone(),
            poison: store,
        }
    }

    /// Stores backed by PostgreSQL repositories sharing one pool.
    pub fn postgres(pool: &DatabasePool) -> Self {
        let pool = pool.pool().clone();
        Self {
            audit_logs: Arc::new(repositories::AuditLogRepository::new(pool.clone())),
            alerts: Arc::new(repositories::SecurityAlertRepository::new(pool.clone())),
            notifications: Arc::new(repositories::NotificationRepository::new(pool.clone())),
            deliveries: Arc::new(repositories::DeliveryTaskRepository::new(pool.clone())),
            poison: Arc::new(repositories::PoisonMessageRepository::new(pool)),
        }
    }

    /// Open the configured backend. The pool is returned so the caller can
    /// close it on shutdown.
    pub async fn open(config: &DatabaseConfig) -> AppResult<(Self, Option<DatabasePool>)> {
        match config.backend {
            StoreBackend::Memory => {
                info!("Using in-memory record stores");
                Ok((Self::memory(), None))
            }
            StoreBackend::Postgres => {
                let pool = DatabasePool::connect(config).await?;
                if config.run_migrations {
                    migration::run_migrations(pool.pool()).await?;
                }
                Ok((Self::postgres(&pool), Some(pool)))
            }
        }
    }
}
