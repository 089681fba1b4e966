//! Cron scheduler for delivery queue maintenance.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};

use medinsight_core::config::WorkerConfig;
use medinsight_core::{AppError, AppResult};

use crate::queue::DeliveryQueue;

/// What one maintenance pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    /// Stale running tasks handed back to the queue.
    pub requeued: u64,
    /// Finished tasks deleted.
    pub purged: u64,
}

/// Requeue tasks whose worker vanished and purge old finished tasks.
pub async fn run_maintenance(
    queue: &DeliveryQueue,
    config: &WorkerConfig,
) -> AppResult<MaintenanceReport> {
    let now = Utc::now();
    let requeued = queue
        .requeue_stale(now - Duration::seconds(config.stale_after_seconds))
        .await?;
    let purged = queue
        .purge_finished(now - Duration::days(config.retention_days))
        .await?;

    if requeued > 0 || purged > 0 {
        tracing::info!(
            "Delivery maintenance: requeued {} stale task(s), purged {} finished task(s)",
            requeued,
            purged
        );
    }
    let stats = queue.stats().await?;
    tracing::debug!(
        "Delivery queue: {} pending, {} running, {} failed",
        stats.pending,
        stats.running,
        stats.failed
    );
    Ok(MaintenanceReport { requeued, purged })
}

/// Cron-based scheduler for delivery queue maintenance
pub struct MaintenanceScheduler {
    /// The underlying job scheduler
    scheduler: JobScheduler,
    /// Queue to maintain
    queue: Arc<DeliveryQueue>,
    /// Worker configuration
    config: WorkerConfig,
}

impl std::fmt::Debug for MaintenanceScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaintenanceScheduler")
            .field("cron", &self.config.maintenance_cron)
            .finish()
    }
}

impl MaintenanceScheduler {
    /// Create a new maintenance scheduler
    pub async fn new(queue: Arc<DeliveryQueue>, config: WorkerConfig) -> AppResult<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {e}")))?;
        Ok(Self {
            scheduler,
            queue,
            config,
        })
    }

    /// Register the maintenance pass on the configured schedule
    pub async fn register(&self) -> AppResult<()> {
        let queue = Arc::clone(&self.queue);
        let config = self.config.clone();
        let job = CronJob::new_async(self.config.maintenance_cron.as_str(), move |_uuid, _lock| {
            let queue = Arc::clone(&queue);
            let config = config.clone();
            Box::pin(async move {
                if let Err(e) = run_maintenance(&queue, &config).await {
                    tracing::error!("Delivery maintenance failed: {}", e);
                }
            })
        })
        .map_err(|e| {
            AppError::configuration(format!(
                "Invalid worker.maintenance_cron '{}': {e}",
                self.config.maintenance_cron
            ))
        })?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add maintenance schedule: {e}")))?;

        tracing::info!("Registered: delivery maintenance ({})", self.config.maintenance_cron);
        Ok(())
    }

    /// Start the scheduler
    pub async fn start(&self) -> AppResult<()> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {e}")))?;
        tracing::info!("Maintenance scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&self) -> AppResult<()> {
        let mut scheduler = self.scheduler.clone();
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {e}")))?;
        tracing::info!("Maintenance scheduler shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use medinsight_core::events::NotificationChannel;
    use medinsight_core::types::NotificationId;
    use medinsight_database::Stores;
    use medinsight_entity::delivery::{DeliveryStatus, DeliveryTask};

    use super::*;

    #[tokio::test]
    async fn test_maintenance_requeues_stale_running_tasks() {
        let stores = Stores::memory();
        let queue = DeliveryQueue::new(stores.deliveries.clone(), "w1");
        let task = DeliveryTask::for_notification(
            NotificationId::new(),
            NotificationChannel::Email,
            3,
            Utc::now() - Duration::seconds(5),
        );
        queue.enqueue(&task).await.unwrap();
        queue.dequeue().await.unwrap().unwrap();

        let config = WorkerConfig {
            stale_after_seconds: -60,
            ..Default::default()
        };
        let report = run_maintenance(&queue, &config).await.unwrap();
        assert_eq!(report.requeued, 1);

        let stored = stores.deliveries.find_by_id(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DeliveryStatus::Pending);
    }

    #[tokio::test]
    async fn test_invalid_cron_is_configuration_error() {
        let queue = Arc::new(DeliveryQueue::new(Stores::memory().deliveries, "w1"));
        let config = WorkerConfig {
            maintenance_cron: "every now and then".into(),
            ..Default::default()
        };
        let scheduler = MaintenanceScheduler::new(queue, config).await.unwrap();
        let err = scheduler.register().await.unwrap_err();
        assert_eq!(err.kind, medinsight_core::error::ErrorKind::Configuration);
    }
}
