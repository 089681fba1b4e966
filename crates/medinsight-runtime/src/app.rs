//! Application assembly and lifecycle.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use medinsight_broker::dead_letter::DeadLetterPolicy;
use medinsight_broker::{
    DeadLetterErrorHandler, EventPublisher, ListenerContainer, MessageBroker, PipelineMetrics,
    TopicRegistry,
};
use medinsight_core::AppResult;
use medinsight_core::config::{AppConfig, DeliveryMode};
use medinsight_core::events::EventKind;
use medinsight_database::{DatabasePool, Stores};
use medinsight_service::{
    AuditEventHandler, AuditService, ChannelSender, DeliveryDispatcher, DlqMonitor,
    NotificationEventHandler, NotificationService, QuarantineService,
};
use medinsight_worker::{
    DeliveryQueue, MaintenanceScheduler, NotificationDeliveryHandler, TaskExecutor, WorkerRunner,
};

use crate::broker::connect_broker;

/// How long shutdown waits for each background task.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds an [`Application`] from configuration. Stores, broker, and
/// channel senders default to what the configuration names and can be
/// replaced before [`build`](Self::build).
#[derive(Debug)]
pub struct ApplicationBuilder {
    config: AppConfig,
    stores: Option<Stores>,
    broker: Option<Arc<dyn MessageBroker>>,
    senders: Vec<Arc<dyn ChannelSender>>,
}

impl ApplicationBuilder {
    /// Start from `config`.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            stores: None,
            broker: None,
            senders: Vec::new(),
        }
    }

    /// Use these stores instead of opening `database.backend`.
    pub fn with_stores(mut self, stores: Stores) -> Self {
        self.stores = Some(stores);
        self
    }

    /// Use this broker instead of connecting to `broker.provider`.
    pub fn with_broker(mut self, broker: Arc<dyn MessageBroker>) -> Self {
        self.broker = Some(broker);
        self
    }

    /// Replace the configured sender for the sender's channel.
    pub fn with_sender(mut self, sender: Arc<dyn ChannelSender>) -> Self {
        self.senders.push(sender);
        self
    }

    /// Validate the configuration and assemble every component.
    pub async fn build(self) -> AppResult<Application> {
        let config = self.config;
        config.validate()?;

        // ── Step 1: Record stores ────────────────────────────────────
        let (stores, pool) = match self.stores {
            Some(stores) => (stores, None),
            None => Stores::open(&config.database).await?,
        };

        // ── Step 2: Broker and topics ────────────────────────────────
        let broker = match self.broker {
            Some(broker) => broker,
            None => connect_broker(&config.broker)?,
        };
        let topics = Arc::new(TopicRegistry::from_config(&config.topics)?);
        if config.broker.create_topics {
            broker.ensure_topics(&topics.all_topics()).await?;
        }
        let publisher = Arc::new(EventPublisher::new(broker.producer(), Arc::clone(&topics)));

        // ── Step 3: Services ─────────────────────────────────────────
        let audit = Arc::new(AuditService::new(
            Arc::clone(&stores.audit_logs),
            Arc::clone(&stores.alerts),
        ));
        let notifications = Arc::new(NotificationService::new(Arc::clone(&stores.notifications)));
        let dispatcher = self.senders.into_iter().fold(
            DeliveryDispatcher::from_config(&config.notification, &config.mail),
            |dispatcher, sender| dispatcher.with_sender(sender),
        );
        let dispatcher = Arc::new(dispatcher);
        let dlq = Arc::new(DlqMonitor::new(
            Arc::clone(&broker),
            Arc::clone(&topics),
            Arc::clone(&publisher),
            Arc::clone(&stores.poison),
            Arc::clone(&audit),
        ));

        // ── Step 4: Dead-letter routing ──────────────────────────────
        let metrics = Arc::new(PipelineMetrics::new());
        let quarantine = Arc::new(QuarantineService::new(
            Arc::clone(&stores.poison),
            Arc::clone(&audit),
        ));
        let error_handler = Arc::new(DeadLetterErrorHandler::new(
            broker.producer(),
            Arc::clone(&topics),
            quarantine,
            DeadLetterPolicy::from_config(&config.consumer, &config.dead_letter),
            Arc::clone(&metrics),
        ));

        info!(
            broker = broker.name(),
            audit_topic = topics.topic_for(EventKind::Audit),
            notification_topic = topics.topic_for(EventKind::Notification),
            delivery_mode = ?config.notification.delivery_mode,
            "Application assembled"
        );

        Ok(Application {
            config,
            stores,
            pool,
            broker,
            topics,
            publisher,
            metrics,
            audit,
            notifications,
            dispatcher,
            dlq,
            error_handler,
        })
    }
}

/// The assembled pipeline. Nothing consumes until [`start`](Self::start).
#[derive(Debug)]
pub struct Application {
    config: AppConfig,
    stores: Stores,
    pool: Option<DatabasePool>,
    broker: Arc<dyn MessageBroker>,
    topics: Arc<TopicRegistry>,
    publisher: Arc<EventPublisher>,
    metrics: Arc<PipelineMetrics>,
    audit: Arc<AuditService>,
    notifications: Arc<NotificationService>,
    dispatcher: Arc<DeliveryDispatcher>,
    dlq: Arc<DlqMonitor>,
    error_handler: Arc<DeadLetterErrorHandler>,
}

impl Application {
    /// Shorthand for [`ApplicationBuilder::new`].
    pub fn builder(config: AppConfig) -> ApplicationBuilder {
        ApplicationBuilder::new(config)
    }

    /// The validated configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The record stores.
    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// The broker client.
    pub fn broker(&self) -> &Arc<dyn MessageBroker> {
        &self.broker
    }

    /// Topic names.
    pub fn topics(&self) -> &Arc<TopicRegistry> {
        &self.topics
    }

    /// Publisher for audit and notification events.
    pub fn publisher(&self) -> &Arc<EventPublisher> {
        &self.publisher
    }

    /// Listener outcome counters.
    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// Audit service.
    pub fn audit(&self) -> &Arc<AuditService> {
        &self.audit
    }

    /// Notification service.
    pub fn notifications(&self) -> &Arc<NotificationService> {
        &self.notifications
    }

    /// Dead-letter and quarantine view.
    pub fn dlq(&self) -> &Arc<DlqMonitor> {
        &self.dlq
    }

    /// Launch the listener containers and, when enabled, the delivery
    /// worker.
    pub async fn start(&self) -> AppResult<RunningApplication> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // ── Step 1: Listener containers ──────────────────────────────
        let audit_container = ListenerContainer::new(
            self.config.consumer.audit_group.clone(),
            vec![self.topics.topic_for(EventKind::Audit).to_string()],
            Arc::clone(&self.broker),
            Arc::new(AuditEventHandler::new(Arc::clone(&self.audit))),
            Arc::clone(&self.error_handler),
            Arc::clone(&self.metrics),
        );
        let notification_container = ListenerContainer::new(
            self.config.consumer.notification_group.clone(),
            vec![self.topics.topic_for(EventKind::Notification).to_string()],
            Arc::clone(&self.broker),
            Arc::new(NotificationEventHandler::new(
                Arc::clone(&self.notifications),
                Arc::clone(&self.dispatcher),
                self.config.notification.delivery_mode,
                self.config.notification.max_delivery_attempts,
            )),
            Arc::clone(&self.error_handler),
            Arc::clone(&self.metrics),
        );

        let poll_timeout = Duration::from_millis(self.config.consumer.poll_timeout_ms);
        let mut listeners = Vec::with_capacity(2);
        for container in [audit_container, notification_container] {
            let container = Arc::new(
                container
                    .with_concurrency(self.config.consumer.concurrency)
                    .with_poll_timeout(poll_timeout),
            );
            let group = container.group().to_string();
            let cancel = shutdown_rx.clone();
            listeners.push(tokio::spawn(async move {
                if let Err(e) = container.run(cancel).await {
                    error!(group = %group, error = %e, "Listener container failed");
                }
            }));
        }

        // ── Step 2: Delivery worker ──────────────────────────────────
        let (worker, scheduler) = if self.config.worker.enabled {
            let (handle, scheduler) = self.start_worker(shutdown_rx.clone()).await?;
            (Some(handle), Some(scheduler))
        } else {
            if self.config.notification.delivery_mode == DeliveryMode::Outbox {
                warn!("Delivery worker disabled; outbox notifications will stay PENDING");
            } else {
                info!("Delivery worker disabled");
            }
            (None, None)
        };

        Ok(RunningApplication {
            shutdown_tx,
            listeners,
            worker,
            scheduler,
        })
    }

    async fn start_worker(
        &self,
        cancel: watch::Receiver<bool>,
    ) -> AppResult<(JoinHandle<()>, MaintenanceScheduler)> {
        info!("Starting delivery worker...");

        let worker_id = format!("worker-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
        let queue = Arc::new(DeliveryQueue::new(
            Arc::clone(&self.stores.deliveries),
            worker_id,
        ));

        let mut executor = TaskExecutor::new();
        executor.register(Arc::new(NotificationDeliveryHandler::new(
            Arc::clone(&self.notifications),
            Arc::clone(&self.dispatcher),
        )));
        let executor_kinds = executor.registered_kinds();
        let executor = Arc::new(executor);

        let runner = WorkerRunner::new(
            Arc::clone(&queue),
            executor,
            self.config.worker.clone(),
            self.config.notification.retry_backoff_seconds,
        );

        let scheduler = MaintenanceScheduler::new(queue, self.config.worker.clone()).await?;
        scheduler.register().await?;
        scheduler.start().await?;

        let handle = tokio::spawn(async move {
            runner.run(cancel).await;
        });

        info!(kinds = ?executor_kinds, "Delivery worker started");
        Ok((handle, scheduler))
    }

    /// Start, wait for `signal`, then shut down and release the pool.
    pub async fn run_until<F>(self, signal: F) -> AppResult<()>
    where
        F: Future<Output = ()>,
    {
        let running = self.start().await?;
        signal.await;
        info!("Shutdown signal received, starting graceful shutdown...");
        running.shutdown().await?;

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
        info!(
            processed = self.metrics.processed(),
            dead_lettered = self.metrics.dead_lettered(),
            poisoned = self.metrics.poisoned(),
            "Pipeline shut down gracefully"
        );
        Ok(())
    }

    /// Release the database pool without starting.
    pub async fn close(self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}

/// Handles to the tasks launched by [`Application::start`].
#[derive(Debug)]
pub struct RunningApplication {
    shutdown_tx: watch::Sender<bool>,
    listeners: Vec<JoinHandle<()>>,
    worker: Option<JoinHandle<()>>,
    scheduler: Option<MaintenanceScheduler>,
}

impl RunningApplication {
    /// Signal every task to stop and wait for in-flight work.
    pub async fn shutdown(self) -> AppResult<()> {
        let _ = self.shutdown_tx.send(true);

        if let Some(scheduler) = &self.scheduler {
            scheduler.shutdown().await?;
        }

        info!("Waiting for background tasks to complete...");
        let drained = tokio::time::timeout(DRAIN_TIMEOUT, join_all(self.listeners)).await;
        if drained.is_err() {
            warn!("Listener containers did not stop within {:?}", DRAIN_TIMEOUT);
        }
        if let Some(handle) = self.worker {
            if tokio::time::timeout(DRAIN_TIMEOUT, handle).await.is_err() {
                warn!("Delivery worker did not stop within {:?}", DRAIN_TIMEOUT);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use medinsight_broker::InMemoryBroker;
    use medinsight_core::config::StoreBackend;
    use medinsight_core::events::{AuditAction, AuditEvent};

    use super::*;

    #[tokio::test]
    async fn test_build_creates_topics_on_injected_broker() {
        let broker = Arc::new(InMemoryBroker::new(2));
        let app = Application::builder(AppConfig::default())
            .with_broker(broker.clone())
            .with_stores(Stores::memory())
            .build()
            .await
            .unwrap();

        for topic in app.topics().all_topics() {
            assert_eq!(broker.topic_depth(&topic).await.unwrap(), Some(0));
        }
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_before_connecting() {
        let mut config = AppConfig::default();
        config.database.backend = StoreBackend::Postgres;
        config.database.url = String::new();

        let err = Application::builder(config).build().await.unwrap_err();
        assert_eq!(err.kind, medinsight_core::error::ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_started_application_consumes_and_stops() {
        let mut config = AppConfig::default();
        config.worker.enabled = false;
        let app = Application::builder(config).build().await.unwrap();
        let running = app.start().await.unwrap();

        let event = AuditEvent::new(AuditAction::Read, "Patient", "7");
        app.publisher().publish_audit_event(event).await;

        let mut stored = 0;
        for _ in 0..100 {
            stored = app.audit().count().await.unwrap();
            if stored == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(stored, 1);

        running.shutdown().await.unwrap();
    }
}
