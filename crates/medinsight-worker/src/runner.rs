//! Worker runner: main loop that claims due tasks and executes them.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Semaphore, watch};
use tokio::time;

use medinsight_core::config::WorkerConfig;
use medinsight_entity::delivery::DeliveryTask;

use crate::executor::{DeliveryError, TaskExecutor};
use crate::queue::DeliveryQueue;

/// Longest delay between two attempts of one task.
const MAX_RETRY_DELAY_SECONDS: u64 = 3600;

/// Main worker runner that polls the queue and executes tasks
#[derive(Debug)]
pub struct WorkerRunner {
    /// Delivery queue for polling
    queue: Arc<DeliveryQueue>,
    /// Task executor for dispatching
    executor: Arc<TaskExecutor>,
    /// Worker configuration
    config: WorkerConfig,
    /// Base retry delay in seconds, doubled per attempt
    retry_backoff_seconds: u64,
}

impl WorkerRunner {
    /// Create a new worker runner
    pub fn new(
        queue: Arc<DeliveryQueue>,
        executor: Arc<TaskExecutor>,
        config: WorkerConfig,
        retry_backoff_seconds: u64,
    ) -> Self {
        Self {
            queue,
            executor,
            config,
            retry_backoff_seconds,
        }
    }

    /// Start the worker runner; runs until the cancel signal is received
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        let worker_id = self.queue.worker_id().to_string();
        tracing::info!(
            "Worker '{}' started with concurrency={}, poll_interval={}ms",
            worker_id,
            self.config.concurrency,
            self.config.poll_interval_ms
        );

        let concurrency = self.config.concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            if *cancel.borrow() {
                break;
            }
            let claimed = tokio::select! {
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        tracing::info!("Worker '{}' received shutdown signal", worker_id);
                        break;
                    }
                    continue;
                }
                claimed = self.poll_and_execute(&semaphore) => claimed,
            };

            if claimed {
                continue;
            }
            tokio::select! {
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        tracing::info!("Worker '{}' shutting down", worker_id);
                        break;
                    }
                }
                _ = time::sleep(poll_interval) => {}
            }
        }

        tracing::info!("Worker '{}' waiting for in-flight tasks to complete...", worker_id);

        let max_permits = u32::try_from(concurrency).unwrap_or(u32::MAX);
        let _ = time::timeout(Duration::from_secs(30), semaphore.acquire_many(max_permits)).await;

        tracing::info!("Worker '{}' shut down complete", worker_id);
    }

    /// Claim a task and execute it if one is due. Returns whether a task
    /// was claimed.
    async fn poll_and_execute(&self, semaphore: &Arc<Semaphore>) -> bool {
        let Ok(permit) = Arc::clone(semaphore).acquire_owned().await else {
            return false;
        };

        match self.queue.dequeue().await {
            Ok(Some(task)) => {
                let queue = Arc::clone(&self.queue);
                let executor = Arc::clone(&self.executor);
                let backoff = self.retry_backoff_seconds;

                tokio::spawn(async move {
                    let _permit = permit;
                    let outcome = executor.execute(&task).await;
                    settle(&queue, &executor, &task, outcome, backoff).await;
                });
                true
            }
            Ok(None) => {
                tracing::trace!("No delivery tasks due");
                false
            }
            Err(e) => {
                tracing::error!("Failed to dequeue task: {}", e);
                false
            }
        }
    }
}

/// Record the outcome of one attempt.
async fn settle(
    queue: &DeliveryQueue,
    executor: &TaskExecutor,
    task: &DeliveryTask,
    outcome: Result<(), DeliveryError>,
    backoff_seconds: u64,
) {
    let error = match outcome {
        Ok(()) => {
            if let Err(e) = queue.complete(task.id).await {
                tracing::error!("Failed to mark task {} as completed: {}", task.id, e);
            }
            tracing::info!("Task {} completed successfully", task.id);
            return;
        }
        Err(error) => error,
    };

    let message = error.to_string();
    if error.is_retryable() && task.can_retry() {
        let delay = retry_delay(backoff_seconds, task.attempts);
        tracing::warn!(
            "Task {} failed (attempt {}/{}), retrying in {}s: {}",
            task.id,
            task.attempts,
            task.max_attempts,
            delay.as_secs(),
            message
        );
        let run_after = Utc::now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::seconds(60));
        if let Err(e) = queue.reschedule(task.id, run_after, &message).await {
            tracing::error!("Failed to reschedule task {}: {}", task.id, e);
        }
        return;
    }

    tracing::error!(
        "Task {} failed permanently after {} attempt(s): {}",
        task.id,
        task.attempts,
        message
    );
    if let Err(e) = queue.fail(task.id, &message).await {
        tracing::error!("Failed to mark task {} as failed: {}", task.id, e);
    }
    if let Err(e) = executor.give_up(task, &message).await {
        tracing::error!("Failed to record give-up of task {}: {}", task.id, e);
    }
}

/// `base * 2^(attempt-1)` seconds, capped at one hour.
fn retry_delay(base_seconds: u64, attempt: i32) -> Duration {
    let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(0).min(20);
    let seconds = base_seconds
        .saturating_mul(1u64 << exponent)
        .min(MAX_RETRY_DELAY_SECONDS);
    Duration::from_secs(seconds)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use medinsight_core::AppResult;
    use medinsight_core::events::NotificationChannel;
    use medinsight_core::types::NotificationId;
    use medinsight_database::Stores;
    use medinsight_entity::delivery::{DeliveryStatus, NOTIFICATION_DELIVERY};

    use super::*;
    use crate::executor::TaskHandler;

    #[derive(Debug, Default)]
    struct FlakyHandler {
        calls: AtomicU32,
        gave_up: AtomicU32,
        permanent: bool,
    }

    #[async_trait]
    impl TaskHandler for FlakyHandler {
        fn task_kind(&self) -> &str {
            NOTIFICATION_DELIVERY
        }

        async fn execute(&self, _task: &DeliveryTask) -> Result<(), DeliveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.permanent {
                Err(DeliveryError::Permanent("bad address".into()))
            } else {
                Err(DeliveryError::Transient("smtp down".into()))
            }
        }

        async fn on_give_up(&self, _task: &DeliveryTask, _error: &str) -> AppResult<()> {
            self.gave_up.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn setup(handler: Arc<FlakyHandler>) -> (Stores, Arc<DeliveryQueue>, Arc<TaskExecutor>) {
        let stores = Stores::memory();
        let queue = Arc::new(DeliveryQueue::new(stores.deliveries.clone(), "w-test"));
        let mut executor = TaskExecutor::new();
        executor.register(handler);
        (stores, queue, Arc::new(executor))
    }

    fn task(max_attempts: i32) -> DeliveryTask {
        DeliveryTask::for_notification(
            NotificationId::new(),
            NotificationChannel::Email,
            max_attempts,
            Utc::now() - chrono::Duration::seconds(1),
        )
    }

    #[test]
    fn test_retry_delay_doubles_and_caps() {
        assert_eq!(retry_delay(30, 1), Duration::from_secs(30));
        assert_eq!(retry_delay(30, 3), Duration::from_secs(120));
        assert_eq!(retry_delay(30, 40), Duration::from_secs(MAX_RETRY_DELAY_SECONDS));
    }

    #[tokio::test]
    async fn test_transient_failure_is_rescheduled_until_attempts_run_out() {
        let handler = Arc::new(FlakyHandler::default());
        let (stores, queue, executor) = setup(handler.clone());
        let queued = task(2);
        queue.enqueue(&queued).await.unwrap();

        let first = queue.dequeue().await.unwrap().unwrap();
        let outcome = executor.execute(&first).await;
        settle(&queue, &executor, &first, outcome, 0).await;
        let stored = stores.deliveries.find_by_id(queued.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DeliveryStatus::Pending);
        assert_eq!(stored.last_error.as_deref(), Some("Transient delivery failure: smtp down"));

        let second = queue.dequeue().await.unwrap().unwrap();
        let outcome = executor.execute(&second).await;
        settle(&queue, &executor, &second, outcome, 0).await;
        let stored = stores.deliveries.find_by_id(queued.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DeliveryStatus::Failed);
        assert_eq!(handler.gave_up.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_permanent_failure_gives_up_at_once() {
        let handler = Arc::new(FlakyHandler {
            permanent: true,
            ..Default::default()
        });
        let (stores, queue, executor) = setup(handler.clone());
        let queued = task(5);
        queue.enqueue(&queued).await.unwrap();

        let claimed = queue.dequeue().await.unwrap().unwrap();
        let outcome = executor.execute(&claimed).await;
        settle(&queue, &executor, &claimed, outcome, 0).await;

        let stored = stores.deliveries.find_by_id(queued.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DeliveryStatus::Failed);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(handler.gave_up.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let handler = Arc::new(FlakyHandler::default());
        let (_stores, queue, executor) = setup(handler);
        let config = WorkerConfig {
            poll_interval_ms: 10,
            ..Default::default()
        };
        let runner = WorkerRunner::new(queue, executor, config, 0);

        let (tx, rx) = watch::channel(false);
        let running = tokio::spawn(async move { runner.run(rx).await });
        time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();
        time::timeout(Duration::from_secs(5), running)
            .await
            .unwrap()
            .unwrap();
    }
}
