//! Task executor: dispatches delivery tasks to registered handlers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use medinsight_core::{AppError, AppResult};
use medinsight_entity::delivery::DeliveryTask;

/// Trait for task handler implementations
#[async_trait]
pub trait TaskHandler: Send + Sync + std::fmt::Debug {
    /// The task kind this handler processes
    fn task_kind(&self) -> &str;

    /// Execute one attempt of the task
    async fn execute(&self, task: &DeliveryTask) -> Result<(), DeliveryError>;

    /// Called once when the task has failed for good
    async fn on_give_up(&self, _task: &DeliveryTask, _error: &str) -> AppResult<()> {
        Ok(())
    }
}

/// Error from one task attempt
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// Permanent failure: do not retry
    #[error("Permanent delivery failure: {0}")]
    Permanent(String),

    /// Transient failure: may retry
    #[error("Transient delivery failure: {0}")]
    Transient(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

impl DeliveryError {
    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Permanent(_) => false,
            Self::Transient(_) => true,
            Self::Internal(err) => err.is_transient(),
        }
    }
}

/// Dispatches tasks to the appropriate handler based on task kind
#[derive(Debug)]
pub struct TaskExecutor {
    /// Registered handlers by task kind
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl TaskExecutor {
    /// Create a new task executor
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a task handler
    pub fn register(&mut self, handler: Arc<dyn TaskHandler>) {
        let kind = handler.task_kind().to_string();
        tracing::info!("Registered task handler for kind '{}'", kind);
        self.handlers.insert(kind, handler);
    }

    /// Execute a task by dispatching to the correct handler
    pub async fn execute(&self, task: &DeliveryTask) -> Result<(), DeliveryError> {
        let handler = self.handler(task)?;
        tracing::info!(
            "Executing task: id={}, kind='{}', attempt={}/{}",
            task.id,
            task.task_kind,
            task.attempts,
            task.max_attempts
        );
        handler.execute(task).await
    }

    /// Tell the task's handler the task failed for good
    pub async fn give_up(&self, task: &DeliveryTask, error: &str) -> AppResult<()> {
        match self.handlers.get(&task.task_kind) {
            Some(handler) => handler.on_give_up(task, error).await,
            None => Ok(()),
        }
    }

    /// Get the list of registered task kinds
    pub fn registered_kinds(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    fn handler(&self, task: &DeliveryTask) -> Result<&Arc<dyn TaskHandler>, DeliveryError> {
        self.handlers.get(&task.task_kind).ok_or_else(|| {
            DeliveryError::Permanent(format!(
                "No handler registered for task kind '{}'",
                task.task_kind
            ))
        })
    }
}

impl Default for TaskExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use medinsight_core::events::NotificationChannel;
    use medinsight_core::types::NotificationId;

    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(DeliveryError::Transient("x".into()).is_retryable());
        assert!(!DeliveryError::Permanent("x".into()).is_retryable());
        assert!(DeliveryError::Internal(AppError::database("down")).is_retryable());
        assert!(!DeliveryError::Internal(AppError::conflict("moved")).is_retryable());
    }

    #[tokio::test]
    async fn test_unknown_kind_is_permanent() {
        let executor = TaskExecutor::new();
        let mut task = DeliveryTask::for_notification(
            NotificationId::new(),
            NotificationChannel::Email,
            3,
            Utc::now(),
        );
        task.task_kind = "carrier_pigeon".into();

        let err = executor.execute(&task).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Permanent(_)));
        assert!(executor.give_up(&task, "no handler").await.is_ok());
    }
}
