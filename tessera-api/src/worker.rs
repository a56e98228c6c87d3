use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use tessera_core::scheduler::ExpiryQueue;
use tessera_order::{ExpiryHandler, SettlementOutcome};
use tessera_shared::models::events::ExpiryTask;
use tessera_store::app_config::ExpiryConfig;

use crate::metrics::ApiMetrics;

/// Polls the expiry queue and releases holds whose payment window has passed.
///
/// Each task runs under a hard timeout. Infrastructure failures (store or
/// queue errors, timeouts) put the task back with a backoff until
/// `max_retries` is used up; business outcomes are final.
pub struct ExpiryWorker {
    queue: Arc<dyn ExpiryQueue>,
    handler: ExpiryHandler,
    config: ExpiryConfig,
    metrics: Arc<ApiMetrics>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Released,
    Unchanged,
    Retried,
    Dropped,
}

impl TaskOutcome {
    fn label(&self) -> &'static str {
        match self {
            TaskOutcome::Released => "released",
            TaskOutcome::Unchanged => "unchanged",
            TaskOutcome::Retried => "retried",
            TaskOutcome::Dropped => "dropped",
        }
    }
}

impl ExpiryWorker {
    pub fn new(
        queue: Arc<dyn ExpiryQueue>,
        handler: ExpiryHandler,
        config: ExpiryConfig,
        metrics: Arc<ApiMetrics>,
    ) -> Self {
        Self { queue, handler, config, metrics }
    }

    pub async fn run(self) {
        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            batch_size = self.config.batch_size,
            "Expiry worker started"
        );
        let mut ticker = interval(Duration::from_millis(self.config.poll_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.poll_once().await;
        }
    }

    /// Claims one batch of due tasks and processes them. Returns the outcome
    /// of every claimed task.
    pub async fn poll_once(&self) -> Vec<TaskOutcome> {
        let tasks = match self.queue.claim_due(Utc::now(), self.config.batch_size).await {
            Ok(tasks) => tasks,
            Err(e) => {
                error!("Failed to claim expiry tasks: {}", e);
                return Vec::new();
            }
        };
        if !tasks.is_empty() {
            debug!("Claimed {} expiry tasks", tasks.len());
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        for task in tasks {
            let outcome = self.process(task).await;
            self.metrics.expiry_task(outcome.label());
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn process(&self, task: ExpiryTask) -> TaskOutcome {
        let limit = Duration::from_millis(self.config.execution_timeout_ms);
        match tokio::time::timeout(limit, self.handler.handle(&task)).await {
            Ok(Ok(SettlementOutcome::Applied { .. })) => TaskOutcome::Released,
            Ok(Ok(SettlementOutcome::Unchanged(status))) => {
                debug!(order_id = %task.order_id, status = %status, "Expiry task found order already settled");
                TaskOutcome::Unchanged
            }
            Ok(Err(e)) if e.is_business_error() => {
                warn!(order_id = %task.order_id, code = e.code(), "Dropping expiry task: {}", e);
                TaskOutcome::Dropped
            }
            Ok(Err(e)) => {
                warn!(order_id = %task.order_id, attempt = task.attempt, "Expiry task failed: {}", e);
                self.retry(task).await
            }
            Err(_) => {
                warn!(order_id = %task.order_id, attempt = task.attempt, "Expiry task timed out after {:?}", limit);
                self.retry(task).await
            }
        }
    }

    async fn retry(&self, task: ExpiryTask) -> TaskOutcome {
        if task.attempt >= self.config.max_retries {
            error!(order_id = %task.order_id, attempts = task.attempt + 1, "Giving up on expiry task");
            return TaskOutcome::Dropped;
        }

        let backoff = Duration::from_secs(self.config.retry_backoff_seconds);
        match self.queue.schedule_release(task.next_attempt(), backoff).await {
            Ok(()) => TaskOutcome::Retried,
            Err(e) => {
                error!(order_id = %task.order_id, "Failed to re-enqueue expiry task: {}", e);
                TaskOutcome::Dropped
            }
        }
    }
}
