use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tessera_shared::models::events::ExpiryTask;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("expiry queue unavailable: {0}")]
    Unavailable(String),
    #[error("malformed expiry task: {0}")]
    Malformed(String),
}

/// Enqueues delayed release of a hold.
#[async_trait]
pub trait ExpiryScheduler: Send + Sync {
    async fn schedule_release(&self, task: ExpiryTask, fire_after: Duration) -> Result<(), SchedulerError>;
}

/// Worker side of the expiry queue. A claimed task is removed from the queue;
/// the worker re-schedules it if it needs another attempt.
#[async_trait]
pub trait ExpiryQueue: ExpiryScheduler {
    async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ExpiryTask>, SchedulerError>;
}
