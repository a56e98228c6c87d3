use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use tessera_core::scheduler::{ExpiryQueue, ExpiryScheduler, SchedulerError};
use tessera_shared::models::events::ExpiryTask;

// Pops up to ARGV[2] members whose score is <= ARGV[1] in one step, so two
// workers never claim the same task. Delivery is at most once: a worker that
// dies between claim and release loses the task, and the hold stays PENDING
// until settled by a payment outcome.
const CLAIM_DUE_SCRIPT: &str = r#"
    local due = redis.call("ZRANGEBYSCORE", KEYS[1], "-inf", ARGV[1], "LIMIT", 0, ARGV[2])
    if #due > 0 then
        redis.call("ZREM", KEYS[1], unpack(due))
    end
    return due
"#;

/// Expiry queue backed by a Redis sorted set scored by fire time (epoch millis).
#[derive(Clone)]
pub struct RedisExpiryQueue {
    client: redis::Client,
    key: String,
}

impl RedisExpiryQueue {
    pub fn new(connection_string: &str, key: impl Into<String>) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client, key: key.into() })
    }

    pub async fn ping(&self) -> Result<(), redis::RedisError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

fn unavailable(e: redis::RedisError) -> SchedulerError {
    SchedulerError::Unavailable(e.to_string())
}

fn fire_at(fire_after: Duration) -> i64 {
    let after = chrono::Duration::from_std(fire_after).unwrap_or_else(|_| chrono::Duration::zero());
    (Utc::now() + after).timestamp_millis()
}

#[async_trait]
impl ExpiryScheduler for RedisExpiryQueue {
    async fn schedule_release(&self, task: ExpiryTask, fire_after: Duration) -> Result<(), SchedulerError> {
        let member = serde_json::to_string(&task).map_err(|e| SchedulerError::Malformed(e.to_string()))?;
        let score = fire_at(fire_after);

        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(unavailable)?;
        conn.zadd::<_, _, _, ()>(&self.key, member, score).await.map_err(unavailable)?;

        debug!(order_id = %task.order_id, attempt = task.attempt, fire_at = score, "Expiry scheduled");
        Ok(())
    }
}

#[async_trait]
impl ExpiryQueue for RedisExpiryQueue {
    async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ExpiryTask>, SchedulerError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(unavailable)?;
        let members: Vec<String> = redis::Script::new(CLAIM_DUE_SCRIPT)
            .key(&self.key)
            .arg(now.timestamp_millis())
            .arg(limit)
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;

        // Already removed from the set; a member that cannot be decoded is dropped.
        let tasks = members
            .into_iter()
            .filter_map(|raw| match serde_json::from_str::<ExpiryTask>(&raw) {
                Ok(task) => Some(task),
                Err(e) => {
                    warn!("Dropping malformed expiry task {}: {}", raw, e);
                    None
                }
            })
            .collect();
        Ok(tasks)
    }
}

/// Process-local expiry queue for tests and single-node runs.
#[derive(Clone, Default)]
pub struct InMemoryExpiryQueue {
    tasks: Arc<Mutex<BTreeMap<(i64, u64), ExpiryTask>>>,
    seq: Arc<std::sync::atomic::AtomicU64>,
}

impl InMemoryExpiryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a task that is due at `due_at` regardless of the clock.
    pub async fn push_at(&self, task: ExpiryTask, due_at: DateTime<Utc>) {
        let seq = self.seq.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.tasks.lock().await.insert((due_at.timestamp_millis(), seq), task);
    }

    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }

    pub async fn snapshot(&self) -> Vec<ExpiryTask> {
        self.tasks.lock().await.values().cloned().collect()
    }
}

#[async_trait]
impl ExpiryScheduler for InMemoryExpiryQueue {
    async fn schedule_release(&self, task: ExpiryTask, fire_after: Duration) -> Result<(), SchedulerError> {
        let seq = self.seq.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.tasks.lock().await.insert((fire_at(fire_after), seq), task);
        Ok(())
    }
}

#[async_trait]
impl ExpiryQueue for InMemoryExpiryQueue {
    async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ExpiryTask>, SchedulerError> {
        let mut tasks = self.tasks.lock().await;
        let due: Vec<(i64, u64)> = tasks
            .range(..=(now.timestamp_millis(), u64::MAX))
            .take(limit)
            .map(|(k, _)| *k)
            .collect();
        Ok(due.into_iter().filter_map(|k| tasks.remove(&k)).collect())
    }
}
