//! pgmq-backed continuation queue.
//!
//! Thin wrapper around `PGMQueue` that pins down the semantics the engine
//! relies on: send with optional delay, batched visibility-timeout reads,
//! and explicit deletes.

use async_trait::async_trait;
use pgmq::PGMQueue;
use serde_json::Value;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, info};

use super::{ContinuationJobQueue, QueueError, QueuedMessage};

/// Continuation queue on top of pgmq.
pub struct PgmqContinuationQueue {
    pgmq: PGMQueue,
    queue_name: String,
}

impl PgmqContinuationQueue {
    /// Connect to PostgreSQL and ensure the queue exists.
    pub async fn connect(
        database_url: &str,
        queue_name: impl Into<String>,
    ) -> Result<Self, QueueError> {
        let queue_name = queue_name.into();
        info!("🚀 PGMQ: Connecting continuation queue '{}'", queue_name);

        let pgmq = PGMQueue::new(database_url.to_string())
            .await
            .map_err(|e| QueueError::connection(e.to_string()))?;

        pgmq.create(&queue_name)
            .await
            .map_err(|e| QueueError::connection(format!("create '{queue_name}': {e}")))?;

        info!("✅ PGMQ: Continuation queue '{}' ready", queue_name);
        Ok(Self { pgmq, queue_name })
    }

    /// Reuse an existing connection pool (shared with the rest of the service).
    pub async fn with_pool(pool: PgPool, queue_name: impl Into<String>) -> Result<Self, QueueError> {
        let queue_name = queue_name.into();
        let pgmq = PGMQueue::new_with_pool(pool).await;

        pgmq.create(&queue_name)
            .await
            .map_err(|e| QueueError::connection(format!("create '{queue_name}': {e}")))?;

        Ok(Self { pgmq, queue_name })
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }
}

#[async_trait]
impl ContinuationJobQueue for PgmqContinuationQueue {
    async fn add_message(&self, body: Value, initial_delay: Duration) -> Result<i64, QueueError> {
        let delay_secs = initial_delay.as_secs();
        let message_id = if delay_secs == 0 {
            self.pgmq
                .send(&self.queue_name, &body)
                .await
                .map_err(|e| QueueError::send(e.to_string()))?
        } else {
            self.pgmq
                .send_delay(&self.queue_name, &body, delay_secs)
                .await
                .map_err(|e| QueueError::send(e.to_string()))?
        };

        debug!(
            "📤 PGMQ: Sent message {} to '{}' (delay: {}s)",
            message_id, self.queue_name, delay_secs
        );
        Ok(message_id)
    }

    async fn get_messages(
        &self,
        visibility_timeout: Duration,
        limit: usize,
    ) -> Result<Vec<QueuedMessage>, QueueError> {
        let vt = visibility_timeout.as_secs() as i32;
        let messages = self
            .pgmq
            .read_batch::<Value>(&self.queue_name, Some(vt), limit as i32)
            .await
            .map_err(|e| QueueError::read(e.to_string()))?
            .unwrap_or_default();

        if !messages.is_empty() {
            debug!(
                "📥 PGMQ: Read {} message(s) from '{}'",
                messages.len(),
                self.queue_name
            );
        }

        Ok(messages
            .into_iter()
            .map(|m| QueuedMessage {
                message_id: m.msg_id,
                dequeue_count: m.read_ct,
                enqueued_at: m.enqueued_at,
                body: m.message,
            })
            .collect())
    }

    async fn delete_message(&self, message_id: i64) -> Result<(), QueueError> {
        self.pgmq
            .delete(&self.queue_name, message_id)
            .await
            .map_err(|e| QueueError::delete(message_id, e.to_string()))?;

        debug!(
            "🗑️ PGMQ: Deleted message {} from '{}'",
            message_id, self.queue_name
        );
        Ok(())
    }
}
