use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::continuation::payload::ContinuationQueuePayload;
use crate::messaging::{ContinuationJobQueue, QueueError, QueuedMessage};

/// Durable queue access with a client-side read-ahead cache.
///
/// The cache only amortizes round trips across workers; a miss falls through
/// to a direct fetch, so nothing is correct only-with-cache.
pub struct ContinuationMessagePump {
    queue: Arc<dyn ContinuationJobQueue>,
    cache: Mutex<VecDeque<QueuedMessage>>,
    target_worker_count: usize,
    visibility_timeout: Duration,
}

impl ContinuationMessagePump {
    pub fn new(
        queue: Arc<dyn ContinuationJobQueue>,
        target_worker_count: usize,
        visibility_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            cache: Mutex::new(VecDeque::new()),
            target_worker_count,
            visibility_timeout,
        }
    }

    /// Refill the read-ahead cache when it drops below half the worker
    /// count. Fetches at most `target - cached` messages so a burst never
    /// over-leases. Returns how many messages were pulled in.
    pub async fn try_populate_cache(&self) -> Result<usize, QueueError> {
        let cached = self.cache.lock().len();
        if cached >= self.target_worker_count / 2 {
            return Ok(0);
        }

        let fetch_limit = self.target_worker_count - cached;
        let messages = self
            .queue
            .get_messages(self.visibility_timeout, fetch_limit)
            .await?;
        let fetched = messages.len();
        if fetched > 0 {
            debug!("📥 Pump: cached {} prefetched message(s)", fetched);
            self.cache.lock().extend(messages);
        }
        Ok(fetched)
    }

    /// Next message for a worker: cache first, direct single fetch on miss.
    pub async fn get_message(&self) -> Result<Option<QueuedMessage>, QueueError> {
        if let Some(message) = self.cache.lock().pop_front() {
            return Ok(Some(message));
        }

        let mut messages = self.queue.get_messages(self.visibility_timeout, 1).await?;
        Ok(messages.pop())
    }

    /// Enqueue a payload, invisible for `delay`. The delay is the engine's
    /// retry/backoff primitive.
    pub async fn push_message(
        &self,
        payload: &ContinuationQueuePayload,
        delay: Duration,
    ) -> Result<i64, QueueError> {
        let body = serde_json::to_value(payload)?;
        let message_id = self.queue.add_message(body, delay).await?;
        debug!(
            target = %payload.target,
            tracking_id = %payload.tracking_id,
            step = payload.step_count,
            message_id,
            "📤 Pump: pushed continuation payload"
        );
        Ok(message_id)
    }

    /// Acknowledge one message. Must be called exactly once per dequeued
    /// message, success or not.
    pub async fn delete_message(&self, message_id: i64) -> Result<(), QueueError> {
        self.queue.delete_message(message_id).await
    }

    pub fn cache_size(&self) -> usize {
        self.cache.lock().len()
    }
}
