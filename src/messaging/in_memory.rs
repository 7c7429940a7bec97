//! In-process continuation queue.
//!
//! Mirrors the pgmq semantics the engine depends on (initial delay,
//! visibility timeout, per-lease dequeue counting) without a database.
//! Used by tests and by single-process deployments.
//!
//! ## Usage
//!
//! ```rust
//! use nimbus_core::messaging::{ContinuationJobQueue, InMemoryJobQueue};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let queue = InMemoryJobQueue::new();
//! queue
//!     .add_message(json!({"target": "job_create_resource"}), Duration::ZERO)
//!     .await
//!     .unwrap();
//!
//! let leased = queue.get_messages(Duration::from_secs(30), 10).await.unwrap();
//! assert_eq!(leased.len(), 1);
//! assert_eq!(leased[0].dequeue_count, 1);
//!
//! queue.delete_message(leased[0].message_id).await.unwrap();
//! assert_eq!(queue.depth(), 0);
//! # });
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

use super::{ContinuationJobQueue, QueueError, QueuedMessage};

#[derive(Debug, Clone)]
struct StoredMessage {
    message_id: i64,
    body: Value,
    visible_at: Instant,
    dequeue_count: i32,
    enqueued_at: DateTime<Utc>,
}

/// Queue backed by a mutex-guarded vector.
#[derive(Default)]
pub struct InMemoryJobQueue {
    messages: Mutex<Vec<StoredMessage>>,
    next_id: AtomicI64,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages currently stored, visible or not.
    pub fn depth(&self) -> usize {
        self.messages.lock().len()
    }

    /// Test support: overwrite the lease counter of one message.
    pub fn set_dequeue_count(&self, message_id: i64, dequeue_count: i32) {
        let mut messages = self.messages.lock();
        if let Some(message) = messages.iter_mut().find(|m| m.message_id == message_id) {
            message.dequeue_count = dequeue_count;
        }
    }

    /// Test support: cancel all pending delays and leases.
    pub fn make_all_visible(&self) {
        let now = Instant::now();
        for message in self.messages.lock().iter_mut() {
            message.visible_at = now;
        }
    }
}

#[async_trait]
impl ContinuationJobQueue for InMemoryJobQueue {
    async fn add_message(&self, body: Value, initial_delay: Duration) -> Result<i64, QueueError> {
        let message_id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.messages.lock().push(StoredMessage {
            message_id,
            body,
            visible_at: Instant::now() + initial_delay,
            dequeue_count: 0,
            enqueued_at: Utc::now(),
        });
        Ok(message_id)
    }

    async fn get_messages(
        &self,
        visibility_timeout: Duration,
        limit: usize,
    ) -> Result<Vec<QueuedMessage>, QueueError> {
        let now = Instant::now();
        let mut leased = Vec::new();
        let mut messages = self.messages.lock();

        for message in messages.iter_mut() {
            if leased.len() >= limit {
                break;
            }
            if message.visible_at > now {
                continue;
            }
            message.dequeue_count += 1;
            message.visible_at = now + visibility_timeout;
            leased.push(QueuedMessage {
                message_id: message.message_id,
                dequeue_count: message.dequeue_count,
                enqueued_at: message.enqueued_at,
                body: message.body.clone(),
            });
        }

        Ok(leased)
    }

    async fn delete_message(&self, message_id: i64) -> Result<(), QueueError> {
        self.messages.lock().retain(|m| m.message_id != message_id);
        Ok(())
    }
}
