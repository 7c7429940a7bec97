//! # Messaging Module
//!
//! PostgreSQL message queue (pgmq) based transport for continuation jobs.
//! The queue is the durability substrate: a message survives until a worker
//! deletes it, and redelivery after the visibility timeout is the retry
//! primitive the whole engine is built on.

pub mod in_memory;
pub mod pgmq_queue;

pub use in_memory::InMemoryJobQueue;
pub use pgmq_queue::PgmqContinuationQueue;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;

use crate::control_plane::AzureLocation;

/// Messaging layer errors.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue connection failed: {0}")]
    Connection(String),

    #[error("Failed to send message: {0}")]
    Send(String),

    #[error("Failed to read messages: {0}")]
    Read(String),

    #[error("Failed to delete message {message_id}: {reason}")]
    Delete { message_id: i64, reason: String },

    #[error("No continuation queue registered for region: {location}")]
    RegionNotRegistered { location: AzureLocation },

    #[error("Message serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl QueueError {
    pub fn connection(reason: impl Into<String>) -> Self {
        Self::Connection(reason.into())
    }

    pub fn send(reason: impl Into<String>) -> Self {
        Self::Send(reason.into())
    }

    pub fn read(reason: impl Into<String>) -> Self {
        Self::Read(reason.into())
    }

    pub fn delete(message_id: i64, reason: impl Into<String>) -> Self {
        Self::Delete {
            message_id,
            reason: reason.into(),
        }
    }
}

/// One message leased from the queue. The body stays as raw JSON; decoding
/// into a payload happens at the worker so a poison body can still be
/// counted and discarded.
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub message_id: i64,
    /// How many times this message has been leased, including this lease.
    pub dequeue_count: i32,
    pub enqueued_at: DateTime<Utc>,
    pub body: Value,
}

/// Transport seam for the continuation engine. Implementations must hand a
/// message to exactly one consumer at a time and redeliver it after the
/// visibility timeout unless it was deleted.
#[async_trait]
pub trait ContinuationJobQueue: Send + Sync {
    /// Enqueue a message, invisible for `initial_delay`. Returns the message id.
    async fn add_message(&self, body: Value, initial_delay: Duration) -> Result<i64, QueueError>;

    /// Lease up to `limit` messages, each invisible to other consumers for
    /// `visibility_timeout`.
    async fn get_messages(
        &self,
        visibility_timeout: Duration,
        limit: usize,
    ) -> Result<Vec<QueuedMessage>, QueueError>;

    /// Permanently remove a message.
    async fn delete_message(&self, message_id: i64) -> Result<(), QueueError>;
}
