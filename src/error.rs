//! # Structured Error Handling
//!
//! Each layer owns a `thiserror` enum (queue, continuation, handler,
//! repository, capacity, provider); everything converges into
//! [`BrokerError`] at the public API boundary.

use thiserror::Error;

use crate::capacity::CapacityError;
use crate::continuation::{ContinuationError, HandlerError};
use crate::messaging::QueueError;
use crate::providers::ProviderError;
use crate::resources::RepositoryError;

/// Top-level error for public broker operations.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Continuation error: {0}")]
    Continuation(#[from] ContinuationError),

    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Capacity error: {0}")]
    Capacity(#[from] CapacityError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl BrokerError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

pub type Result<T> = std::result::Result<T, BrokerError>;
