use async_trait::async_trait;
use std::time::Duration;

use crate::continuation::payload::{ContinuationInput, ContinuationResult};
use crate::providers::ProviderError;
use crate::resources::repository::RepositoryError;

/// How a continuation step failed.
///
/// The two variants drive opposite dispatch decisions: a transient fault
/// repeats the same step later with its input untouched, while a hard fault
/// terminates the operation.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("Temporarily unavailable: {reason} (retry after {retry_after:?})")]
    TemporarilyUnavailable {
        reason: String,
        retry_after: Duration,
    },

    #[error("Operation fault: {0}")]
    Fault(String),
}

impl HandlerError {
    pub fn temporarily_unavailable(reason: impl Into<String>, retry_after: Duration) -> Self {
        Self::TemporarilyUnavailable {
            reason: reason.into(),
            retry_after,
        }
    }

    pub fn fault(reason: impl Into<String>) -> Self {
        Self::Fault(reason.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TemporarilyUnavailable { .. })
    }
}

impl From<RepositoryError> for HandlerError {
    fn from(error: RepositoryError) -> Self {
        Self::Fault(error.to_string())
    }
}

impl From<ProviderError> for HandlerError {
    fn from(error: ProviderError) -> Self {
        Self::Fault(error.to_string())
    }
}

/// One step of a long-running operation.
///
/// Implementations are invoked once per queue hop with the input the
/// previous hop produced, and report where the operation stands now.
#[async_trait]
pub trait ContinuationHandler: Send + Sync {
    /// Name payloads are dispatched by.
    fn target(&self) -> &str;

    async fn continue_operation(
        &self,
        input: ContinuationInput,
    ) -> Result<ContinuationResult, HandlerError>;
}
