use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use crate::continuation::state::OperationState;
use crate::resources::types::{CreateResourceInput, DeleteResourceInput};

/// Typed input for one continuation step. The variant tag travels with the
/// payload so a worker can decode without consulting the target name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContinuationInput {
    CreateResource(CreateResourceInput),
    DeleteResource(DeleteResourceInput),
}

impl ContinuationInput {
    pub fn continuation_token(&self) -> &str {
        match self {
            Self::CreateResource(input) => &input.continuation_token,
            Self::DeleteResource(input) => &input.continuation_token,
        }
    }

    /// Identifier of the resource this operation acts on.
    pub fn resource_id(&self) -> Uuid {
        match self {
            Self::CreateResource(input) => input.resource_id,
            Self::DeleteResource(input) => input.resource_id,
        }
    }

    /// Clone of this input carrying `token` for the next step. An empty token
    /// means there is nothing to resume, so no input is produced.
    pub fn build_next_input(&self, token: &str) -> Option<Self> {
        if token.is_empty() {
            return None;
        }
        let mut next = self.clone();
        match &mut next {
            Self::CreateResource(input) => input.continuation_token = token.to_string(),
            Self::DeleteResource(input) => input.continuation_token = token.to_string(),
        }
        Some(next)
    }
}

/// Outcome of one continuation step, reported by a handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuationResult {
    pub status: OperationState,
    /// Delay before the next step becomes visible to workers.
    #[serde(default)]
    pub retry_after: Duration,
    /// Input for the next step; `None` once the operation is final.
    pub next_input: Option<ContinuationInput>,
    pub error_reason: Option<String>,
}

impl ContinuationResult {
    pub fn new(status: OperationState) -> Self {
        Self {
            status,
            retry_after: Duration::ZERO,
            next_input: None,
            error_reason: None,
        }
    }

    pub fn succeeded() -> Self {
        Self::new(OperationState::Succeeded)
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            error_reason: Some(reason.into()),
            ..Self::new(OperationState::Failed)
        }
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = retry_after;
        self
    }

    pub fn with_next_input(mut self, next_input: ContinuationInput) -> Self {
        self.next_input = Some(next_input);
        self
    }

    pub fn with_error_reason(mut self, reason: impl Into<String>) -> Self {
        self.error_reason = Some(reason.into());
        self
    }
}

/// Envelope for one hop of an operation on the continuation queue. The
/// payload carries everything a worker needs; no state lives outside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuationQueuePayload {
    /// Handler name this payload is dispatched to.
    pub target: String,
    /// Stable across every hop of one operation.
    pub tracking_id: String,
    /// Regenerated on every hop.
    pub tracking_instance_id: Uuid,
    /// When the operation was originally triggered; staleness is judged
    /// against this, never against hop time.
    pub created: DateTime<Utc>,
    /// Number of hops so far.
    pub step_count: u32,
    /// Input for this step; `None` marks a terminal notification.
    pub input: Option<ContinuationInput>,
    /// Status reported by the previous step; `None` on the first hop.
    pub status: Option<OperationState>,
    /// Delay the previous step requested before this one runs.
    #[serde(default)]
    pub retry_after: Duration,
    /// Diagnostic fields propagated into every log span for the operation.
    #[serde(default)]
    pub logger_properties: HashMap<String, String>,
}

impl ContinuationQueuePayload {
    pub fn new(
        target: impl Into<String>,
        input: ContinuationInput,
        tracking_id: Option<String>,
        logger_properties: HashMap<String, String>,
    ) -> Self {
        let tracking_instance_id = Uuid::new_v4();
        Self {
            target: target.into(),
            tracking_id: tracking_id.unwrap_or_else(|| tracking_instance_id.to_string()),
            tracking_instance_id,
            created: Utc::now(),
            step_count: 0,
            input: Some(input),
            status: None,
            retry_after: Duration::ZERO,
            logger_properties,
        }
    }

    /// Envelope for the step after this one: fresh instance id, bumped step
    /// count, original trigger time preserved. Input and status are left for
    /// the dispatcher to fill.
    pub fn next_hop(&self) -> Self {
        Self {
            target: self.target.clone(),
            tracking_id: self.tracking_id.clone(),
            tracking_instance_id: Uuid::new_v4(),
            created: self.created,
            step_count: self.step_count + 1,
            input: None,
            status: None,
            retry_after: Duration::ZERO,
            logger_properties: self.logger_properties.clone(),
        }
    }

    pub fn with_logger_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.logger_properties.insert(key.into(), value.into());
        self
    }
}
