use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use crate::continuation::handler::{ContinuationHandler, HandlerError};
use crate::continuation::payload::{
    ContinuationInput, ContinuationQueuePayload, ContinuationResult,
};
use crate::continuation::pump::ContinuationMessagePump;
use crate::continuation::state::{FinalStatus, OperationState};
use crate::control_plane::{AzureLocation, ControlPlaneInfo, CrossRegionMessagePump};
use crate::messaging::QueueError;

/// Dispatch-level errors. Handler outcomes (including faults) are not
/// errors here; they are encoded in the returned payload.
#[derive(Debug, thiserror::Error)]
pub enum ContinuationError {
    #[error("No handler registered for target: {target}")]
    NoHandlerFound { target: String },

    #[error("A handler is already registered for target: {target}")]
    DuplicateHandler { target: String },

    #[error("Failed to push continuation payload: {0}")]
    QueuePush(#[from] QueueError),
}

struct CrossRegionDispatch {
    control_plane: ControlPlaneInfo,
    pump: Arc<CrossRegionMessagePump>,
}

/// Owns the handler registry and drives exactly one step of exactly one
/// handler per call.
pub struct ContinuationActivator {
    handlers: HashMap<String, Arc<dyn ContinuationHandler>>,
    pump: Arc<ContinuationMessagePump>,
    cross_region: Option<CrossRegionDispatch>,
    max_operation_lifetime: Duration,
}

impl ContinuationActivator {
    pub fn new(pump: Arc<ContinuationMessagePump>, max_operation_lifetime: Duration) -> Self {
        Self {
            handlers: HashMap::new(),
            pump,
            cross_region: None,
            max_operation_lifetime,
        }
    }

    /// Enable cross-region dispatch for `execute_for_data_plane`.
    pub fn with_cross_region(
        mut self,
        control_plane: ControlPlaneInfo,
        pump: Arc<CrossRegionMessagePump>,
    ) -> Self {
        self.cross_region = Some(CrossRegionDispatch {
            control_plane,
            pump,
        });
        self
    }

    /// Register a handler under its target name. Exactly one handler per
    /// target; a second claimant is a configuration bug, not a tie to break.
    pub fn register_handler(
        &mut self,
        handler: Arc<dyn ContinuationHandler>,
    ) -> Result<(), ContinuationError> {
        let target = handler.target().to_string();
        if self.handlers.contains_key(&target) {
            return Err(ContinuationError::DuplicateHandler { target });
        }
        info!("✅ Activator: registered handler for '{}'", target);
        self.handlers.insert(target, handler);
        Ok(())
    }

    pub fn pump(&self) -> &Arc<ContinuationMessagePump> {
        &self.pump
    }

    /// Kick off an operation and run its first step inline. Non-final
    /// results are pushed to the durable queue before returning.
    pub async fn execute(
        &self,
        target: &str,
        input: ContinuationInput,
        tracking_id: Option<String>,
        logger_properties: HashMap<String, String>,
    ) -> Result<ContinuationResult, ContinuationError> {
        let payload = ContinuationQueuePayload::new(target, input, tracking_id, logger_properties);
        let (result, _next) = self.inner_continue(&payload).await?;
        Ok(result.unwrap_or_else(|| ContinuationResult::failed("OperationFailed")))
    }

    /// Region-aware kick-off. When another control plane owns the data-plane
    /// location, the payload is forwarded to that region's queue and the
    /// caller gets `Triggered` back without waiting (fire-and-forget).
    pub async fn execute_for_data_plane(
        &self,
        target: &str,
        data_plane_location: AzureLocation,
        input: ContinuationInput,
        tracking_id: Option<String>,
        logger_properties: HashMap<String, String>,
    ) -> Result<ContinuationResult, ContinuationError> {
        if let Some(cross_region) = &self.cross_region {
            if !cross_region.control_plane.owns_location(data_plane_location) {
                let payload =
                    ContinuationQueuePayload::new(target, input, tracking_id, logger_properties);
                cross_region
                    .pump
                    .push_message(data_plane_location, &payload)
                    .await?;
                info!(
                    target = %payload.target,
                    tracking_id = %payload.tracking_id,
                    location = %data_plane_location,
                    "🌐 Activator: forwarded operation to owning region"
                );
                return Ok(ContinuationResult::new(OperationState::Triggered));
            }
        }
        self.execute(target, input, tracking_id, logger_properties)
            .await
    }

    /// Queue-worker entry point: advance the payload one step and return the
    /// successor payload. A successor with final status (and no input) tells
    /// the worker the operation is over.
    pub async fn continue_payload(
        &self,
        payload: &ContinuationQueuePayload,
    ) -> Result<ContinuationQueuePayload, ContinuationError> {
        let (_result, next) = self.inner_continue(payload).await?;
        Ok(next)
    }

    /// One step: resolve the handler, run it, then decide between advancing,
    /// retrying the same input, or abandoning the operation.
    #[instrument(
        skip_all,
        fields(
            target = %payload.target,
            tracking_id = %payload.tracking_id,
            instance_id = %payload.tracking_instance_id,
            step = payload.step_count,
        )
    )]
    async fn inner_continue(
        &self,
        payload: &ContinuationQueuePayload,
    ) -> Result<(Option<ContinuationResult>, ContinuationQueuePayload), ContinuationError> {
        let handler = self
            .handlers
            .get(&payload.target)
            .ok_or_else(|| ContinuationError::NoHandlerFound {
                target: payload.target.clone(),
            })?;

        let mut next = payload.next_hop();

        let result = match &payload.input {
            None => {
                // Terminal payloads are never re-enqueued, so a worker should
                // not see one. Abandon rather than guess.
                warn!("⚠️ Activator: payload arrived without input");
                None
            }
            Some(input) => match handler.continue_operation(input.clone()).await {
                Ok(result) => Some(result),
                Err(HandlerError::TemporarilyUnavailable {
                    reason,
                    retry_after,
                }) => {
                    // Backpressure, not failure: retry the same step verbatim
                    // after the requested delay.
                    info!(
                        reason = %reason,
                        retry_after_secs = retry_after.as_secs(),
                        "⏳ Activator: step temporarily unavailable"
                    );
                    Some(
                        ContinuationResult::new(
                            payload.status.unwrap_or(OperationState::NotStarted),
                        )
                        .with_retry_after(retry_after)
                        .with_next_input(input.clone()),
                    )
                }
                Err(HandlerError::Fault(reason)) => {
                    error!(reason = %reason, "❌ Activator: handler fault");
                    None
                }
            },
        };

        // Wall-clock bound on the whole operation, measured from the original
        // trigger. A stale operation fails no matter what the handler said.
        let result = if self.within_lifetime(payload) {
            result
        } else {
            warn!(
                created = %payload.created,
                lifetime_secs = self.max_operation_lifetime.as_secs(),
                "⌛ Activator: operation exceeded its maximum lifetime"
            );
            None
        };

        match result {
            Some(result) => {
                next.status = Some(result.status);
                next.input = result.next_input.clone();
                next.retry_after = result.retry_after;

                if !next.status.is_final() {
                    self.pump.push_message(&next, next.retry_after).await?;
                }
                Ok((Some(result), next))
            }
            None => {
                next.status = Some(OperationState::Failed);
                next.input = None;
                Ok((None, next))
            }
        }
    }

    fn within_lifetime(&self, payload: &ContinuationQueuePayload) -> bool {
        match Utc::now().signed_duration_since(payload.created).to_std() {
            Ok(elapsed) => elapsed <= self.max_operation_lifetime,
            // A future-dated trigger is clock skew, not staleness.
            Err(_) => true,
        }
    }
}
