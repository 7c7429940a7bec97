use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

use crate::continuation::{
    ContinuationHandler, ContinuationInput, ContinuationMessagePump, ContinuationQueuePayload,
    ContinuationResult, HandlerError, OperationState,
};
use crate::resources::handlers::{CREATE_RESOURCE_TARGET, DELETE_RESOURCE_TARGET};
use crate::resources::record::{ResourceOperation, ResourceRecord};
use crate::resources::repository::{
    update_record_with_retry, ResourceRepository, RECORD_UPDATE_ATTEMPTS,
};
use crate::resources::strategies::{StrategyRegistry, STEP_RETRY_INTERVAL};
use crate::resources::types::{CreateResourceInput, DeleteResourceInput, ResourceComponent};

/// Drives resource creation: record bookkeeping around a per-type strategy.
pub struct CreateResourceHandler {
    repository: Arc<dyn ResourceRepository>,
    strategies: Arc<StrategyRegistry>,
    /// Failed creations enqueue their own teardown here.
    cleanup_pump: Arc<ContinuationMessagePump>,
}

impl CreateResourceHandler {
    pub fn new(
        repository: Arc<dyn ResourceRepository>,
        strategies: Arc<StrategyRegistry>,
        cleanup_pump: Arc<ContinuationMessagePump>,
    ) -> Self {
        Self {
            repository,
            strategies,
            cleanup_pump,
        }
    }

    /// First hop: persist the record so the resource is visible (and
    /// accountable) before any provider call happens.
    async fn initially_queue(
        &self,
        input: &CreateResourceInput,
    ) -> Result<ContinuationResult, HandlerError> {
        let mut record = ResourceRecord::new(
            input.resource_id,
            input.resource_type,
            input.details.location,
            input.details.sku_name.clone(),
        );
        record.set_operation_status(
            ResourceOperation::Provisioning,
            OperationState::Initialized,
            None,
        );
        self.repository.create(record).await?;

        let mut next = input.clone();
        next.continuation_token = input.resource_id.to_string();
        Ok(
            ContinuationResult::new(OperationState::Initialized)
                .with_retry_after(STEP_RETRY_INTERVAL)
                .with_next_input(ContinuationInput::CreateResource(next)),
        )
    }

    /// Transient faults propagate for verbatim retry; hard faults terminate
    /// the operation with the failure recorded and cleanup queued.
    async fn fault_to_failed(
        &self,
        record_id: Uuid,
        error: HandlerError,
    ) -> Result<ContinuationResult, HandlerError> {
        match error {
            e @ HandlerError::TemporarilyUnavailable { .. } => Err(e),
            HandlerError::Fault(reason) => {
                self.fail_operation(record_id, &reason).await;
                Ok(ContinuationResult::failed(reason))
            }
        }
    }

    /// Record the failure and queue a delete operation for whatever was
    /// partially provisioned. Both are best-effort: the operation is
    /// already failing.
    async fn fail_operation(&self, record_id: Uuid, reason: &str) {
        if let Err(e) = update_record_with_retry(
            self.repository.as_ref(),
            record_id,
            RECORD_UPDATE_ATTEMPTS,
            |record| {
                record.set_operation_status(
                    ResourceOperation::Provisioning,
                    OperationState::Failed,
                    Some(reason),
                );
            },
        )
        .await
        {
            error!(record_id = %record_id, error = %e, "❌ Failed to record creation failure");
        }

        let cleanup = ContinuationQueuePayload::new(
            DELETE_RESOURCE_TARGET,
            ContinuationInput::DeleteResource(DeleteResourceInput::new("", record_id)),
            Some(record_id.to_string()),
            HashMap::from([("reason".to_string(), "FailedCreateCleanup".to_string())]),
        );
        match self.cleanup_pump.push_message(&cleanup, Duration::ZERO).await {
            Ok(_) => info!(record_id = %record_id, "🧹 Queued cleanup for failed creation"),
            Err(e) => {
                error!(record_id = %record_id, error = %e, "❌ Failed to queue cleanup")
            }
        }
    }

    async fn persist_success(
        &self,
        input: &CreateResourceInput,
    ) -> Result<(), HandlerError> {
        let components: HashMap<Uuid, ResourceComponent> = input
            .custom_components
            .iter()
            .map(|c| (c.component_id, c.clone()))
            .collect();
        let azure_resource_info = input.azure_resource_info.clone();

        update_record_with_retry(
            self.repository.as_ref(),
            input.resource_id,
            RECORD_UPDATE_ATTEMPTS,
            move |record| {
                record.is_ready = true;
                record.azure_resource_info = azure_resource_info.clone();
                record.components = components.clone();
                record.set_operation_status(
                    ResourceOperation::Provisioning,
                    OperationState::Succeeded,
                    None,
                );
            },
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ContinuationHandler for CreateResourceHandler {
    fn target(&self) -> &str {
        CREATE_RESOURCE_TARGET
    }

    async fn continue_operation(
        &self,
        input: ContinuationInput,
    ) -> Result<ContinuationResult, HandlerError> {
        let ContinuationInput::CreateResource(mut create_input) = input else {
            return Err(HandlerError::fault(
                "create handler received a non-create input",
            ));
        };

        if create_input.continuation_token.is_empty() {
            return self.initially_queue(&create_input).await;
        }

        let mut record = self
            .repository
            .get(create_input.resource_id)
            .await?
            .ok_or_else(|| {
                HandlerError::fault(format!(
                    "resource record not found: {}",
                    create_input.resource_id
                ))
            })?;

        if record.provisioning_status != Some(OperationState::InProgress) {
            record = update_record_with_retry(
                self.repository.as_ref(),
                record.id,
                RECORD_UPDATE_ATTEMPTS,
                |r| {
                    r.set_operation_status(
                        ResourceOperation::Provisioning,
                        OperationState::InProgress,
                        None,
                    );
                },
            )
            .await?;
        }

        let strategy = match self.strategies.strategy_for(create_input.resource_type) {
            Ok(strategy) => strategy,
            Err(e) => return self.fault_to_failed(record.id, e.into()).await,
        };

        if create_input.stage.is_none() {
            if let Err(e) = strategy
                .build_create_operation_input(&mut create_input, &record)
                .await
            {
                return self.fault_to_failed(record.id, e).await;
            }
        }

        let result = match strategy
            .run_create_operation(&mut create_input, &record)
            .await
        {
            Ok(result) => result,
            Err(e) => return self.fault_to_failed(record.id, e).await,
        };

        match result.status {
            OperationState::Succeeded => {
                self.persist_success(&create_input).await?;
                info!(record_id = %record.id, "✅ Resource creation succeeded");
                Ok(ContinuationResult::succeeded())
            }
            OperationState::Failed | OperationState::Cancelled => {
                let reason = result
                    .error_reason
                    .clone()
                    .unwrap_or_else(|| "CreateFailed".to_string());
                self.fail_operation(record.id, &reason).await;
                Ok(result)
            }
            _ => {
                // Non-final: carry the mutated input forward unless the
                // strategy already produced a next input itself.
                let mut result = result;
                if result.next_input.is_none() {
                    result.next_input =
                        Some(ContinuationInput::CreateResource(create_input.clone()));
                }
                Ok(result)
            }
        }
    }
}
