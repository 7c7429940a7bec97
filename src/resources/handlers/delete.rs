use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::continuation::{
    ContinuationHandler, ContinuationInput, ContinuationResult, HandlerError, OperationState,
};
use crate::providers::VirtualMachineDeploymentManager;
use crate::resources::handlers::DELETE_RESOURCE_TARGET;
use crate::resources::record::ResourceOperation;
use crate::resources::repository::{
    update_record_with_retry, ResourceRepository, RECORD_UPDATE_ATTEMPTS,
};
use crate::resources::strategies::STEP_RETRY_INTERVAL;
use crate::resources::types::DeleteResourceInput;

/// Drives resource teardown through the phased deletion plan.
pub struct DeleteResourceHandler {
    repository: Arc<dyn ResourceRepository>,
    deployment_manager: Arc<VirtualMachineDeploymentManager>,
}

impl DeleteResourceHandler {
    pub fn new(
        repository: Arc<dyn ResourceRepository>,
        deployment_manager: Arc<VirtualMachineDeploymentManager>,
    ) -> Self {
        Self {
            repository,
            deployment_manager,
        }
    }

    /// First hop: take the resource out of rotation before any teardown
    /// call happens.
    async fn initially_queue(
        &self,
        input: &DeleteResourceInput,
    ) -> Result<ContinuationResult, HandlerError> {
        update_record_with_retry(
            self.repository.as_ref(),
            input.resource_id,
            RECORD_UPDATE_ATTEMPTS,
            |record| {
                record.is_ready = false;
                record.is_deleted = true;
                record.set_operation_status(
                    ResourceOperation::Deleting,
                    OperationState::Initialized,
                    None,
                );
            },
        )
        .await?;

        let mut next = input.clone();
        next.continuation_token = input.resource_id.to_string();
        Ok(
            ContinuationResult::new(OperationState::Initialized)
                .with_retry_after(STEP_RETRY_INTERVAL)
                .with_next_input(ContinuationInput::DeleteResource(next)),
        )
    }

    async fn fail_operation(&self, record_id: Uuid, reason: &str) {
        if let Err(e) = update_record_with_retry(
            self.repository.as_ref(),
            record_id,
            RECORD_UPDATE_ATTEMPTS,
            |record| {
                record.set_operation_status(
                    ResourceOperation::Deleting,
                    OperationState::Failed,
                    Some(reason),
                );
            },
        )
        .await
        {
            error!(record_id = %record_id, error = %e, "❌ Failed to record deletion failure");
        }
    }
}

#[async_trait]
impl ContinuationHandler for DeleteResourceHandler {
    fn target(&self) -> &str {
        DELETE_RESOURCE_TARGET
    }

    async fn continue_operation(
        &self,
        input: ContinuationInput,
    ) -> Result<ContinuationResult, HandlerError> {
        let ContinuationInput::DeleteResource(mut delete_input) = input else {
            return Err(HandlerError::fault(
                "delete handler received a non-delete input",
            ));
        };

        if delete_input.continuation_token.is_empty() {
            return self.initially_queue(&delete_input).await;
        }

        let record = self
            .repository
            .get(delete_input.resource_id)
            .await?
            .ok_or_else(|| {
                HandlerError::fault(format!(
                    "resource record not found: {}",
                    delete_input.resource_id
                ))
            })?;

        if record.deleting_status != Some(OperationState::InProgress) {
            update_record_with_retry(
                self.repository.as_ref(),
                record.id,
                RECORD_UPDATE_ATTEMPTS,
                |r| {
                    r.set_operation_status(
                        ResourceOperation::Deleting,
                        OperationState::InProgress,
                        None,
                    );
                },
            )
            .await?;
        }

        // The plan is built once and then rides inside the input.
        let mut state = match delete_input.resume_state.take() {
            Some(state) => state,
            None => self.deployment_manager.build_deletion_plan(&record),
        };

        match self.deployment_manager.check_delete_status(&mut state).await {
            Ok(OperationState::Succeeded) => {
                self.repository.delete(record.id).await?;
                info!(record_id = %record.id, "✅ Resource teardown complete");
                Ok(ContinuationResult::succeeded())
            }
            Ok(status) => {
                let mut next = delete_input.clone();
                next.resume_state = Some(state);
                Ok(ContinuationResult::new(status)
                    .with_retry_after(STEP_RETRY_INTERVAL)
                    .with_next_input(ContinuationInput::DeleteResource(next)))
            }
            Err(e) => {
                let reason = e.to_string();
                self.fail_operation(record.id, &reason).await;
                Ok(ContinuationResult::failed(reason))
            }
        }
    }
}
