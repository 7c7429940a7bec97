use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::continuation::{ContinuationResult, HandlerError};
use crate::providers::QueueProvider;
use crate::resources::record::ResourceRecord;
use crate::resources::strategies::CreateResourceStrategy;
use crate::resources::types::{CreateResourceInput, ResourceCreationState, ResourceType};

/// Conventional name for a VM's input queue.
pub fn input_queue_name(resource_id: Uuid) -> String {
    format!("vm-input-{resource_id}")
}

/// Creates the storage queue a VM receives commands on. Single-step:
/// placement must already be decided by whoever composed this strategy.
pub struct CreateInputQueueStrategy {
    queue_provider: Arc<dyn QueueProvider>,
}

impl CreateInputQueueStrategy {
    pub fn new(queue_provider: Arc<dyn QueueProvider>) -> Self {
        Self { queue_provider }
    }
}

#[async_trait]
impl CreateResourceStrategy for CreateInputQueueStrategy {
    fn resource_type(&self) -> ResourceType {
        ResourceType::InputQueue
    }

    async fn build_create_operation_input(
        &self,
        input: &mut CreateResourceInput,
        _record: &ResourceRecord,
    ) -> Result<(), HandlerError> {
        if input.resource_location.is_none() {
            return Err(HandlerError::fault(
                "input queue creation requires a resolved resource location",
            ));
        }
        input.stage = Some(ResourceCreationState::CreateResource);
        Ok(())
    }

    async fn run_create_operation(
        &self,
        input: &mut CreateResourceInput,
        _record: &ResourceRecord,
    ) -> Result<ContinuationResult, HandlerError> {
        let location = input
            .resource_location
            .as_ref()
            .ok_or_else(|| HandlerError::fault("input queue creation lost its location"))?;

        let queue_name = input_queue_name(input.resource_id);
        // A queue that cannot be created is a failed step, not a fault: the
        // parent folds it into its own failure and reason.
        match self.queue_provider.create_queue(location, &queue_name).await {
            Ok(info) => {
                input.azure_resource_info = Some(info);
                Ok(ContinuationResult::succeeded())
            }
            Err(e) => {
                warn!(queue_name = %queue_name, error = %e, "⚠️ Input queue creation failed");
                Ok(ContinuationResult::failed(e.to_string()))
            }
        }
    }
}
