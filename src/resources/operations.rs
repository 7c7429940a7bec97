use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::continuation::{ContinuationActivator, ContinuationInput, ContinuationResult};
use crate::error::Result;
use crate::providers::{ProviderError, VirtualMachineDeploymentManager};
use crate::resources::handlers::{CREATE_RESOURCE_TARGET, DELETE_RESOURCE_TARGET};
use crate::resources::repository::{RepositoryError, ResourceRepository};
use crate::resources::types::{
    CreateResourceInput, CreateResourceOptions, DeleteResourceInput, ResourceDetails, ResourceType,
};

/// Caller-facing facade over the continuation engine: kick off lifecycle
/// operations and send running VMs their commands.
pub struct ResourceContinuationOperations {
    activator: Arc<ContinuationActivator>,
    repository: Arc<dyn ResourceRepository>,
    deployment_manager: Arc<VirtualMachineDeploymentManager>,
}

impl ResourceContinuationOperations {
    pub fn new(
        activator: Arc<ContinuationActivator>,
        repository: Arc<dyn ResourceRepository>,
        deployment_manager: Arc<VirtualMachineDeploymentManager>,
    ) -> Self {
        Self {
            activator,
            repository,
            deployment_manager,
        }
    }

    /// Start provisioning a resource. The first step runs inline (or is
    /// forwarded to the owning region); the rest happens on the queue.
    /// Returns the new resource id alongside the first step's result.
    #[instrument(skip_all, fields(resource_type = %resource_type, reason = %reason))]
    pub async fn create_resource(
        &self,
        resource_type: ResourceType,
        details: ResourceDetails,
        options: CreateResourceOptions,
        reason: &str,
    ) -> Result<(Uuid, ContinuationResult)> {
        let resource_id = Uuid::new_v4();
        let location = details.location;
        let input = ContinuationInput::CreateResource(CreateResourceInput::new(
            "",
            resource_id,
            resource_type,
            details,
            options,
        ));

        info!(resource_id = %resource_id, "🚀 Resource creation triggered");
        let result = self
            .activator
            .execute_for_data_plane(
                CREATE_RESOURCE_TARGET,
                location,
                input,
                Some(resource_id.to_string()),
                HashMap::from([("reason".to_string(), reason.to_string())]),
            )
            .await?;
        Ok((resource_id, result))
    }

    /// Start tearing a resource down.
    #[instrument(skip_all, fields(resource_id = %resource_id, reason = %reason))]
    pub async fn delete_resource(
        &self,
        resource_id: Uuid,
        reason: &str,
    ) -> Result<ContinuationResult> {
        let record = self
            .repository
            .get(resource_id)
            .await?
            .ok_or(RepositoryError::NotFound(resource_id))?;

        let input =
            ContinuationInput::DeleteResource(DeleteResourceInput::new("", resource_id));

        info!(resource_id = %resource_id, "🗑️ Resource deletion triggered");
        let result = self
            .activator
            .execute_for_data_plane(
                DELETE_RESOURCE_TARGET,
                record.location,
                input,
                Some(resource_id.to_string()),
                HashMap::from([("reason".to_string(), reason.to_string())]),
            )
            .await?;
        Ok(result)
    }

    /// Tell a provisioned VM to start its environment.
    pub async fn start_compute(
        &self,
        resource_id: Uuid,
        parameters: HashMap<String, String>,
    ) -> Result<()> {
        let (queue_info, parameters) = self.vm_command_context(resource_id, parameters).await?;
        self.deployment_manager
            .start_compute(&queue_info, parameters)
            .await?;
        Ok(())
    }

    /// Tell a provisioned VM to shut its environment down.
    pub async fn shutdown_compute(
        &self,
        resource_id: Uuid,
        parameters: HashMap<String, String>,
    ) -> Result<()> {
        let (queue_info, parameters) = self.vm_command_context(resource_id, parameters).await?;
        self.deployment_manager
            .shutdown_compute(&queue_info, parameters)
            .await?;
        Ok(())
    }

    async fn vm_command_context(
        &self,
        resource_id: Uuid,
        mut parameters: HashMap<String, String>,
    ) -> Result<(crate::resources::types::AzureResourceInfo, HashMap<String, String>)> {
        let record = self
            .repository
            .get(resource_id)
            .await?
            .ok_or(RepositoryError::NotFound(resource_id))?;

        let queue_info = record
            .component_of_type(ResourceType::InputQueue)
            .and_then(|c| c.azure_resource_info.clone())
            .ok_or_else(|| {
                ProviderError::invalid_input(format!(
                    "resource {resource_id} has no input queue component"
                ))
            })?;

        parameters.insert("sku_name".to_string(), record.sku_name.clone());
        Ok((queue_info, parameters))
    }
}
