use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::capacity::{AzureResourceCriterion, CapacityManager, ServiceType};
use crate::continuation::{ContinuationResult, FinalStatus, HandlerError, OperationState};
use crate::providers::{VirtualMachineDeploymentManager, VirtualMachineProviderCreateInput};
use crate::resources::record::ResourceRecord;
use crate::resources::repository::{
    update_record_with_retry, ResourceRepository, RECORD_UPDATE_ATTEMPTS,
};
use crate::resources::strategies::{CreateResourceStrategy, StrategyRegistry, STEP_RETRY_INTERVAL};
use crate::resources::types::{
    ComponentInput, CreateResourceInput, ResourceComponent, ResourceCreationState, ResourceType,
};

/// Composite VM creation: fan out dependent components (input queue, NIC),
/// hold until all of them are final, then drive the actual VM deployment.
///
/// The two stages are explicit in `ResourceCreationState`; which one a hop
/// runs is carried in the input, so any worker can resume the operation.
pub struct CreateComputeWithComponentsStrategy {
    capacity: Arc<dyn CapacityManager>,
    deployment_manager: Arc<VirtualMachineDeploymentManager>,
    repository: Arc<dyn ResourceRepository>,
    component_strategies: Arc<StrategyRegistry>,
}

impl CreateComputeWithComponentsStrategy {
    pub fn new(
        capacity: Arc<dyn CapacityManager>,
        deployment_manager: Arc<VirtualMachineDeploymentManager>,
        repository: Arc<dyn ResourceRepository>,
        component_strategies: Arc<StrategyRegistry>,
    ) -> Self {
        Self {
            capacity,
            deployment_manager,
            repository,
            component_strategies,
        }
    }

    /// Resume path: the VM reattaches an existing OS disk, so placement and
    /// the input queue are inherited from the disk instead of re-selected.
    async fn build_from_existing_disk(
        &self,
        input: &mut CreateResourceInput,
        disk_id: Uuid,
    ) -> Result<(), HandlerError> {
        let disk_record = self
            .repository
            .get(disk_id)
            .await?
            .ok_or_else(|| HandlerError::fault(format!("os disk record not found: {disk_id}")))?;
        let disk_info = disk_record.azure_resource_info.clone().ok_or_else(|| {
            HandlerError::fault(format!("os disk {disk_id} has no provisioned resource"))
        })?;

        input.resource_location = Some(crate::capacity::AzureResourceLocation {
            subscription_id: disk_info.subscription_id,
            resource_group: disk_info.resource_group.clone(),
            location: disk_record.location,
        });

        // The disk itself needs no creation work; it rides along as an
        // already-final component that deletion must leave alone.
        input.custom_components.push(
            ResourceComponent::new(ResourceType::OsDisk)
                .with_azure_resource_info(disk_info)
                .with_preserve(true)
                .with_resource_record_id(disk_id),
        );

        // Reuse the disk's queue; ownership moves to the VM after the
        // deployment succeeds.
        if let Some(queue) = disk_record.component_of_type(ResourceType::InputQueue) {
            input.custom_components.push(queue.clone());
        }

        info!(disk_id = %disk_id, "💽 VM creation resuming from existing OS disk");
        Ok(())
    }

    async fn select_placement(&self, input: &mut CreateResourceInput) -> Result<(), HandlerError> {
        // Sku-family quota leads: it is the primary ordering key for
        // candidate subscriptions. Network quota is secondary.
        let criteria = [
            AzureResourceCriterion {
                service_type: ServiceType::Compute,
                quota: input.details.sku_family.clone(),
                required: input.details.cores,
            },
            AzureResourceCriterion {
                service_type: ServiceType::Network,
                quota: "virtual_networks".to_string(),
                required: 1,
            },
        ];
        let location = self
            .capacity
            .select_azure_resource_location(&criteria, input.details.location)
            .await?;
        input.resource_location = Some(location);
        Ok(())
    }

    fn has_component(&self, input: &CreateResourceInput, component_type: ResourceType) -> bool {
        input
            .custom_components
            .iter()
            .any(|c| c.component_type == component_type)
            || input
                .component_inputs
                .values()
                .any(|c| c.input.resource_type == component_type)
    }

    fn synthesize_component(
        input: &CreateResourceInput,
        component_type: ResourceType,
    ) -> ComponentInput {
        let component_id = Uuid::new_v4();
        let mut child = CreateResourceInput::new(
            component_id.to_string(),
            component_id,
            component_type,
            input.details.clone(),
            input.options.clone(),
        );
        child.resource_location = input.resource_location.clone();
        ComponentInput {
            component_id,
            input: child,
            status: Some(OperationState::NotStarted),
        }
    }

    /// One hop of the CreateComponent stage: run every non-final component
    /// concurrently, fold finished ones into the component list, and hold
    /// the stage until all are final.
    async fn create_components(
        &self,
        input: &mut CreateResourceInput,
        record: &ResourceRecord,
    ) -> Result<ContinuationResult, HandlerError> {
        let pending: Vec<ComponentInput> = input
            .component_inputs
            .values()
            .filter(|c| !c.status.is_final())
            .cloned()
            .collect();

        let outcomes = join_all(pending.into_iter().map(|component| async move {
            let component_id = component.component_id;
            (component_id, self.run_component(component, record).await)
        }))
        .await;

        // Apply every finished sibling before surfacing any error, so the
        // retried input does not redo their work.
        let mut first_error = None;
        for (component_id, outcome) in outcomes {
            match outcome {
                Ok(updated) => {
                    input.component_inputs.insert(component_id, updated);
                }
                Err(e) => {
                    warn!(component_id = %component_id, error = %e, "⚠️ Component step failed");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        // One failed component fails the parent outright; siblings are not
        // retried individually.
        if input.component_inputs.values().any(|c| {
            matches!(
                c.status,
                Some(OperationState::Failed) | Some(OperationState::Cancelled)
            )
        }) {
            return Ok(ContinuationResult::failed("ComponentCreationFailed"));
        }

        for component in input.component_inputs.values() {
            if component.status == Some(OperationState::Succeeded)
                && !input
                    .custom_components
                    .iter()
                    .any(|c| c.component_id == component.component_id)
            {
                input.custom_components.push(ResourceComponent {
                    component_id: component.component_id,
                    component_type: component.input.resource_type,
                    azure_resource_info: component.input.azure_resource_info.clone(),
                    preserve: false,
                    resource_record_id: None,
                });
            }
        }

        if input.component_inputs.values().any(|c| !c.status.is_final()) {
            return Ok(
                ContinuationResult::new(OperationState::InProgress)
                    .with_retry_after(STEP_RETRY_INTERVAL),
            );
        }

        input.stage = Some(ResourceCreationState::CreateResource);
        Ok(ContinuationResult::new(OperationState::InProgress).with_retry_after(STEP_RETRY_INTERVAL))
    }

    async fn run_component(
        &self,
        component: ComponentInput,
        record: &ResourceRecord,
    ) -> Result<ComponentInput, HandlerError> {
        let strategy = self
            .component_strategies
            .strategy_for(component.input.resource_type)?;

        let mut child = component.input;
        if child.stage.is_none() {
            strategy
                .build_create_operation_input(&mut child, record)
                .await?;
        }
        let result = strategy.run_create_operation(&mut child, record).await?;

        Ok(ComponentInput {
            component_id: component.component_id,
            input: child,
            status: Some(result.status),
        })
    }

    /// CreateResource stage: advance the ARM deployment and, on success,
    /// settle component ownership.
    async fn create_resource(
        &self,
        input: &mut CreateResourceInput,
    ) -> Result<ContinuationResult, HandlerError> {
        let resource_location = input
            .resource_location
            .clone()
            .ok_or_else(|| HandlerError::fault("compute creation lost its placement"))?;

        let provider_input = VirtualMachineProviderCreateInput {
            resource_id: input.resource_id,
            resource_location,
            sku_name: input.details.sku_name.clone(),
            image: input.details.image.clone(),
            components: input.custom_components.clone(),
            state: input.deployment_state.clone(),
        };

        let result = self.deployment_manager.create_compute(&provider_input).await?;
        match result.status {
            OperationState::Succeeded => {
                input.azure_resource_info = result.azure_resource_info;
                input.deployment_state = None;
                self.reassign_queue_component(input).await?;
                Ok(ContinuationResult::succeeded())
            }
            OperationState::Failed => Ok(ContinuationResult::failed(
                result
                    .error_reason
                    .unwrap_or_else(|| "DeploymentFailed".to_string()),
            )),
            _ => {
                input.deployment_state = result.next_state;
                Ok(ContinuationResult::new(OperationState::InProgress)
                    .with_retry_after(STEP_RETRY_INTERVAL))
            }
        }
    }

    /// Post-success fixup for the disk-resume path: the input queue belongs
    /// to whichever resource is live, so drop it from the disk's record now
    /// that the VM owns it.
    async fn reassign_queue_component(
        &self,
        input: &CreateResourceInput,
    ) -> Result<(), HandlerError> {
        let Some(disk_id) = input.options.os_disk_resource_id else {
            return Ok(());
        };

        update_record_with_retry(
            self.repository.as_ref(),
            disk_id,
            RECORD_UPDATE_ATTEMPTS,
            |record| {
                record
                    .components
                    .retain(|_, c| c.component_type != ResourceType::InputQueue);
            },
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CreateResourceStrategy for CreateComputeWithComponentsStrategy {
    fn resource_type(&self) -> ResourceType {
        ResourceType::ComputeVm
    }

    async fn build_create_operation_input(
        &self,
        input: &mut CreateResourceInput,
        _record: &ResourceRecord,
    ) -> Result<(), HandlerError> {
        match input.options.os_disk_resource_id {
            Some(disk_id) => self.build_from_existing_disk(input, disk_id).await?,
            None => self.select_placement(input).await?,
        }

        // Every VM gets an input queue; only reuse from the disk skips this.
        if !self.has_component(input, ResourceType::InputQueue) {
            let queue = Self::synthesize_component(input, ResourceType::InputQueue);
            input.component_inputs.insert(queue.component_id, queue);
        }

        // A NIC is synthesized only when the caller supplied a subnet;
        // otherwise the deployment creates its own network.
        if input.options.subnet_resource_id.is_some()
            && !self.has_component(input, ResourceType::NetworkInterface)
        {
            let nic = Self::synthesize_component(input, ResourceType::NetworkInterface);
            input.component_inputs.insert(nic.component_id, nic);
        }

        input.stage = Some(ResourceCreationState::CreateComponent);
        Ok(())
    }

    async fn run_create_operation(
        &self,
        input: &mut CreateResourceInput,
        record: &ResourceRecord,
    ) -> Result<ContinuationResult, HandlerError> {
        match input.stage {
            Some(ResourceCreationState::CreateComponent) => {
                self.create_components(input, record).await
            }
            Some(ResourceCreationState::CreateResource) => self.create_resource(input).await,
            None => Err(HandlerError::fault("creation stage not initialized")),
        }
    }
}
