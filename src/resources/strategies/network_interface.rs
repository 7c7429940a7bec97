use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::capacity::AzureResourceLocation;
use crate::continuation::{ContinuationResult, HandlerError};
use crate::providers::AzureResourceClient;
use crate::resources::record::ResourceRecord;
use crate::resources::strategies::CreateResourceStrategy;
use crate::resources::types::{CreateResourceInput, ResourceCreationState, ResourceType};

/// Creates a NIC on a caller-supplied subnet. The NIC lands in the
/// subscription and resource group that own the subnet, not in the VM's
/// brokered placement.
pub struct CreateNetworkInterfaceStrategy {
    client: Arc<dyn AzureResourceClient>,
}

impl CreateNetworkInterfaceStrategy {
    pub fn new(client: Arc<dyn AzureResourceClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CreateResourceStrategy for CreateNetworkInterfaceStrategy {
    fn resource_type(&self) -> ResourceType {
        ResourceType::NetworkInterface
    }

    async fn build_create_operation_input(
        &self,
        input: &mut CreateResourceInput,
        _record: &ResourceRecord,
    ) -> Result<(), HandlerError> {
        if input.options.subnet_resource_id.is_none() {
            return Err(HandlerError::fault(
                "network interface creation requires a subnet resource id",
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
        let subnet_resource_id = input
            .options
            .subnet_resource_id
            .clone()
            .ok_or_else(|| HandlerError::fault("network interface creation lost its subnet"))?;
        let location = input
            .resource_location
            .as_ref()
            .ok_or_else(|| HandlerError::fault("network interface creation lost its location"))?;

        let (subscription_id, resource_group) = parse_subnet_scope(&subnet_resource_id)?;
        let nic_location = AzureResourceLocation {
            subscription_id,
            resource_group,
            location: location.location,
        };

        let name = format!("nic-{}", input.resource_id);
        let info = self
            .client
            .create_network_interface(&nic_location, &name, &subnet_resource_id)
            .await?;
        input.azure_resource_info = Some(info);
        Ok(ContinuationResult::succeeded())
    }
}

/// Pull subscription and resource group out of an ARM subnet path:
/// `/subscriptions/{id}/resourceGroups/{name}/providers/...`.
fn parse_subnet_scope(subnet_resource_id: &str) -> Result<(Uuid, String), HandlerError> {
    let mut segments = subnet_resource_id.split('/');
    let mut subscription_id = None;
    let mut resource_group = None;

    while let Some(segment) = segments.next() {
        match segment {
            "subscriptions" => {
                subscription_id = segments.next().and_then(|s| Uuid::parse_str(s).ok());
            }
            "resourceGroups" => {
                resource_group = segments.next().map(str::to_string);
            }
            _ => {}
        }
    }

    match (subscription_id, resource_group) {
        (Some(subscription_id), Some(resource_group)) => Ok((subscription_id, resource_group)),
        _ => Err(HandlerError::fault(format!(
            "malformed subnet resource id: {subnet_resource_id}"
        ))),
    }
}
