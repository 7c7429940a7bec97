use async_trait::async_trait;
use std::sync::Arc;

use crate::capacity::{AzureResourceCriterion, CapacityManager, ServiceType};
use crate::continuation::{ContinuationResult, HandlerError};
use crate::providers::BasicResourceProvider;
use crate::resources::record::ResourceRecord;
use crate::resources::strategies::CreateResourceStrategy;
use crate::resources::types::{CreateResourceInput, ResourceCreationState, ResourceType};

/// Strategy for single-call resources (file shares, key vaults): pick a
/// placement, issue one create, done.
pub struct CreateBasicResourceStrategy {
    resource_type: ResourceType,
    service_type: ServiceType,
    quota: &'static str,
    provider: Arc<dyn BasicResourceProvider>,
    capacity: Arc<dyn CapacityManager>,
}

impl CreateBasicResourceStrategy {
    pub fn file_share(
        provider: Arc<dyn BasicResourceProvider>,
        capacity: Arc<dyn CapacityManager>,
    ) -> Self {
        Self {
            resource_type: ResourceType::StorageFileShare,
            service_type: ServiceType::Storage,
            quota: "storage_accounts",
            provider,
            capacity,
        }
    }

    pub fn key_vault(
        provider: Arc<dyn BasicResourceProvider>,
        capacity: Arc<dyn CapacityManager>,
    ) -> Self {
        Self {
            resource_type: ResourceType::KeyVault,
            service_type: ServiceType::KeyVault,
            quota: "vaults",
            provider,
            capacity,
        }
    }
}

#[async_trait]
impl CreateResourceStrategy for CreateBasicResourceStrategy {
    fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    async fn build_create_operation_input(
        &self,
        input: &mut CreateResourceInput,
        _record: &ResourceRecord,
    ) -> Result<(), HandlerError> {
        if input.resource_location.is_none() {
            let criteria = [AzureResourceCriterion {
                service_type: self.service_type,
                quota: self.quota.to_string(),
                required: 1,
            }];
            let location = self
                .capacity
                .select_azure_resource_location(&criteria, input.details.location)
                .await?;
            input.resource_location = Some(location);
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
            .ok_or_else(|| HandlerError::fault("basic resource creation lost its location"))?;

        let info = self
            .provider
            .create_basic_resource(self.resource_type, input.resource_id, location)
            .await?;
        input.azure_resource_info = Some(info);
        Ok(ContinuationResult::succeeded())
    }
}
