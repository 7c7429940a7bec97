use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::continuation::OperationState;
use crate::control_plane::AzureLocation;
use crate::resources::types::{AzureResourceInfo, ResourceComponent, ResourceType};

/// Which lifecycle operation a status update applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceOperation {
    Provisioning,
    Deleting,
}

/// Persisted record of one brokered resource and its attached components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: Uuid,
    pub resource_type: ResourceType,
    pub location: AzureLocation,
    pub sku_name: String,
    /// Provisioned and usable.
    pub is_ready: bool,
    /// Handed out to an environment.
    pub is_assigned: bool,
    /// Teardown has been requested or completed.
    pub is_deleted: bool,
    pub provisioning_status: Option<OperationState>,
    pub provisioning_reason: Option<String>,
    pub deleting_status: Option<OperationState>,
    pub deleting_reason: Option<String>,
    pub azure_resource_info: Option<AzureResourceInfo>,
    #[serde(default)]
    pub components: HashMap<Uuid, ResourceComponent>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    /// Bumped by the repository on every committed update.
    pub version: u64,
}

impl ResourceRecord {
    pub fn new(
        id: Uuid,
        resource_type: ResourceType,
        location: AzureLocation,
        sku_name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            resource_type,
            location,
            sku_name: sku_name.into(),
            is_ready: false,
            is_assigned: false,
            is_deleted: false,
            provisioning_status: None,
            provisioning_reason: None,
            deleting_status: None,
            deleting_reason: None,
            azure_resource_info: None,
            components: HashMap::new(),
            created: now,
            updated: now,
            version: 0,
        }
    }

    pub fn set_operation_status(
        &mut self,
        operation: ResourceOperation,
        status: OperationState,
        reason: Option<&str>,
    ) {
        match operation {
            ResourceOperation::Provisioning => {
                self.provisioning_status = Some(status);
                self.provisioning_reason = reason.map(str::to_string);
            }
            ResourceOperation::Deleting => {
                self.deleting_status = Some(status);
                self.deleting_reason = reason.map(str::to_string);
            }
        }
        self.updated = Utc::now();
    }

    /// First attached component of the given type, if any.
    pub fn component_of_type(&self, component_type: ResourceType) -> Option<&ResourceComponent> {
        self.components
            .values()
            .find(|c| c.component_type == component_type)
    }
}
