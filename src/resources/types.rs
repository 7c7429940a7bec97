use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::capacity::AzureResourceLocation;
use crate::continuation::OperationState;
use crate::control_plane::AzureLocation;
use crate::providers::DeploymentState;
use crate::providers::deployment::DeletionState;

/// Kinds of resources the broker provisions and tears down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    ComputeVm,
    OsDisk,
    InputQueue,
    NetworkInterface,
    StorageFileShare,
    KeyVault,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ComputeVm => "compute_vm",
            Self::OsDisk => "os_disk",
            Self::InputQueue => "input_queue",
            Self::NetworkInterface => "network_interface",
            Self::StorageFileShare => "storage_file_share",
            Self::KeyVault => "key_vault",
        };
        write!(f, "{name}")
    }
}

impl std::str::FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compute_vm" => Ok(Self::ComputeVm),
            "os_disk" => Ok(Self::OsDisk),
            "input_queue" => Ok(Self::InputQueue),
            "network_interface" => Ok(Self::NetworkInterface),
            "storage_file_share" => Ok(Self::StorageFileShare),
            "key_vault" => Ok(Self::KeyVault),
            _ => Err(format!("Unknown resource type: {s}")),
        }
    }
}

/// Handle to a provisioned Azure resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureResourceInfo {
    pub subscription_id: Uuid,
    pub resource_group: String,
    pub name: String,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl AzureResourceInfo {
    pub fn new(
        subscription_id: Uuid,
        resource_group: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id,
            resource_group: resource_group.into(),
            name: name.into(),
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// One physical sub-resource attached to a parent resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceComponent {
    pub component_id: Uuid,
    pub component_type: ResourceType,
    pub azure_resource_info: Option<AzureResourceInfo>,
    /// Deletion must skip this component.
    #[serde(default)]
    pub preserve: bool,
    /// Back-reference when the component has its own stored record.
    pub resource_record_id: Option<Uuid>,
}

impl ResourceComponent {
    pub fn new(component_type: ResourceType) -> Self {
        Self {
            component_id: Uuid::new_v4(),
            component_type,
            azure_resource_info: None,
            preserve: false,
            resource_record_id: None,
        }
    }

    pub fn with_azure_resource_info(mut self, info: AzureResourceInfo) -> Self {
        self.azure_resource_info = Some(info);
        self
    }

    pub fn with_preserve(mut self, preserve: bool) -> Self {
        self.preserve = preserve;
        self
    }

    pub fn with_resource_record_id(mut self, record_id: Uuid) -> Self {
        self.resource_record_id = Some(record_id);
        self
    }
}

/// A sub-resource's own creation operation, tracked by the parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentInput {
    pub component_id: Uuid,
    pub input: CreateResourceInput,
    pub status: Option<OperationState>,
}

/// Stage of the composite creation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCreationState {
    CreateComponent,
    CreateResource,
}

/// Caller-supplied knobs for resource creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateResourceOptions {
    /// Reattach this existing OS disk instead of provisioning fresh storage.
    pub os_disk_resource_id: Option<Uuid>,
    /// ARM path of the subnet to join; a NIC is only synthesized when set.
    pub subnet_resource_id: Option<String>,
}

///// What to build: size, placement, image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDetails {
    pub location: AzureLocation,
    pub sku_name: String,
    pub sku_family: String,
    pub cores: i64,
    pub image: Option<String>,
}

/// Full resumable state of one create operation. Everything a step needs is
/// in here; nothing survives in handler memory between hops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResourceInput {
    pub continuation_token: String,
    pub resource_id: Uuid,
    pub resource_type: ResourceType,
    pub details: ResourceDetails,
    #[serde(default)]
    pub options: CreateResourceOptions,
    /// `None` until the build step has chosen placement and components.
    pub stage: Option<ResourceCreationState>,
    #[serde(default)]
    pub component_inputs: HashMap<Uuid, ComponentInput>,
    #[serde(default)]
    pub custom_components: Vec<ResourceComponent>,
    pub resource_location: Option<AzureResourceLocation>,
    pub deployment_state: Option<DeploymentState>,
    /// Set once the underlying resource exists.
    pub azure_resource_info: Option<AzureResourceInfo>,
}

impl CreateResourceInput {
    pub fn new(
        continuation_token: impl Into<String>,
        resource_id: Uuid,
        resource_type: ResourceType,
        details: ResourceDetails,
        options: CreateResourceOptions,
    ) -> Self {
        Self {
            continuation_token: continuation_token.into(),
            resource_id,
            resource_type,
            details,
            options,
            stage: None,
            component_inputs: HashMap::new(),
            custom_components: Vec::new(),
            resource_location: None,
            deployment_state: None,
            azure_resource_info: None,
        }
    }
}

/// Resumable state of one delete operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResourceInput {
    pub continuation_token: String,
    pub resource_id: Uuid,
    /// Structured deletion plan; `None` until the plan is built.
    pub resume_state: Option<DeletionState>,
}

impl DeleteResourceInput {
    pub fn new(continuation_token: impl Into<String>, resource_id: Uuid) -> Self {
        Self {
            continuation_token: continuation_token.into(),
            resource_id,
            resume_state: None,
        }
    }
}
