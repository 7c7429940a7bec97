//! Provider boundary.
//!
//! The broker drives Azure through these traits; the concrete REST clients
//! live outside this crate. Provider calls follow the same shape as the
//! continuation framework itself: typed input in, status plus resumable
//! state out.

pub mod deployment;

pub use deployment::{
    DeletionPhase, DeletionResourceEntry, DeletionResourceKind, DeletionState,
    VirtualMachineDeploymentManager,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::capacity::AzureResourceLocation;
use crate::continuation::OperationState;
use crate::resources::types::{AzureResourceInfo, ResourceComponent, ResourceType};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider client error: {0}")]
    Client(String),

    #[error("Retry attempts exhausted after {attempts} tries")]
    RetryExhausted { attempts: u32 },

    #[error("Invalid provider input: {0}")]
    InvalidInput(String),
}

impl ProviderError {
    pub fn client(reason: impl Into<String>) -> Self {
        Self::Client(reason.into())
    }

    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }
}

pub const DEPLOYMENT_STATE_VERSION: u32 = 1;

/// Resumable state of one ARM deployment, carried inside the continuation
/// input across hops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentState {
    pub version: u32,
    /// Set once the deployment has been submitted; polled thereafter.
    pub deployment_name: Option<String>,
    pub retry_attempt: u32,
}

impl DeploymentState {
    pub fn new() -> Self {
        Self {
            version: DEPLOYMENT_STATE_VERSION,
            deployment_name: None,
            retry_attempt: 0,
        }
    }
}

impl Default for DeploymentState {
    fn default() -> Self {
        Self::new()
    }
}

/// Where a submitted deployment stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentProgress {
    InProgress,
    Succeeded,
    Failed(String),
}

/// Everything the client needs to submit a VM deployment.
#[derive(Debug, Clone)]
pub struct VirtualMachineProviderCreateInput {
    pub resource_id: Uuid,
    pub resource_location: AzureResourceLocation,
    pub sku_name: String,
    pub image: Option<String>,
    /// Already-provisioned components wired into the deployment.
    pub components: Vec<ResourceComponent>,
    pub state: Option<DeploymentState>,
}

#[derive(Debug, Clone)]
pub struct VirtualMachineProviderCreateResult {
    pub status: OperationState,
    pub next_state: Option<DeploymentState>,
    pub azure_resource_info: Option<AzureResourceInfo>,
    pub error_reason: Option<String>,
}

/// Commands accepted by a VM's input queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VmCommand {
    StartEnvironment,
    ShutdownEnvironment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmInputQueueMessage {
    pub command: VmCommand,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

/// ARM-facing client for compute, network, and generic resource teardown.
#[async_trait]
pub trait AzureResourceClient: Send + Sync {
    /// Submit a VM deployment. Returns the deployment name to poll.
    async fn begin_create_virtual_machine(
        &self,
        input: &VirtualMachineProviderCreateInput,
    ) -> Result<String, ProviderError>;

    async fn check_deployment_state(
        &self,
        resource_location: &AzureResourceLocation,
        deployment_name: &str,
    ) -> Result<DeploymentProgress, ProviderError>;

    /// Issue the provider-specific delete call for one resource.
    async fn begin_delete_resource(
        &self,
        kind: DeletionResourceKind,
        info: &AzureResourceInfo,
    ) -> Result<(), ProviderError>;

    /// Existence poll used to confirm a delete has drained.
    async fn resource_exists(
        &self,
        kind: DeletionResourceKind,
        info: &AzureResourceInfo,
    ) -> Result<bool, ProviderError>;

    async fn create_network_interface(
        &self,
        resource_location: &AzureResourceLocation,
        name: &str,
        subnet_resource_id: &str,
    ) -> Result<AzureResourceInfo, ProviderError>;
}

/// Storage-queue provider backing each VM's input queue.
#[async_trait]
pub trait QueueProvider: Send + Sync {
    async fn create_queue(
        &self,
        resource_location: &AzureResourceLocation,
        queue_name: &str,
    ) -> Result<AzureResourceInfo, ProviderError>;

    /// Connection details (endpoint, auth) merged into VM command parameters.
    async fn get_queue_details(
        &self,
        info: &AzureResourceInfo,
    ) -> Result<HashMap<String, String>, ProviderError>;

    async fn push_message(
        &self,
        info: &AzureResourceInfo,
        message: &VmInputQueueMessage,
    ) -> Result<(), ProviderError>;

    async fn delete_queue(&self, info: &AzureResourceInfo) -> Result<(), ProviderError>;

    async fn queue_exists(&self, info: &AzureResourceInfo) -> Result<bool, ProviderError>;
}

/// Single-call providers (file shares, key vaults): no polling loop, the
/// create either lands or errors.
#[async_trait]
pub trait BasicResourceProvider: Send + Sync {
    async fn create_basic_resource(
        &self,
        resource_type: ResourceType,
        resource_id: Uuid,
        resource_location: &AzureResourceLocation,
    ) -> Result<AzureResourceInfo, ProviderError>;
}
