//! VM deployment manager: drives ARM deployments for creation and a
//! dependency-ordered, phased teardown for deletion.
//!
//! The deletion plan is built once, then serialized into the continuation
//! input so it survives process restarts. Each step works the first
//! incomplete phase only; later phases wait until every resource in the
//! current phase is gone.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::continuation::OperationState;
use crate::control_plane::AzureLocation;
use crate::providers::{
    AzureResourceClient, DeploymentProgress, ProviderError, QueueProvider, VirtualMachineProviderCreateInput,
    VirtualMachineProviderCreateResult, VmCommand, VmInputQueueMessage,
};
use crate::resources::record::ResourceRecord;
use crate::resources::types::{AzureResourceInfo, ResourceType};

pub const DELETION_STATE_VERSION: u32 = 1;

/// Bounded retry for provider steps (deletion polls, deployment submission,
/// queue pushes) before the operation is declared fatal.
pub const PROVIDER_RETRY_LIMIT: u32 = 5;

/// Resource kinds the teardown planner knows how to delete and poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionResourceKind {
    VirtualMachine,
    InputQueue,
    NetworkInterface,
    OsDisk,
    NetworkSecurityGroup,
    VirtualNetwork,
    StorageFileShare,
    KeyVault,
}

impl fmt::Display for DeletionResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::VirtualMachine => "virtual_machine",
            Self::InputQueue => "input_queue",
            Self::NetworkInterface => "network_interface",
            Self::OsDisk => "os_disk",
            Self::NetworkSecurityGroup => "network_security_group",
            Self::VirtualNetwork => "virtual_network",
            Self::StorageFileShare => "storage_file_share",
            Self::KeyVault => "key_vault",
        };
        write!(f, "{name}")
    }
}

impl From<ResourceType> for DeletionResourceKind {
    fn from(resource_type: ResourceType) -> Self {
        match resource_type {
            ResourceType::ComputeVm => Self::VirtualMachine,
            ResourceType::OsDisk => Self::OsDisk,
            ResourceType::InputQueue => Self::InputQueue,
            ResourceType::NetworkInterface => Self::NetworkInterface,
            ResourceType::StorageFileShare => Self::StorageFileShare,
            ResourceType::KeyVault => Self::KeyVault,
        }
    }
}

/// One resource scheduled for deletion within a phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionResourceEntry {
    pub kind: DeletionResourceKind,
    pub info: AzureResourceInfo,
    pub state: OperationState,
}

impl DeletionResourceEntry {
    fn pending(kind: DeletionResourceKind, info: AzureResourceInfo) -> Self {
        Self {
            kind,
            info,
            state: OperationState::NotStarted,
        }
    }
}

/// A dependency group: every resource here must be gone before the next
/// phase may begin.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeletionPhase {
    pub resources: HashMap<String, DeletionResourceEntry>,
}

impl DeletionPhase {
    fn insert(&mut self, kind: DeletionResourceKind, info: AzureResourceInfo) {
        self.resources
            .insert(kind.to_string(), DeletionResourceEntry::pending(kind, info));
    }

    pub fn is_complete(&self) -> bool {
        self.resources
            .values()
            .all(|entry| entry.state == OperationState::Succeeded)
    }
}

/// The whole teardown plan, structured and versioned so it can ride inside
/// the continuation input across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionState {
    pub version: u32,
    pub location: AzureLocation,
    pub retry_attempt: u32,
    pub phases: Vec<DeletionPhase>,
}

impl DeletionState {
    /// Build the teardown plan for a record. VM records get the full
    /// three-phase plan; everything else deletes in a single phase through
    /// the same machinery.
    pub fn plan_for(record: &ResourceRecord) -> Self {
        match record.resource_type {
            ResourceType::ComputeVm => Self::plan_for_virtual_machine(record),
            _ => Self::single_phase_plan(record),
        }
    }

    fn plan_for_virtual_machine(record: &ResourceRecord) -> Self {
        // Phase 0: the VM and its input queue.
        let mut phase_0 = DeletionPhase::default();
        if let Some(vm_info) = &record.azure_resource_info {
            phase_0.insert(DeletionResourceKind::VirtualMachine, vm_info.clone());
        }
        if let Some(queue) = record.component_of_type(ResourceType::InputQueue) {
            if !queue.preserve {
                if let Some(info) = &queue.azure_resource_info {
                    phase_0.insert(DeletionResourceKind::InputQueue, info.clone());
                }
            }
        }

        // Phase 1: NIC and OS disk, which require the VM to be gone first.
        let mut phase_1 = DeletionPhase::default();
        let custom_nic = record.component_of_type(ResourceType::NetworkInterface);
        // No NIC component means the deployment created its own network
        // resources, named by convention off the VM.
        let self_created_network = custom_nic.is_none();

        if let Some(nic) = custom_nic {
            if !nic.preserve {
                if let Some(info) = &nic.azure_resource_info {
                    phase_1.insert(DeletionResourceKind::NetworkInterface, info.clone());
                }
            }
        } else if let Some(vm_info) = &record.azure_resource_info {
            phase_1.insert(
                DeletionResourceKind::NetworkInterface,
                derived_network_info(vm_info, "-nic"),
            );
        }

        if let Some(disk) = record.component_of_type(ResourceType::OsDisk) {
            if !disk.preserve {
                if let Some(info) = &disk.azure_resource_info {
                    phase_1.insert(DeletionResourceKind::OsDisk, info.clone());
                }
            }
        }

        // Phase 2: NSG and VNet, only when this deployment owns them. An
        // externally supplied subnet means the network belongs to the caller.
        let mut phase_2 = DeletionPhase::default();
        if self_created_network {
            if let Some(vm_info) = &record.azure_resource_info {
                phase_2.insert(
                    DeletionResourceKind::NetworkSecurityGroup,
                    derived_network_info(vm_info, "-nsg"),
                );
                phase_2.insert(
                    DeletionResourceKind::VirtualNetwork,
                    derived_network_info(vm_info, "-vnet"),
                );
            }
        }

        // An empty phase 0 means the VM is already gone; network cleanup
        // is presumed done as well.
        if phase_0.resources.is_empty() {
            for entry in phase_2.resources.values_mut() {
                entry.state = OperationState::Succeeded;
            }
        }

        Self {
            version: DELETION_STATE_VERSION,
            location: record.location,
            retry_attempt: 0,
            phases: vec![phase_0, phase_1, phase_2],
        }
    }

    fn single_phase_plan(record: &ResourceRecord) -> Self {
        let mut phase = DeletionPhase::default();
        if let Some(info) = &record.azure_resource_info {
            phase.insert(DeletionResourceKind::from(record.resource_type), info.clone());
        }
        Self {
            version: DELETION_STATE_VERSION,
            location: record.location,
            retry_attempt: 0,
            phases: vec![phase],
        }
    }

    pub fn first_unfinished_phase(&self) -> Option<usize> {
        self.phases.iter().position(|phase| !phase.is_complete())
    }

    pub fn is_complete(&self) -> bool {
        self.first_unfinished_phase().is_none()
    }
}

fn derived_network_info(vm_info: &AzureResourceInfo, suffix: &str) -> AzureResourceInfo {
    AzureResourceInfo::new(
        vm_info.subscription_id,
        vm_info.resource_group.clone(),
        format!("{}{}", vm_info.name, suffix),
    )
}

/// Conventional VM name for a brokered resource.
pub fn virtual_machine_name(resource_id: Uuid) -> String {
    format!("vm-{resource_id}")
}

/// Drives VM deployments and phased teardown against the provider clients.
pub struct VirtualMachineDeploymentManager {
    client: Arc<dyn AzureResourceClient>,
    queue_provider: Arc<dyn QueueProvider>,
}

impl VirtualMachineDeploymentManager {
    pub fn new(client: Arc<dyn AzureResourceClient>, queue_provider: Arc<dyn QueueProvider>) -> Self {
        Self {
            client,
            queue_provider,
        }
    }

    pub fn build_deletion_plan(&self, record: &ResourceRecord) -> DeletionState {
        let plan = DeletionState::plan_for(record);
        info!(
            record_id = %record.id,
            resource_type = %record.resource_type,
            phases = plan.phases.len(),
            "🗑️ Teardown plan built"
        );
        plan
    }

    /// Advance the teardown one step: begin deletes for `NotStarted`
    /// resources in the first incomplete phase, poll existence for
    /// `InProgress` ones. Returns the overall plan state.
    ///
    /// Step errors are tolerated up to the bounded retry limit, then fatal.
    pub async fn check_delete_status(
        &self,
        state: &mut DeletionState,
    ) -> Result<OperationState, ProviderError> {
        let Some(phase_index) = state.first_unfinished_phase() else {
            return Ok(OperationState::Succeeded);
        };

        let steps = state.phases[phase_index]
            .resources
            .iter()
            .filter(|(_, entry)| entry.state != OperationState::Succeeded)
            .map(|(key, entry)| {
                let key = key.clone();
                let entry = entry.clone();
                async move { (key, self.advance_resource(&entry).await) }
            });
        let outcomes = join_all(steps).await;

        let mut step_errors = Vec::new();
        for (key, outcome) in outcomes {
            match outcome {
                Ok(new_state) => {
                    if let Some(entry) = state.phases[phase_index].resources.get_mut(&key) {
                        entry.state = new_state;
                    }
                }
                Err(e) => {
                    warn!(phase = phase_index, resource = %key, error = %e, "⚠️ Teardown step failed");
                    step_errors.push(e);
                }
            }
        }

        if !step_errors.is_empty() {
            state.retry_attempt += 1;
            if state.retry_attempt >= PROVIDER_RETRY_LIMIT {
                return Err(ProviderError::RetryExhausted {
                    attempts: state.retry_attempt,
                });
            }
            return Ok(OperationState::InProgress);
        }

        if state.is_complete() {
            Ok(OperationState::Succeeded)
        } else {
            Ok(OperationState::InProgress)
        }
    }

    /// One resource's move through its begin-delete/poll-existence machine.
    async fn advance_resource(
        &self,
        entry: &DeletionResourceEntry,
    ) -> Result<OperationState, ProviderError> {
        match entry.state {
            OperationState::InProgress => {
                let exists = match entry.kind {
                    DeletionResourceKind::InputQueue => {
                        self.queue_provider.queue_exists(&entry.info).await?
                    }
                    kind => self.client.resource_exists(kind, &entry.info).await?,
                };
                if exists {
                    Ok(OperationState::InProgress)
                } else {
                    Ok(OperationState::Succeeded)
                }
            }
            _ => {
                match entry.kind {
                    DeletionResourceKind::InputQueue => {
                        self.queue_provider.delete_queue(&entry.info).await?
                    }
                    kind => self.client.begin_delete_resource(kind, &entry.info).await?,
                }
                Ok(OperationState::InProgress)
            }
        }
    }

    /// Advance a VM deployment one step: submit when no deployment exists
    /// yet, poll otherwise. Submission and poll faults retry up to the
    /// bounded limit.
    pub async fn create_compute(
        &self,
        input: &VirtualMachineProviderCreateInput,
    ) -> Result<VirtualMachineProviderCreateResult, ProviderError> {
        let mut state = input.state.clone().unwrap_or_default();

        let progress = match state.deployment_name.clone() {
            None => match self.client.begin_create_virtual_machine(input).await {
                Ok(deployment_name) => {
                    info!(
                        resource_id = %input.resource_id,
                        deployment = %deployment_name,
                        "🚀 VM deployment submitted"
                    );
                    state.deployment_name = Some(deployment_name);
                    DeploymentProgress::InProgress
                }
                Err(e) => return self.deployment_fault(state, e),
            },
            Some(deployment_name) => {
                match self
                    .client
                    .check_deployment_state(&input.resource_location, &deployment_name)
                    .await
                {
                    Ok(progress) => progress,
                    Err(e) => return self.deployment_fault(state, e),
                }
            }
        };

        Ok(match progress {
            DeploymentProgress::InProgress => VirtualMachineProviderCreateResult {
                status: OperationState::InProgress,
                next_state: Some(state),
                azure_resource_info: None,
                error_reason: None,
            },
            DeploymentProgress::Succeeded => VirtualMachineProviderCreateResult {
                status: OperationState::Succeeded,
                next_state: None,
                azure_resource_info: Some(AzureResourceInfo::new(
                    input.resource_location.subscription_id,
                    input.resource_location.resource_group.clone(),
                    virtual_machine_name(input.resource_id),
                )),
                error_reason: None,
            },
            DeploymentProgress::Failed(reason) => VirtualMachineProviderCreateResult {
                status: OperationState::Failed,
                next_state: None,
                azure_resource_info: None,
                error_reason: Some(reason),
            },
        })
    }

    fn deployment_fault(
        &self,
        mut state: crate::providers::DeploymentState,
        error: ProviderError,
    ) -> Result<VirtualMachineProviderCreateResult, ProviderError> {
        state.retry_attempt += 1;
        if state.retry_attempt >= PROVIDER_RETRY_LIMIT {
            return Err(ProviderError::RetryExhausted {
                attempts: state.retry_attempt,
            });
        }
        warn!(
            attempt = state.retry_attempt,
            error = %error,
            "⚠️ VM deployment step failed, will retry"
        );
        Ok(VirtualMachineProviderCreateResult {
            status: OperationState::InProgress,
            next_state: Some(state),
            azure_resource_info: None,
            error_reason: None,
        })
    }

    pub async fn start_compute(
        &self,
        queue_info: &AzureResourceInfo,
        parameters: HashMap<String, String>,
    ) -> Result<(), ProviderError> {
        self.push_vm_command(queue_info, VmCommand::StartEnvironment, parameters)
            .await
    }

    pub async fn shutdown_compute(
        &self,
        queue_info: &AzureResourceInfo,
        parameters: HashMap<String, String>,
    ) -> Result<(), ProviderError> {
        self.push_vm_command(queue_info, VmCommand::ShutdownEnvironment, parameters)
            .await
    }

    /// Deliver a command to the VM's input queue, folding the queue's
    /// connection details into the command parameters. Push faults retry up
    /// to the bounded limit.
    async fn push_vm_command(
        &self,
        queue_info: &AzureResourceInfo,
        command: VmCommand,
        mut parameters: HashMap<String, String>,
    ) -> Result<(), ProviderError> {
        let details = self.queue_provider.get_queue_details(queue_info).await?;
        parameters.extend(details);
        let message = VmInputQueueMessage {
            command,
            parameters,
        };

        let mut attempt = 0;
        loop {
            match self.queue_provider.push_message(queue_info, &message).await {
                Ok(()) => {
                    info!(queue = %queue_info.name, command = ?command, "📤 VM command delivered");
                    return Ok(());
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= PROVIDER_RETRY_LIMIT {
                        return Err(ProviderError::RetryExhausted { attempts: attempt });
                    }
                    warn!(attempt, error = %e, "⚠️ VM command push failed, retrying");
                }
            }
        }
    }
}
