//! Scripted provider and capacity fakes for integration tests.
//!
//! Every fake records the calls it receives; failure injection is per-call
//! countdown so tests can exercise the bounded-retry paths exactly.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use nimbus_core::capacity::{
    AzureResourceCriterion, AzureResourceLocation, CapacityError, CapacityManager,
};
use nimbus_core::control_plane::AzureLocation;
use nimbus_core::providers::{
    AzureResourceClient, BasicResourceProvider, DeletionResourceKind, DeploymentProgress,
    ProviderError, QueueProvider, VirtualMachineProviderCreateInput, VmInputQueueMessage,
};
use nimbus_core::resources::types::{AzureResourceInfo, ResourceType};

/// One provider-side teardown call, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownEvent {
    pub kind: String,
    pub name: String,
}

/// Shared across the fakes so delete ordering is observable end to end.
pub type TeardownLog = Arc<Mutex<Vec<TeardownEvent>>>;

pub struct FakeCapacityManager {
    pub subscription_id: Uuid,
    pub exhausted: AtomicBool,
    pub selection_calls: AtomicUsize,
    pub last_criteria: Mutex<Vec<AzureResourceCriterion>>,
}

impl FakeCapacityManager {
    pub fn new() -> Self {
        Self {
            subscription_id: Uuid::new_v4(),
            exhausted: AtomicBool::new(false),
            selection_calls: AtomicUsize::new(0),
            last_criteria: Mutex::new(Vec::new()),
        }
    }

    pub fn set_exhausted(&self, exhausted: bool) {
        self.exhausted.store(exhausted, Ordering::SeqCst);
    }
}

#[async_trait]
impl CapacityManager for FakeCapacityManager {
    async fn select_azure_resource_location(
        &self,
        criteria: &[AzureResourceCriterion],
        location: AzureLocation,
    ) -> Result<AzureResourceLocation, CapacityError> {
        self.selection_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_criteria.lock() = criteria.to_vec();

        if self.exhausted.load(Ordering::SeqCst) {
            return Err(CapacityError::NotAvailable {
                location,
                quotas: criteria.iter().map(|c| c.quota.clone()).collect(),
            });
        }
        Ok(AzureResourceLocation {
            subscription_id: self.subscription_id,
            resource_group: "rg-brokered-1".to_string(),
            location,
        })
    }
}

pub struct FakeAzureResourceClient {
    teardown_log: TeardownLog,
    /// Names whose delete has begun; existence polls report them gone.
    gone: Mutex<HashSet<String>>,
    /// Per-name count of existence polls that still see the resource after
    /// its delete began.
    pub lingering_polls: Mutex<HashMap<String, u32>>,
    pub exists_failures_remaining: AtomicU32,
    pub exists_calls: AtomicUsize,
    /// InProgress polls before a submitted deployment reports success.
    pub deployment_polls_until_success: AtomicU32,
    pub fail_deployment_with: Mutex<Option<String>>,
    pub begin_create_failures_remaining: AtomicU32,
    pub vm_create_inputs: Mutex<Vec<VirtualMachineProviderCreateInput>>,
    /// (nic name, subnet resource id) per NIC created.
    pub created_nics: Mutex<Vec<(String, String)>>,
}

impl FakeAzureResourceClient {
    pub fn new(teardown_log: TeardownLog) -> Self {
        Self {
            teardown_log,
            gone: Mutex::new(HashSet::new()),
            lingering_polls: Mutex::new(HashMap::new()),
            exists_failures_remaining: AtomicU32::new(0),
            exists_calls: AtomicUsize::new(0),
            deployment_polls_until_success: AtomicU32::new(0),
            fail_deployment_with: Mutex::new(None),
            begin_create_failures_remaining: AtomicU32::new(0),
            vm_create_inputs: Mutex::new(Vec::new()),
            created_nics: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AzureResourceClient for FakeAzureResourceClient {
    async fn begin_create_virtual_machine(
        &self,
        input: &VirtualMachineProviderCreateInput,
    ) -> Result<String, ProviderError> {
        if self.begin_create_failures_remaining.load(Ordering::SeqCst) > 0 {
            self.begin_create_failures_remaining
                .fetch_sub(1, Ordering::SeqCst);
            return Err(ProviderError::client("deployment submission throttled"));
        }
        self.vm_create_inputs.lock().push(input.clone());
        Ok(format!("deploy-{}", input.resource_id))
    }

    async fn check_deployment_state(
        &self,
        _resource_location: &AzureResourceLocation,
        _deployment_name: &str,
    ) -> Result<DeploymentProgress, ProviderError> {
        if let Some(reason) = self.fail_deployment_with.lock().clone() {
            return Ok(DeploymentProgress::Failed(reason));
        }
        if self.deployment_polls_until_success.load(Ordering::SeqCst) > 0 {
            self.deployment_polls_until_success
                .fetch_sub(1, Ordering::SeqCst);
            return Ok(DeploymentProgress::InProgress);
        }
        Ok(DeploymentProgress::Succeeded)
    }

    async fn begin_delete_resource(
        &self,
        kind: DeletionResourceKind,
        info: &AzureResourceInfo,
    ) -> Result<(), ProviderError> {
        self.teardown_log.lock().push(TeardownEvent {
            kind: kind.to_string(),
            name: info.name.clone(),
        });
        self.gone.lock().insert(info.name.clone());
        Ok(())
    }

    async fn resource_exists(
        &self,
        _kind: DeletionResourceKind,
        info: &AzureResourceInfo,
    ) -> Result<bool, ProviderError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        if self.exists_failures_remaining.load(Ordering::SeqCst) > 0 {
            self.exists_failures_remaining.fetch_sub(1, Ordering::SeqCst);
            return Err(ProviderError::client("existence poll timed out"));
        }
        if let Some(polls) = self.lingering_polls.lock().get_mut(&info.name) {
            if *polls > 0 {
                *polls -= 1;
                return Ok(true);
            }
        }
        Ok(!self.gone.lock().contains(&info.name))
    }

    async fn create_network_interface(
        &self,
        resource_location: &AzureResourceLocation,
        name: &str,
        subnet_resource_id: &str,
    ) -> Result<AzureResourceInfo, ProviderError> {
        self.created_nics
            .lock()
            .push((name.to_string(), subnet_resource_id.to_string()));
        Ok(AzureResourceInfo::new(
            resource_location.subscription_id,
            resource_location.resource_group.clone(),
            name,
        ))
    }
}

pub struct FakeQueueProvider {
    teardown_log: TeardownLog,
    pub created_queues: Mutex<Vec<String>>,
    pub deleted_queues: Mutex<HashSet<String>>,
    pub create_failure: Mutex<Option<String>>,
    pub pushed: Mutex<Vec<VmInputQueueMessage>>,
    pub push_failures_remaining: AtomicU32,
    pub push_attempts: AtomicUsize,
}

impl FakeQueueProvider {
    pub fn new(teardown_log: TeardownLog) -> Self {
        Self {
            teardown_log,
            created_queues: Mutex::new(Vec::new()),
            deleted_queues: Mutex::new(HashSet::new()),
            create_failure: Mutex::new(None),
            pushed: Mutex::new(Vec::new()),
            push_failures_remaining: AtomicU32::new(0),
            push_attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl QueueProvider for FakeQueueProvider {
    async fn create_queue(
        &self,
        resource_location: &AzureResourceLocation,
        queue_name: &str,
    ) -> Result<AzureResourceInfo, ProviderError> {
        if let Some(reason) = self.create_failure.lock().clone() {
            return Err(ProviderError::client(reason));
        }
        self.created_queues.lock().push(queue_name.to_string());
        Ok(AzureResourceInfo::new(
            resource_location.subscription_id,
            resource_location.resource_group.clone(),
            queue_name,
        ))
    }

    async fn get_queue_details(
        &self,
        info: &AzureResourceInfo,
    ) -> Result<HashMap<String, String>, ProviderError> {
        Ok(HashMap::from([(
            "queue_endpoint".to_string(),
            format!("https://queues.example/{}", info.name),
        )]))
    }

    async fn push_message(
        &self,
        _info: &AzureResourceInfo,
        message: &VmInputQueueMessage,
    ) -> Result<(), ProviderError> {
        self.push_attempts.fetch_add(1, Ordering::SeqCst);
        if self.push_failures_remaining.load(Ordering::SeqCst) > 0 {
            self.push_failures_remaining.fetch_sub(1, Ordering::SeqCst);
            return Err(ProviderError::client("queue write throttled"));
        }
        self.pushed.lock().push(message.clone());
        Ok(())
    }

    async fn delete_queue(&self, info: &AzureResourceInfo) -> Result<(), ProviderError> {
        self.teardown_log.lock().push(TeardownEvent {
            kind: DeletionResourceKind::InputQueue.to_string(),
            name: info.name.clone(),
        });
        self.deleted_queues.lock().insert(info.name.clone());
        Ok(())
    }

    async fn queue_exists(&self, info: &AzureResourceInfo) -> Result<bool, ProviderError> {
        Ok(!self.deleted_queues.lock().contains(&info.name))
    }
}

#[derive(Default)]
pub struct FakeBasicResourceProvider {
    pub created: Mutex<Vec<(ResourceType, Uuid)>>,
}

#[async_trait]
impl BasicResourceProvider for FakeBasicResourceProvider {
    async fn create_basic_resource(
        &self,
        resource_type: ResourceType,
        resource_id: Uuid,
        resource_location: &AzureResourceLocation,
    ) -> Result<AzureResourceInfo, ProviderError> {
        self.created.lock().push((resource_type, resource_id));
        Ok(AzureResourceInfo::new(
            resource_location.subscription_id,
            resource_location.resource_group.clone(),
            format!("{resource_type}-{resource_id}"),
        ))
    }
}
