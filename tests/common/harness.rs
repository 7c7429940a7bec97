//! Fully wired broker over the in-memory queue and provider fakes.
//!
//! Tests drive the engine one worker iteration at a time; queue delays are
//! collapsed with `make_all_visible`, so multi-hop operations run
//! deterministically without waiting out visibility timeouts.

#![allow(dead_code)]

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use uuid::Uuid;

use nimbus_core::continuation::{
    ContinuationActivator, ContinuationMessagePump, ContinuationQueuePayload, ContinuationWorker,
    ContinuationWorkerConfig, OperationState,
};
use nimbus_core::control_plane::AzureLocation;
use nimbus_core::messaging::{ContinuationJobQueue, InMemoryJobQueue};
use nimbus_core::providers::deployment::virtual_machine_name;
use nimbus_core::providers::VirtualMachineDeploymentManager;
use nimbus_core::resources::strategies::input_queue::input_queue_name;
use nimbus_core::resources::strategies::{
    CreateBasicResourceStrategy, CreateComputeWithComponentsStrategy, CreateInputQueueStrategy,
    CreateNetworkInterfaceStrategy, StrategyRegistry,
};
use nimbus_core::resources::types::{
    AzureResourceInfo, ResourceComponent, ResourceDetails, ResourceType,
};
use nimbus_core::resources::{
    CreateResourceHandler, DeleteResourceHandler, InMemoryResourceRepository,
    ResourceContinuationOperations, ResourceOperation, ResourceRecord,
};

use super::fakes::{
    FakeAzureResourceClient, FakeBasicResourceProvider, FakeCapacityManager, FakeQueueProvider,
    TeardownEvent, TeardownLog,
};

/// Standard VM sizing used across the lifecycle tests.
pub fn test_details(location: AzureLocation) -> ResourceDetails {
    ResourceDetails {
        location,
        sku_name: "standard_d4".to_string(),
        sku_family: "standardDFamily".to_string(),
        cores: 4,
        image: Some("ubuntu-22.04".to_string()),
    }
}

pub struct TestBroker {
    pub queue: Arc<InMemoryJobQueue>,
    pub pump: Arc<ContinuationMessagePump>,
    pub activator: Arc<ContinuationActivator>,
    pub repository: Arc<InMemoryResourceRepository>,
    pub capacity: Arc<FakeCapacityManager>,
    pub client: Arc<FakeAzureResourceClient>,
    pub queue_provider: Arc<FakeQueueProvider>,
    pub basic_provider: Arc<FakeBasicResourceProvider>,
    pub deployment_manager: Arc<VirtualMachineDeploymentManager>,
    pub teardown_log: TeardownLog,
    pub operations: ResourceContinuationOperations,
}

impl TestBroker {
    pub fn new() -> Self {
        let teardown_log: TeardownLog = Arc::new(Mutex::new(Vec::new()));

        let queue = Arc::new(InMemoryJobQueue::new());
        let pump = Arc::new(ContinuationMessagePump::new(
            queue.clone(),
            4,
            Duration::from_secs(30),
        ));

        let capacity = Arc::new(FakeCapacityManager::new());
        let client = Arc::new(FakeAzureResourceClient::new(teardown_log.clone()));
        let queue_provider = Arc::new(FakeQueueProvider::new(teardown_log.clone()));
        let basic_provider = Arc::new(FakeBasicResourceProvider::default());
        let repository = Arc::new(InMemoryResourceRepository::new());
        let deployment_manager = Arc::new(VirtualMachineDeploymentManager::new(
            client.clone(),
            queue_provider.clone(),
        ));

        let mut component_strategies = StrategyRegistry::new();
        component_strategies
            .register(Arc::new(CreateInputQueueStrategy::new(
                queue_provider.clone(),
            )))
            .expect("input queue strategy registers");
        component_strategies
            .register(Arc::new(CreateNetworkInterfaceStrategy::new(client.clone())))
            .expect("nic strategy registers");
        let component_strategies = Arc::new(component_strategies);

        let mut strategies = StrategyRegistry::new();
        strategies
            .register(Arc::new(CreateComputeWithComponentsStrategy::new(
                capacity.clone(),
                deployment_manager.clone(),
                repository.clone(),
                component_strategies,
            )))
            .expect("compute strategy registers");
        strategies
            .register(Arc::new(CreateInputQueueStrategy::new(
                queue_provider.clone(),
            )))
            .expect("input queue strategy registers");
        strategies
            .register(Arc::new(CreateNetworkInterfaceStrategy::new(client.clone())))
            .expect("nic strategy registers");
        strategies
            .register(Arc::new(CreateBasicResourceStrategy::file_share(
                basic_provider.clone(),
                capacity.clone(),
            )))
            .expect("file share strategy registers");
        strategies
            .register(Arc::new(CreateBasicResourceStrategy::key_vault(
                basic_provider.clone(),
                capacity.clone(),
            )))
            .expect("key vault strategy registers");
        let strategies = Arc::new(strategies);

        let mut activator = ContinuationActivator::new(pump.clone(), Duration::from_secs(3600));
        activator
            .register_handler(Arc::new(CreateResourceHandler::new(
                repository.clone(),
                strategies,
                pump.clone(),
            )))
            .expect("create handler registers");
        activator
            .register_handler(Arc::new(DeleteResourceHandler::new(
                repository.clone(),
                deployment_manager.clone(),
            )))
            .expect("delete handler registers");
        let activator = Arc::new(activator);

        let operations = ResourceContinuationOperations::new(
            activator.clone(),
            repository.clone(),
            deployment_manager.clone(),
        );

        Self {
            queue,
            pump,
            activator,
            repository,
            capacity,
            client,
            queue_provider,
            basic_provider,
            deployment_manager,
            teardown_log,
            operations,
        }
    }

    pub fn worker(&self) -> ContinuationWorker {
        ContinuationWorker::new(
            self.pump.clone(),
            self.activator.clone(),
            ContinuationWorkerConfig::default(),
            Arc::new(AtomicBool::new(false)),
            Arc::new(Notify::new()),
        )
    }

    /// Run worker iterations, collapsing queue delays, until the queue is
    /// empty. Panics if the operation does not settle within `max_hops`.
    pub async fn drive_until_idle(&self, worker: &mut ContinuationWorker, max_hops: usize) {
        for _ in 0..max_hops {
            if self.queue.depth() == 0 {
                return;
            }
            self.queue.make_all_visible();
            worker.run_iteration().await;
        }
        panic!("queue did not drain within {max_hops} hops");
    }

    /// Decode every message currently on the queue without consuming it.
    pub async fn peek_payloads(&self) -> Vec<ContinuationQueuePayload> {
        self.queue.make_all_visible();
        let leased = self
            .queue
            .get_messages(Duration::from_secs(300), 64)
            .await
            .expect("in-memory queue reads succeed");
        leased
            .into_iter()
            .map(|message| {
                serde_json::from_value(message.body).expect("queued body decodes as a payload")
            })
            .collect()
    }

    pub fn teardown_events(&self) -> Vec<TeardownEvent> {
        self.teardown_log.lock().clone()
    }

    /// A fully provisioned VM record, as a successful creation would leave
    /// it: input queue and OS disk components attached, no NIC component
    /// (the deployment owned its network). Callers mutate and persist it.
    pub fn ready_vm_record(&self) -> ResourceRecord {
        let id = Uuid::new_v4();
        let subscription_id = self.capacity.subscription_id;
        let mut record = ResourceRecord::new(
            id,
            ResourceType::ComputeVm,
            AzureLocation::EastUs,
            "standard_d4",
        );
        record.azure_resource_info = Some(AzureResourceInfo::new(
            subscription_id,
            "rg-brokered-1",
            virtual_machine_name(id),
        ));

        let queue = ResourceComponent::new(ResourceType::InputQueue).with_azure_resource_info(
            AzureResourceInfo::new(subscription_id, "rg-brokered-1", input_queue_name(id)),
        );
        record.components.insert(queue.component_id, queue);
        let disk = ResourceComponent::new(ResourceType::OsDisk).with_azure_resource_info(
            AzureResourceInfo::new(subscription_id, "rg-brokered-1", format!("disk-{id}")),
        );
        record.components.insert(disk.component_id, disk);

        record.is_ready = true;
        record.set_operation_status(
            ResourceOperation::Provisioning,
            OperationState::Succeeded,
            None,
        );
        record
    }
}
