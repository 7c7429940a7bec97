//! Per-resource-type creation strategies.
//!
//! A second, in-process dispatch layer beneath the create handler: each
//! strategy claims exactly one `ResourceType`. Zero or two claimants for a
//! type is a wiring bug and surfaces as a hard error.

pub mod compute;
pub mod input_queue;
pub mod network_interface;
pub mod storage;

pub use compute::CreateComputeWithComponentsStrategy;
pub use input_queue::CreateInputQueueStrategy;
pub use network_interface::CreateNetworkInterfaceStrategy;
pub use storage::CreateBasicResourceStrategy;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::continuation::{ContinuationResult, HandlerError};
use crate::resources::record::ResourceRecord;
use crate::resources::types::{CreateResourceInput, ResourceType};

/// Pacing between polling hops of an in-progress creation.
pub const STEP_RETRY_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error("No creation strategy registered for resource type: {resource_type}")]
    NotRegistered { resource_type: ResourceType },

    #[error("A creation strategy is already registered for resource type: {resource_type}")]
    Duplicate { resource_type: ResourceType },
}

impl From<StrategyError> for HandlerError {
    fn from(error: StrategyError) -> Self {
        HandlerError::fault(error.to_string())
    }
}

/// Creation logic for one resource type.
///
/// `build_create_operation_input` runs once per operation (placement,
/// component synthesis, stage initialization) and must leave `input.stage`
/// set; `run_create_operation` advances the creation one step per hop,
/// mutating the input it is handed.
#[async_trait]
pub trait CreateResourceStrategy: Send + Sync {
    fn resource_type(&self) -> ResourceType;

    async fn build_create_operation_input(
        &self,
        input: &mut CreateResourceInput,
        record: &ResourceRecord,
    ) -> Result<(), HandlerError>;

    async fn run_create_operation(
        &self,
        input: &mut CreateResourceInput,
        record: &ResourceRecord,
    ) -> Result<ContinuationResult, HandlerError>;
}

/// Discriminant-keyed strategy lookup.
#[derive(Default)]
pub struct StrategyRegistry {
    strategies: HashMap<ResourceType, Arc<dyn CreateResourceStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        strategy: Arc<dyn CreateResourceStrategy>,
    ) -> Result<(), StrategyError> {
        let resource_type = strategy.resource_type();
        if self.strategies.contains_key(&resource_type) {
            return Err(StrategyError::Duplicate { resource_type });
        }
        self.strategies.insert(resource_type, strategy);
        Ok(())
    }

    pub fn strategy_for(
        &self,
        resource_type: ResourceType,
    ) -> Result<Arc<dyn CreateResourceStrategy>, StrategyError> {
        self.strategies
            .get(&resource_type)
            .cloned()
            .ok_or(StrategyError::NotRegistered { resource_type })
    }
}
