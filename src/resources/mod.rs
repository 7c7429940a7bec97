//! # Resource Broker
//!
//! Domain layer riding on the continuation engine: resource records and
//! their repository, per-type creation strategies, the create/delete
//! handlers, and the caller-facing operations facade.

pub mod handlers;
pub mod operations;
pub mod record;
pub mod repository;
pub mod strategies;
pub mod types;

pub use handlers::{CreateResourceHandler, DeleteResourceHandler};
pub use operations::ResourceContinuationOperations;
pub use record::{ResourceOperation, ResourceRecord};
pub use repository::{
    update_record_with_retry, InMemoryResourceRepository, RepositoryError, ResourceRepository,
};
pub use strategies::{CreateResourceStrategy, StrategyError, StrategyRegistry};
pub use types::{
    AzureResourceInfo, ComponentInput, CreateResourceInput, CreateResourceOptions,
    DeleteResourceInput, ResourceComponent, ResourceCreationState, ResourceDetails, ResourceType,
};
