//! Capacity and subscription selection boundary.
//!
//! The engine consumes this as an opaque call; concrete quota arithmetic
//! lives behind the trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::continuation::HandlerError;
use crate::control_plane::AzureLocation;

/// Fixed pause before a capacity-starved operation is retried.
pub const CAPACITY_RETRY_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Compute,
    Network,
    Storage,
    KeyVault,
}

/// One quota requirement considered during subscription selection.
/// Criteria order matters: the first criterion is the primary ordering key
/// for candidate subscriptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureResourceCriterion {
    pub service_type: ServiceType,
    pub quota: String,
    pub required: i64,
}

/// A concrete placement: which subscription and resource group a resource
/// lands in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureResourceLocation {
    pub subscription_id: Uuid,
    pub resource_group: String,
    pub location: AzureLocation,
}

#[derive(Debug, thiserror::Error)]
pub enum CapacityError {
    #[error("No capacity available in {location} for quotas: {}", quotas.join(", "))]
    NotAvailable {
        location: AzureLocation,
        quotas: Vec<String>,
    },

    #[error("Capacity provider error: {0}")]
    Provider(String),
}

/// The one place capacity exhaustion becomes continuation-level
/// backpressure: the operation pauses for a fixed minute instead of
/// failing.
impl From<CapacityError> for HandlerError {
    fn from(error: CapacityError) -> Self {
        match error {
            CapacityError::NotAvailable { .. } => {
                HandlerError::temporarily_unavailable(error.to_string(), CAPACITY_RETRY_INTERVAL)
            }
            CapacityError::Provider(reason) => HandlerError::fault(reason),
        }
    }
}

#[async_trait]
pub trait CapacityManager: Send + Sync {
    /// Pick a subscription/resource-group for a resource with the given
    /// quota requirements in `location`.
    async fn select_azure_resource_location(
        &self,
        criteria: &[AzureResourceCriterion],
        location: AzureLocation,
    ) -> Result<AzureResourceLocation, CapacityError>;
}
