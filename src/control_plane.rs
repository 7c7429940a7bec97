//! Control-plane topology: which Azure locations this stamp owns, and
//! queue routing to the stamps that own everything else.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::continuation::ContinuationQueuePayload;
use crate::messaging::{ContinuationJobQueue, QueueError};

/// Azure regions this deployment knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AzureLocation {
    #[serde(rename = "eastus")]
    EastUs,
    #[serde(rename = "eastus2")]
    EastUs2,
    #[serde(rename = "westus2")]
    WestUs2,
    #[serde(rename = "westeurope")]
    WestEurope,
    #[serde(rename = "southeastasia")]
    SoutheastAsia,
}

impl fmt::Display for AzureLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EastUs => "eastus",
            Self::EastUs2 => "eastus2",
            Self::WestUs2 => "westus2",
            Self::WestEurope => "westeurope",
            Self::SoutheastAsia => "southeastasia",
        };
        write!(f, "{name}")
    }
}

impl std::str::FromStr for AzureLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eastus" => Ok(Self::EastUs),
            "eastus2" => Ok(Self::EastUs2),
            "westus2" => Ok(Self::WestUs2),
            "westeurope" => Ok(Self::WestEurope),
            "southeastasia" => Ok(Self::SoutheastAsia),
            _ => Err(format!("Unknown Azure location: {s}")),
        }
    }
}

/// Where this control-plane stamp runs and which data-plane locations it
/// serves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPlaneInfo {
    pub stamp_location: AzureLocation,
    pub data_plane_locations: Vec<AzureLocation>,
}

impl ControlPlaneInfo {
    pub fn new(stamp_location: AzureLocation, data_plane_locations: Vec<AzureLocation>) -> Self {
        Self {
            stamp_location,
            data_plane_locations,
        }
    }

    /// Whether operations for `location` run on this stamp.
    pub fn owns_location(&self, location: AzureLocation) -> bool {
        self.stamp_location == location || self.data_plane_locations.contains(&location)
    }
}

/// Routes continuation payloads to the queue of whichever stamp owns the
/// target region. Fire-and-forget: the sender never waits on the remote
/// stamp's processing.
#[derive(Default)]
pub struct CrossRegionMessagePump {
    queues: HashMap<AzureLocation, Arc<dyn ContinuationJobQueue>>,
}

impl CrossRegionMessagePump {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_region(
        &mut self,
        location: AzureLocation,
        queue: Arc<dyn ContinuationJobQueue>,
    ) {
        info!("🌐 Cross-region pump: registered queue for {}", location);
        self.queues.insert(location, queue);
    }

    pub async fn push_message(
        &self,
        location: AzureLocation,
        payload: &ContinuationQueuePayload,
    ) -> Result<i64, QueueError> {
        let queue = self
            .queues
            .get(&location)
            .ok_or(QueueError::RegionNotRegistered { location })?;
        let body = serde_json::to_value(payload)?;
        queue.add_message(body, Duration::ZERO).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::continuation::ContinuationInput;
    use crate::messaging::InMemoryJobQueue;
    use crate::resources::types::{
        CreateResourceInput, CreateResourceOptions, ResourceDetails, ResourceType,
    };
    use uuid::Uuid;

    #[test]
    fn stamp_owns_itself_and_its_data_planes() {
        let info = ControlPlaneInfo::new(
            AzureLocation::EastUs,
            vec![AzureLocation::EastUs2, AzureLocation::WestUs2],
        );

        assert!(info.owns_location(AzureLocation::EastUs));
        assert!(info.owns_location(AzureLocation::WestUs2));
        assert!(!info.owns_location(AzureLocation::WestEurope));
    }

    #[test]
    fn location_serde_uses_azure_names() {
        let json = serde_json::to_string(&AzureLocation::SoutheastAsia).unwrap();
        assert_eq!(json, "\"southeastasia\"");
        let parsed: AzureLocation = serde_json::from_str("\"westeurope\"").unwrap();
        assert_eq!(parsed, AzureLocation::WestEurope);
    }

    #[tokio::test]
    async fn push_to_unregistered_region_is_an_error() {
        let pump = CrossRegionMessagePump::new();
        let payload = ContinuationQueuePayload::new(
            "job_create_resource",
            ContinuationInput::CreateResource(CreateResourceInput::new(
                "t0",
                Uuid::new_v4(),
                ResourceType::ComputeVm,
                ResourceDetails {
                    location: AzureLocation::WestEurope,
                    sku_name: "standard_d4".into(),
                    sku_family: "standardDFamily".into(),
                    cores: 4,
                    image: None,
                },
                CreateResourceOptions::default(),
            )),
            None,
            HashMap::new(),
        );

        let result = pump.push_message(AzureLocation::WestEurope, &payload).await;
        assert!(matches!(
            result,
            Err(QueueError::RegionNotRegistered { location }) if location == AzureLocation::WestEurope
        ));
    }

    #[tokio::test]
    async fn push_routes_to_registered_queue() {
        let mut pump = CrossRegionMessagePump::new();
        let queue = Arc::new(InMemoryJobQueue::new());
        pump.register_region(AzureLocation::WestEurope, queue.clone());

        let payload = ContinuationQueuePayload::new(
            "job_create_resource",
            ContinuationInput::CreateResource(CreateResourceInput::new(
                "t0",
                Uuid::new_v4(),
                ResourceType::ComputeVm,
                ResourceDetails {
                    location: AzureLocation::WestEurope,
                    sku_name: "standard_d4".into(),
                    sku_family: "standardDFamily".into(),
                    cores: 4,
                    image: None,
                },
                CreateResourceOptions::default(),
            )),
            None,
            HashMap::new(),
        );

        pump.push_message(AzureLocation::WestEurope, &payload)
            .await
            .unwrap();
        assert_eq!(queue.depth(), 1);
    }
}
