//! Proptest strategies for broker domain values.

#![allow(dead_code)]

use proptest::prelude::*;
use proptest::strategy::Just;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use nimbus_core::continuation::{ContinuationInput, ContinuationQueuePayload, OperationState};
use nimbus_core::control_plane::AzureLocation;
use nimbus_core::resources::types::{
    AzureResourceInfo, CreateResourceInput, CreateResourceOptions, ResourceComponent,
    ResourceDetails, ResourceType,
};
use nimbus_core::resources::ResourceRecord;

/// Strategy for generating operation states across the full lifecycle
pub fn operation_state_strategy() -> impl Strategy<Value = OperationState> {
    prop_oneof![
        Just(OperationState::Initialized),
        Just(OperationState::NotStarted),
        Just(OperationState::InProgress),
        Just(OperationState::Succeeded),
        Just(OperationState::Failed),
        Just(OperationState::Cancelled),
        Just(OperationState::Triggered),
    ]
}

/// Strategy for generating control-plane regions
pub fn azure_location_strategy() -> impl Strategy<Value = AzureLocation> {
    prop_oneof![
        Just(AzureLocation::EastUs),
        Just(AzureLocation::EastUs2),
        Just(AzureLocation::WestUs2),
        Just(AzureLocation::WestEurope),
        Just(AzureLocation::SoutheastAsia),
    ]
}

/// Strategy for generating handler target names
pub fn target_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,40}"
}

/// Strategy for generating caller-supplied tracking ids
pub fn tracking_id_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[a-zA-Z0-9-]{1,36}")
}

/// Strategy for generating diagnostic logger properties
pub fn logger_properties_strategy() -> impl Strategy<Value = HashMap<String, String>> {
    prop::collection::hash_map("[a-z_]{1,12}", "[a-zA-Z0-9 ._-]{0,24}", 0..4)
}

/// Strategy for generating resource identifiers deterministically
pub fn resource_id_strategy() -> impl Strategy<Value = Uuid> {
    any::<u128>().prop_map(Uuid::from_u128)
}

/// Strategy for generating the resource types the broker provisions
pub fn resource_type_strategy() -> impl Strategy<Value = ResourceType> {
    prop_oneof![
        Just(ResourceType::ComputeVm),
        Just(ResourceType::OsDisk),
        Just(ResourceType::InputQueue),
        Just(ResourceType::NetworkInterface),
        Just(ResourceType::StorageFileShare),
        Just(ResourceType::KeyVault),
    ]
}

/// Strategy for generating VM sizing requests
pub fn resource_details_strategy() -> impl Strategy<Value = ResourceDetails> {
    (
        azure_location_strategy(),
        "[a-z][a-z0-9_]{0,15}",
        "[a-zA-Z]{1,24}",
        1i64..=64,
        prop::option::of("[a-z0-9.-]{1,20}"),
    )
        .prop_map(|(location, sku_name, sku_family, cores, image)| ResourceDetails {
            location,
            sku_name,
            sku_family,
            cores,
            image,
        })
}

/// Strategy for generating creation inputs with an arbitrary resume token
pub fn create_input_strategy() -> impl Strategy<Value = ContinuationInput> {
    (
        "[a-zA-Z0-9_-]{0,24}",
        resource_id_strategy(),
        resource_details_strategy(),
    )
        .prop_map(|(token, resource_id, details)| {
            ContinuationInput::CreateResource(CreateResourceInput::new(
                token,
                resource_id,
                ResourceType::ComputeVm,
                details,
                CreateResourceOptions::default(),
            ))
        })
}

/// Strategy for generating full queue envelopes at arbitrary points in an
/// operation's life
pub fn queue_payload_strategy() -> impl Strategy<Value = ContinuationQueuePayload> {
    (
        target_name_strategy(),
        create_input_strategy(),
        tracking_id_strategy(),
        logger_properties_strategy(),
        0u32..=20,
        prop::option::of(operation_state_strategy()),
        0u64..=3600,
    )
        .prop_map(
            |(target, input, tracking_id, properties, step_count, status, retry_secs)| {
                let mut payload =
                    ContinuationQueuePayload::new(target, input, tracking_id, properties);
                payload.step_count = step_count;
                payload.status = status;
                payload.retry_after = Duration::from_secs(retry_secs);
                payload
            },
        )
}

/// Per-component presence and preserve flag: `None` means the record has no
/// component of that type.
pub fn component_flag_strategy() -> impl Strategy<Value = Option<bool>> {
    prop::option::of(any::<bool>())
}

/// Strategy for generating VM records with an arbitrary mix of deployment
/// progress, attached components, and preserve flags.
pub fn vm_record_strategy() -> impl Strategy<Value = ResourceRecord> {
    (
        resource_id_strategy(),
        resource_id_strategy(),
        azure_location_strategy(),
        any::<bool>(),
        component_flag_strategy(),
        component_flag_strategy(),
        component_flag_strategy(),
    )
        .prop_map(
            |(id, subscription_id, location, deployed, queue, nic, disk)| {
                let mut record =
                    ResourceRecord::new(id, ResourceType::ComputeVm, location, "standard_d4");
                if deployed {
                    record.azure_resource_info = Some(AzureResourceInfo::new(
                        subscription_id,
                        "rg-brokered-1",
                        format!("vm-{id}"),
                    ));
                }
                let mut attach = |component_type: ResourceType, prefix: &str, preserve: bool| {
                    let component = ResourceComponent::new(component_type).with_preserve(preserve);
                    let info = AzureResourceInfo::new(
                        subscription_id,
                        "rg-brokered-1",
                        format!("{prefix}-{}", component.component_id),
                    );
                    let component = component.with_azure_resource_info(info);
                    record.components.insert(component.component_id, component);
                };
                if let Some(preserve) = queue {
                    attach(ResourceType::InputQueue, "vm-input", preserve);
                }
                if let Some(preserve) = nic {
                    attach(ResourceType::NetworkInterface, "nic", preserve);
                }
                if let Some(preserve) = disk {
                    attach(ResourceType::OsDisk, "disk", preserve);
                }
                record
            },
        )
}

/// Strategy for generating non-VM records, deployed or not
pub fn basic_record_strategy() -> impl Strategy<Value = ResourceRecord> {
    (
        resource_id_strategy(),
        resource_id_strategy(),
        azure_location_strategy(),
        prop_oneof![
            Just(ResourceType::StorageFileShare),
            Just(ResourceType::KeyVault),
            Just(ResourceType::OsDisk),
            Just(ResourceType::InputQueue),
        ],
        any::<bool>(),
    )
        .prop_map(|(id, subscription_id, location, resource_type, deployed)| {
            let mut record = ResourceRecord::new(id, resource_type, location, "standard");
            if deployed {
                record.azure_resource_info = Some(AzureResourceInfo::new(
                    subscription_id,
                    "rg-brokered-1",
                    format!("{resource_type}-{id}"),
                ));
            }
            record
        })
}
