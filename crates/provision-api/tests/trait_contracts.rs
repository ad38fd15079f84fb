//! Contract tests for the InfraApi trait.
//!
//! These tests exercise the lookup/create contract through a trait object
//! using the in-memory fake. Any conforming provider adapter must behave the
//! same way.

use std::sync::Arc;

use provision_api::fakes::MemoryInfraApi;
use provision_api::*;

fn address() -> (ResourceKey, ResourceSpec) {
    (
        ResourceKey::address("p1", "us-central1", "ip1"),
        ResourceSpec::Address(AddressSpec {
            name: "ip1".to_string(),
            region: "us-central1".to_string(),
            address_type: AddressType::External,
            network_tier: NetworkTier::Premium,
        }),
    )
}

fn instance(address: &ResourceKey) -> (ResourceKey, ResourceSpec) {
    (
        ResourceKey::instance("p1", "us-central1-a", "vm1"),
        ResourceSpec::Instance(InstanceSpec {
            name: "vm1".to_string(),
            zone: "us-central1-a".to_string(),
            machine_type: "e2-medium".to_string(),
            network: "default".to_string(),
            boot_disk: BootDiskSpec {
                device_name: "boot".to_string(),
                image: "debian-12".to_string(),
                disk_type: DiskType::PdSsd,
                size_gb: 50,
            },
            address: address.clone(),
        }),
    )
}

#[tokio::test]
async fn lookup_of_absent_resource_is_none() {
    let api: Arc<dyn InfraApi> = Arc::new(MemoryInfraApi::new());
    let (key, _) = address();
    assert_eq!(api.lookup(&key).await.unwrap(), None);
}

#[tokio::test]
async fn create_is_visible_to_lookup() {
    let api: Arc<dyn InfraApi> = Arc::new(MemoryInfraApi::new());
    let (key, spec) = address();
    let id = api.create(&key, &spec, &ResolvedRefs::new()).await.unwrap();
    assert_eq!(api.lookup(&key).await.unwrap(), Some(id));
}

#[tokio::test]
async fn create_with_unresolved_reference_fails() {
    let api = MemoryInfraApi::new();
    let (address_key, _) = address();
    let (key, spec) = instance(&address_key);

    let err = api
        .create(&key, &spec, &ResolvedRefs::new())
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::MissingReference(address_key.path()));
    assert!(api.is_empty());
}

#[tokio::test]
async fn create_with_resolved_reference_succeeds() {
    let api = MemoryInfraApi::new();
    let (address_key, address_spec) = address();
    let ip = api
        .create(&address_key, &address_spec, &ResolvedRefs::new())
        .await
        .unwrap();

    let mut refs = ResolvedRefs::new();
    refs.insert(address_key.clone(), ip);
    let (key, spec) = instance(&address_key);
    let id = api.create(&key, &spec, &refs).await.unwrap();

    assert_eq!(id.as_str(), "instance-2");
    assert_eq!(api.create_calls(), 2);
}

#[tokio::test]
async fn lookup_never_creates() {
    let api = MemoryInfraApi::new();
    let (key, _) = address();
    for _ in 0..3 {
        api.lookup(&key).await.unwrap();
    }
    assert_eq!(api.lookup_calls(), 3);
    assert_eq!(api.create_calls(), 0);
    assert!(api.is_empty());
}
