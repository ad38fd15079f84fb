//! Validated, typed provisioning configuration.

use provision_api::{AddressType, BootDiskSpec, DiskType, NetworkTier};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Static address settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressConfig {
    pub name: String,
    pub address_type: AddressType,
    pub network_tier: NetworkTier,
}

/// Additional (non-boot) disk settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiskConfig {
    pub name: String,
    pub disk_type: DiskType,
    pub size_gb: u64,
}

/// Typed expansion of a [`crate::params::ParameterBag`].
///
/// Only [`crate::params::validate`] constructs this type from raw input, so
/// every field any resource definition needs is present and well-typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisioningConfig {
    pub project: String,
    pub network: String,
    pub zone: String,
    pub region: String,
    pub instance_name: String,
    pub machine_type: String,
    pub boot_disk: BootDiskSpec,
    pub address: AddressConfig,
    pub additional_disk: DiskConfig,
}

impl ProvisioningConfig {
    /// SHA-256 over the canonical JSON rendering of the config.
    ///
    /// Equal configs always share a fingerprint, so separate invocations over
    /// the same parameters can be correlated in logs and relays.
    pub fn fingerprint(&self) -> String {
        // Serializing a struct of strings, integers and unit enums cannot fail.
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        hex::encode(hasher.finalize())
    }
}
