//! Shared fixtures for unit tests.

use crate::params::ParameterBag;

/// The canonical end-to-end parameter bag.
pub(crate) fn sample_bag() -> ParameterBag {
    [
        ("project", "p1"),
        ("network", "default"),
        ("instance_name", "vm1"),
        ("zone", "us-central1-a"),
        ("size", "50"),
        ("image", "debian-12"),
        ("machine_type", "e2-medium"),
        ("device_name", "boot"),
        ("type", "pd-ssd"),
        ("address_name", "ip1"),
        ("address_type", "EXTERNAL"),
        ("region", "us-central1"),
        ("network_tier", "PREMIUM"),
        ("additional_disk_name", "disk1"),
        ("additional_disk_type", "pd-standard"),
        ("additional_disk_size", "100"),
    ]
    .into_iter()
    .collect()
}

pub(crate) fn sample_config() -> crate::config::ProvisioningConfig {
    crate::params::validate(&sample_bag()).expect("sample bag is valid")
}
