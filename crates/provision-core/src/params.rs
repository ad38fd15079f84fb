//! Parameter Intake: validate a flat parameter bag into a [`ProvisioningConfig`].
//!
//! Validation is pure. Presence of every required key is checked first, in
//! the fixed [`REQUIRED_KEYS`] order, so the reported missing key never
//! depends on map iteration order. Coercion and allow-list checks follow.

use std::collections::BTreeMap;

use provision_api::{AddressType, BootDiskSpec, DiskType, NetworkTier};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::{AddressConfig, DiskConfig, ProvisioningConfig};
use crate::error::IntakeError;

/// Every recognized parameter, in validation order. All are required.
pub const REQUIRED_KEYS: [&str; 16] = [
    "project",
    "network",
    "instance_name",
    "machine_type",
    "zone",
    "device_name",
    "image",
    "size",
    "type",
    "address_name",
    "address_type",
    "region",
    "network_tier",
    "additional_disk_name",
    "additional_disk_type",
    "additional_disk_size",
];

/// Raw parameter name → value mapping as received from a trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterBag(BTreeMap<String, String>);

impl ParameterBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Fill in every key of `defaults` that this bag does not already carry.
    pub fn merge_defaults(&mut self, defaults: &ParameterBag) {
        for (name, value) in defaults.iter() {
            self.0
                .entry(name.to_string())
                .or_insert_with(|| value.to_string());
        }
    }

    /// Parse a `name=value` assignment.
    pub fn parse_assignment(raw: &str) -> Result<(String, String), IntakeError> {
        match raw.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => {
                Ok((name.trim().to_string(), value.to_string()))
            }
            _ => Err(IntakeError::InvalidValue {
                name: raw.to_string(),
                reason: "expected name=value".to_string(),
            }),
        }
    }

    /// Build a bag from a JSON object. Numbers and booleans are kept in their
    /// textual form; nulls are dropped; nested values are rejected.
    pub fn from_json(value: &Value) -> Result<Self, IntakeError> {
        let object = value.as_object().ok_or_else(|| IntakeError::InvalidValue {
            name: "parameters".to_string(),
            reason: "expected a JSON object".to_string(),
        })?;

        let mut bag = ParameterBag::new();
        for (name, raw) in object {
            let text = match raw {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null => continue,
                Value::Array(_) | Value::Object(_) => {
                    return Err(IntakeError::InvalidValue {
                        name: name.clone(),
                        reason: "expected a scalar value".to_string(),
                    })
                }
            };
            bag.insert(name.clone(), text);
        }
        Ok(bag)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParameterBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        ParameterBag(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Validate `bag` into a typed configuration.
pub fn validate(bag: &ParameterBag) -> Result<ProvisioningConfig, IntakeError> {
    for key in REQUIRED_KEYS {
        if present(bag, key).is_none() {
            return Err(IntakeError::MissingParameter(key.to_string()));
        }
    }

    for (name, _) in bag.iter() {
        if !REQUIRED_KEYS.contains(&name) {
            debug!(parameter = %name, "ignoring unrecognized parameter");
        }
    }

    let text = |key: &str| present(bag, key).unwrap_or_default().to_string();

    Ok(ProvisioningConfig {
        project: text("project"),
        network: text("network"),
        zone: text("zone"),
        region: text("region"),
        instance_name: text("instance_name"),
        machine_type: text("machine_type"),
        boot_disk: BootDiskSpec {
            device_name: text("device_name"),
            image: text("image"),
            disk_type: one_of(bag, "type", DiskType::parse, DiskType::ALLOWED)?,
            size_gb: positive(bag, "size")?,
        },
        address: AddressConfig {
            name: text("address_name"),
            address_type: one_of(bag, "address_type", AddressType::parse, AddressType::ALLOWED)?,
            network_tier: one_of(bag, "network_tier", NetworkTier::parse, NetworkTier::ALLOWED)?,
        },
        additional_disk: DiskConfig {
            name: text("additional_disk_name"),
            disk_type: one_of(bag, "additional_disk_type", DiskType::parse, DiskType::ALLOWED)?,
            size_gb: positive(bag, "additional_disk_size")?,
        },
    })
}

/// Trimmed value of `key`; blank values count as absent.
fn present<'a>(bag: &'a ParameterBag, key: &str) -> Option<&'a str> {
    bag.get(key).map(str::trim).filter(|v| !v.is_empty())
}

fn positive(bag: &ParameterBag, key: &str) -> Result<u64, IntakeError> {
    let raw = present(bag, key).unwrap_or_default();
    let invalid = |reason: String| IntakeError::InvalidValue {
        name: key.to_string(),
        reason,
    };
    let parsed: i128 = raw
        .parse()
        .map_err(|_| invalid(format!("{raw:?} is not an integer")))?;
    if parsed <= 0 {
        return Err(invalid(format!("{parsed} is not positive")));
    }
    u64::try_from(parsed).map_err(|_| invalid(format!("{parsed} is too large")))
}

fn one_of<T>(
    bag: &ParameterBag,
    key: &str,
    parse: fn(&str) -> Option<T>,
    allowed: &[&str],
) -> Result<T, IntakeError> {
    let raw = present(bag, key).unwrap_or_default();
    parse(raw).ok_or_else(|| IntakeError::InvalidValue {
        name: key.to_string(),
        reason: format!("{raw:?} is not one of {}", allowed.join(", ")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_bag;

    #[test]
    fn test_valid_bag_produces_typed_config() {
        let cfg = validate(&sample_bag()).unwrap();
        assert_eq!(cfg.project, "p1");
        assert_eq!(cfg.boot_disk.size_gb, 50);
        assert_eq!(cfg.boot_disk.disk_type, DiskType::PdSsd);
        assert_eq!(cfg.address.address_type, AddressType::External);
        assert_eq!(cfg.address.network_tier, NetworkTier::Premium);
        assert_eq!(cfg.additional_disk.size_gb, 100);
        assert_eq!(cfg.additional_disk.disk_type, DiskType::PdStandard);
    }

    #[test]
    fn test_missing_machine_type() {
        let mut bag = sample_bag();
        bag.remove("machine_type");
        assert_eq!(
            validate(&bag),
            Err(IntakeError::MissingParameter("machine_type".to_string()))
        );
    }

    #[test]
    fn test_first_missing_key_follows_fixed_order() {
        let mut bag = sample_bag();
        bag.remove("additional_disk_size");
        bag.remove("network");
        bag.remove("region");
        assert_eq!(
            validate(&bag),
            Err(IntakeError::MissingParameter("network".to_string()))
        );
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut bag = sample_bag();
        bag.insert("zone", "   ");
        assert_eq!(
            validate(&bag),
            Err(IntakeError::MissingParameter("zone".to_string()))
        );
    }

    #[test]
    fn test_missing_key_reported_before_invalid_value() {
        let mut bag = sample_bag();
        bag.insert("size", "abc");
        bag.remove("additional_disk_name");
        assert_eq!(
            validate(&bag),
            Err(IntakeError::MissingParameter("additional_disk_name".to_string()))
        );
    }

    #[test]
    fn test_negative_size_is_invalid() {
        let mut bag = sample_bag();
        bag.insert("size", "-5");
        match validate(&bag) {
            Err(IntakeError::InvalidValue { name, .. }) => assert_eq!(name, "size"),
            other => panic!("expected InvalidValue(size), got {other:?}"),
        }
    }

    #[test]
    fn test_zero_and_garbage_sizes_are_invalid() {
        for raw in ["0", "ten", "1.5"] {
            let mut bag = sample_bag();
            bag.insert("additional_disk_size", raw);
            assert!(matches!(
                validate(&bag),
                Err(IntakeError::InvalidValue { ref name, .. }) if name == "additional_disk_size"
            ));
        }
    }

    #[test]
    fn test_enum_values_checked_against_allow_list() {
        let mut bag = sample_bag();
        bag.insert("network_tier", "GOLD");
        let err = validate(&bag).unwrap_err();
        assert!(err.to_string().contains("PREMIUM, STANDARD"));

        let mut bag = sample_bag();
        bag.insert("additional_disk_type", "nvme");
        assert!(matches!(
            validate(&bag),
            Err(IntakeError::InvalidValue { ref name, .. }) if name == "additional_disk_type"
        ));
    }

    #[test]
    fn test_values_are_trimmed() {
        let mut bag = sample_bag();
        bag.insert("size", " 20 ");
        bag.insert("project", " p1 ");
        let cfg = validate(&bag).unwrap();
        assert_eq!(cfg.boot_disk.size_gb, 20);
        assert_eq!(cfg.project, "p1");
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let mut bag = sample_bag();
        bag.insert("labels", "team=infra");
        assert!(validate(&bag).is_ok());
    }

    #[test]
    fn test_merge_defaults_keeps_supplied_values() {
        let mut bag: ParameterBag = [("zone", "europe-west1-b")].into_iter().collect();
        let defaults: ParameterBag = [("zone", "us-central1-a"), ("network", "default")]
            .into_iter()
            .collect();
        bag.merge_defaults(&defaults);
        assert_eq!(bag.get("zone"), Some("europe-west1-b"));
        assert_eq!(bag.get("network"), Some("default"));
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            ParameterBag::parse_assignment("size=50").unwrap(),
            ("size".to_string(), "50".to_string())
        );
        assert_eq!(
            ParameterBag::parse_assignment("labels=a=b").unwrap().1,
            "a=b"
        );
        assert!(ParameterBag::parse_assignment("size").is_err());
        assert!(ParameterBag::parse_assignment("=50").is_err());
    }

    #[test]
    fn test_from_json_stringifies_scalars() {
        let value = serde_json::json!({"size": 50, "zone": "z", "skip": null});
        let bag = ParameterBag::from_json(&value).unwrap();
        assert_eq!(bag.get("size"), Some("50"));
        assert_eq!(bag.get("zone"), Some("z"));
        assert_eq!(bag.get("skip"), None);

        assert!(ParameterBag::from_json(&serde_json::json!({"a": [1]})).is_err());
        assert!(ParameterBag::from_json(&serde_json::json!([1])).is_err());
    }

    #[test]
    fn test_fingerprint_is_stable_and_sensitive() {
        let a = validate(&sample_bag()).unwrap();
        let b = validate(&sample_bag()).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);

        let mut bag = sample_bag();
        bag.insert("size", "51");
        assert_ne!(validate(&bag).unwrap().fingerprint(), a.fingerprint());
    }
}
