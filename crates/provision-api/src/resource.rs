//! Resource model shared between the orchestrator and the provider.
//!
//! Every provisionable entity has a [`ResourceKind`], a stable
//! [`ResourceKey`] derived from its configuration, and a kind-specific
//! [`ResourceSpec`] payload.

use serde::{Deserialize, Serialize, Serializer};

// ---------------------------------------------------------------------------
// ResourceKind
// ---------------------------------------------------------------------------

/// The fixed set of provisionable entities.
///
/// Declaration order is the canonical ordinal used for deterministic
/// tie-breaking when several nodes are ready at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Static IP address (regional)
    Address,
    /// Compute instance with its boot disk
    Instance,
    /// Additional persistent disk (zonal)
    Disk,
    /// Attachment of the additional disk to the instance
    Attachment,
}

impl ResourceKind {
    /// Lowercase name used in summaries and logs.
    pub fn name(&self) -> &'static str {
        match self {
            ResourceKind::Address => "address",
            ResourceKind::Instance => "instance",
            ResourceKind::Disk => "disk",
            ResourceKind::Attachment => "attachment",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Enum-like parameters
// ---------------------------------------------------------------------------

/// Static address type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AddressType {
    External,
    Internal,
}

impl AddressType {
    pub const ALLOWED: &'static [&'static str] = &["EXTERNAL", "INTERNAL"];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "EXTERNAL" => Some(AddressType::External),
            "INTERNAL" => Some(AddressType::Internal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AddressType::External => "EXTERNAL",
            AddressType::Internal => "INTERNAL",
        }
    }
}

/// Network service tier of an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkTier {
    Premium,
    Standard,
}

impl NetworkTier {
    pub const ALLOWED: &'static [&'static str] = &["PREMIUM", "STANDARD"];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "PREMIUM" => Some(NetworkTier::Premium),
            "STANDARD" => Some(NetworkTier::Standard),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkTier::Premium => "PREMIUM",
            NetworkTier::Standard => "STANDARD",
        }
    }
}

/// Persistent disk type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiskType {
    PdStandard,
    PdBalanced,
    PdSsd,
    PdExtreme,
}

impl DiskType {
    pub const ALLOWED: &'static [&'static str] =
        &["pd-standard", "pd-balanced", "pd-ssd", "pd-extreme"];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pd-standard" => Some(DiskType::PdStandard),
            "pd-balanced" => Some(DiskType::PdBalanced),
            "pd-ssd" => Some(DiskType::PdSsd),
            "pd-extreme" => Some(DiskType::PdExtreme),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiskType::PdStandard => "pd-standard",
            DiskType::PdBalanced => "pd-balanced",
            DiskType::PdSsd => "pd-ssd",
            DiskType::PdExtreme => "pd-extreme",
        }
    }
}

// ---------------------------------------------------------------------------
// ResourceKey
// ---------------------------------------------------------------------------

/// Stable identity of a resource, derived from configuration only.
///
/// Rendered as a provider-style path, e.g.
/// `projects/p1/zones/us-central1-a/instances/vm1`. Two builds from the same
/// configuration always produce equal keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    kind: ResourceKind,
    project: String,
    /// Region for addresses, zone for everything else.
    location: String,
    /// Owning instance for attachments.
    parent: Option<String>,
    name: String,
}

impl ResourceKey {
    pub fn address(project: &str, region: &str, name: &str) -> Self {
        Self::new(ResourceKind::Address, project, region, None, name)
    }

    pub fn instance(project: &str, zone: &str, name: &str) -> Self {
        Self::new(ResourceKind::Instance, project, zone, None, name)
    }

    pub fn disk(project: &str, zone: &str, name: &str) -> Self {
        Self::new(ResourceKind::Disk, project, zone, None, name)
    }

    pub fn attachment(project: &str, zone: &str, instance: &str, disk: &str) -> Self {
        Self::new(
            ResourceKind::Attachment,
            project,
            zone,
            Some(instance.to_string()),
            disk,
        )
    }

    fn new(
        kind: ResourceKind,
        project: &str,
        location: &str,
        parent: Option<String>,
        name: &str,
    ) -> Self {
        Self {
            kind,
            project: project.to_string(),
            location: location.to_string(),
            parent,
            name: name.to_string(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the collection this resource is created in.
    ///
    /// For attachments this is the owning instance's path.
    pub fn collection_path(&self) -> String {
        match (self.kind, &self.parent) {
            (ResourceKind::Address, _) => {
                format!("projects/{}/regions/{}/addresses", self.project, self.location)
            }
            (ResourceKind::Instance, _) => {
                format!("projects/{}/zones/{}/instances", self.project, self.location)
            }
            (ResourceKind::Disk, _) => {
                format!("projects/{}/zones/{}/disks", self.project, self.location)
            }
            (ResourceKind::Attachment, parent) => format!(
                "projects/{}/zones/{}/instances/{}",
                self.project,
                self.location,
                parent.as_deref().unwrap_or_default()
            ),
        }
    }

    /// Full provider-style path.
    pub fn path(&self) -> String {
        match self.kind {
            ResourceKind::Attachment => {
                format!("{}/attachedDisks/{}", self.collection_path(), self.name)
            }
            _ => format!("{}/{}", self.collection_path(), self.name),
        }
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path())
    }
}

impl Serialize for ResourceKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.path())
    }
}

// ---------------------------------------------------------------------------
// ResourceSpec
// ---------------------------------------------------------------------------

/// Static IP address payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressSpec {
    pub name: String,
    pub region: String,
    pub address_type: AddressType,
    pub network_tier: NetworkTier,
}

/// Boot disk created together with the instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootDiskSpec {
    pub device_name: String,
    pub image: String,
    pub disk_type: DiskType,
    pub size_gb: u64,
}

/// Compute instance payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceSpec {
    pub name: String,
    pub zone: String,
    pub machine_type: String,
    pub network: String,
    pub boot_disk: BootDiskSpec,
    /// Static address assigned to the instance's external interface.
    pub address: ResourceKey,
}

/// Additional persistent disk payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiskSpec {
    pub name: String,
    pub zone: String,
    pub disk_type: DiskType,
    pub size_gb: u64,
}

/// Attachment of a disk to an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentSpec {
    pub instance: ResourceKey,
    pub disk: ResourceKey,
    pub device_name: String,
}

/// Kind-specific payload of a resource definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceSpec {
    Address(AddressSpec),
    Instance(InstanceSpec),
    Disk(DiskSpec),
    Attachment(AttachmentSpec),
}

impl ResourceSpec {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSpec::Address(_) => ResourceKind::Address,
            ResourceSpec::Instance(_) => ResourceKind::Instance,
            ResourceSpec::Disk(_) => ResourceKind::Disk,
            ResourceSpec::Attachment(_) => ResourceKind::Attachment,
        }
    }

    /// Keys of other resources this payload refers to.
    pub fn references(&self) -> Vec<&ResourceKey> {
        match self {
            ResourceSpec::Address(_) | ResourceSpec::Disk(_) => Vec::new(),
            ResourceSpec::Instance(spec) => vec![&spec.address],
            ResourceSpec::Attachment(spec) => vec![&spec.instance, &spec.disk],
        }
    }
}

// ---------------------------------------------------------------------------
// RemoteId
// ---------------------------------------------------------------------------

/// Identifier the provider returns for a materialized resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
    pub fn new(id: impl Into<String>) -> Self {
        RemoteId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RemoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
