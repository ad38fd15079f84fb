//! Provision-API: infrastructure API boundary for the provisioner
//!
//! This crate owns everything the orchestrator knows about the remote
//! infrastructure provider. The provider itself is a black box that exposes
//! lookup/create per resource kind.
//!
//! ## Layer 0 - External boundary
//!
//! ## Key Components
//!
//! - `InfraApi`: async lookup/create contract consumed by the apply engine
//! - `ResourceKey` / `ResourceSpec`: identity and payload of one resource
//! - `MemoryInfraApi`: stateful in-memory fake (tests and dry runs)
//! - `RestInfraApi`: reqwest-backed adapter for a compute REST API

mod error;
pub mod fakes;
pub mod infra_traits;
pub mod resource;
pub mod rest;

pub use error::{ApiError, ApiResult};
pub use fakes::MemoryInfraApi;
pub use infra_traits::{InfraApi, ResolvedRefs};
pub use resource::{
    AddressSpec, AddressType, AttachmentSpec, BootDiskSpec, DiskSpec, DiskType, InstanceSpec,
    NetworkTier, RemoteId, ResourceKey, ResourceKind, ResourceSpec,
};
pub use rest::{ApiConfig, RestInfraApi};
