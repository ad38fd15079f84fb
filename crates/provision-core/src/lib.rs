//! Provisioner Core Library
//!
//! Turns a flat parameter bag into a validated configuration, derives the
//! dependency graph of cloud resources it implies, applies that graph
//! idempotently against an [`provision_api::InfraApi`] and summarizes the
//! outcome for the trigger that started the invocation.

pub mod apply;
pub mod config;
pub mod error;
pub mod graph;
pub mod metrics;
pub mod obs;
pub mod orchestrator;
pub mod params;
pub mod report;
pub mod telemetry;
pub mod trigger;

#[cfg(test)]
mod test_support;

pub use apply::{ApplyEngine, ApplyOptions};
pub use config::{AddressConfig, DiskConfig, ProvisioningConfig};
pub use error::{GraphError, IntakeError, NodeFailure, ProvisionError, Result};
pub use graph::{DependencyEdge, ResourceDefinition, ResourceGraph};
pub use metrics::{MetricsSnapshot, METRICS};
pub use obs::{
    emit_invocation_finished, emit_invocation_rejected, emit_invocation_started,
    emit_node_applied, invocation_span, InvocationSpan,
};
pub use orchestrator::{plan, Orchestrator, Plan};
pub use params::{validate, ParameterBag, REQUIRED_KEYS};
pub use report::{summarize, ApplyResult, ApplyStatus, InvocationOutcome, OutcomeStatus};
pub use telemetry::init_tracing;
pub use trigger::{IncidentPayload, Relay, RelayMessage, TriggerEvent, VcsPushPayload};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
