//! Provisioning orchestrator: one invocation from parameter bag to outcome.
//!
//! validate → build graph → apply → summarize. Intake and graph errors
//! reject the invocation before any infrastructure API call is made.

use std::sync::Arc;
use std::time::Instant;

use provision_api::InfraApi;
use tracing::Instrument;

use crate::apply::{ApplyEngine, ApplyOptions};
use crate::config::ProvisioningConfig;
use crate::error::Result;
use crate::graph::ResourceGraph;
use crate::metrics::METRICS;
use crate::obs::{
    emit_invocation_finished, emit_invocation_rejected, emit_invocation_started, invocation_span,
};
use crate::params::{validate, ParameterBag};
use crate::report::InvocationOutcome;
use crate::trigger::{Relay, TriggerEvent};

/// Validated configuration plus the graph derived from it.
#[derive(Debug, Clone)]
pub struct Plan {
    pub config: ProvisioningConfig,
    pub graph: ResourceGraph,
}

/// Validate `bag` and derive its resource graph without touching any backend.
pub fn plan(bag: &ParameterBag) -> Result<Plan> {
    let config = validate(bag)?;
    let graph = ResourceGraph::build(&config)?;
    Ok(Plan { config, graph })
}

pub struct Orchestrator {
    engine: ApplyEngine,
}

impl Orchestrator {
    pub fn new(api: Arc<dyn InfraApi>, options: ApplyOptions) -> Self {
        Self {
            engine: ApplyEngine::new(api, options),
        }
    }

    /// Run one invocation. Never fails: every error ends up in the outcome.
    pub async fn invoke(&self, invocation_id: &str, bag: &ParameterBag) -> InvocationOutcome {
        METRICS.inc_invocations();
        let started = Instant::now();

        async {
            let plan = match plan(bag) {
                Ok(plan) => plan,
                Err(e) => {
                    emit_invocation_rejected(invocation_id, &e);
                    return InvocationOutcome::rejected(&e);
                }
            };

            emit_invocation_started(invocation_id, &plan.config.fingerprint());
            let outcome = self.engine.apply(&plan.graph).await;
            emit_invocation_finished(
                invocation_id,
                &outcome,
                started.elapsed().as_millis() as u64,
            );
            outcome
        }
        .instrument(invocation_span(invocation_id))
        .await
    }

    /// Run the invocation a trigger event describes and render its relay.
    pub async fn handle(&self, event: &TriggerEvent, bag: &ParameterBag) -> Relay {
        let outcome = self.invoke(event.invocation_id(), bag).await;
        Relay::new(event, &outcome)
    }
}
