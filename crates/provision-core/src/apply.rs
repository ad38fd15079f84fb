//! Apply Engine.
//!
//! Walks a [`ResourceGraph`] against an [`InfraApi`], issuing a lookup before
//! every create so re-applying the same configuration is a no-op on
//! resources that already exist.
//!
//! Scheduling is dataflow-driven: a node starts once every dependency has a
//! known result. Independent nodes (Address and Disk) may be in flight
//! together, bounded by [`ApplyOptions::max_concurrent`]. A node whose
//! dependency failed is recorded as `DependencyFailed` without any API call.
//! Results are always returned in the graph's topological order.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use provision_api::{InfraApi, ResolvedRefs, ResourceKey};
use tracing::{debug, info_span, Instrument};

use crate::error::NodeFailure;
use crate::graph::{ResourceDefinition, ResourceGraph};
use crate::metrics::METRICS;
use crate::obs::emit_node_applied;
use crate::report::{summarize, ApplyResult, InvocationOutcome};

/// Tuning knobs for one apply run.
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Maximum number of nodes with API calls in flight. `1` applies strictly
    /// sequentially in topological order. Values below 1 are treated as 1.
    pub max_concurrent: usize,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self { max_concurrent: 4 }
    }
}

impl ApplyOptions {
    pub fn sequential() -> Self {
        Self { max_concurrent: 1 }
    }
}

/// Whether a pending node may start.
enum Readiness<'g> {
    /// Some dependency has no result yet.
    Waiting,
    /// Every dependency is known and at least one failed (first in key order).
    Blocked(&'g ResourceKey),
    /// Every dependency succeeded; carries their remote ids.
    Ready(ResolvedRefs),
}

/// Applies resource graphs against one infrastructure backend.
pub struct ApplyEngine {
    api: Arc<dyn InfraApi>,
    options: ApplyOptions,
}

impl ApplyEngine {
    pub fn new(api: Arc<dyn InfraApi>, options: ApplyOptions) -> Self {
        Self { api, options }
    }

    /// Apply every node and summarize the results.
    pub async fn apply(&self, graph: &ResourceGraph) -> InvocationOutcome {
        summarize(self.apply_nodes(graph).await)
    }

    /// Apply every node, returning per-node results in topological order.
    pub async fn apply_nodes(&self, graph: &ResourceGraph) -> Vec<ApplyResult> {
        let limit = self.options.max_concurrent.max(1);
        let mut results: BTreeMap<ResourceKey, ApplyResult> = BTreeMap::new();
        let mut pending: Vec<&ResourceDefinition> = graph.nodes().collect();
        let mut in_flight = FuturesUnordered::new();

        loop {
            // Topological order guarantees a node blocked in this pass is seen
            // before any of its dependents further down `pending`.
            let mut i = 0;
            while i < pending.len() && in_flight.len() < limit {
                let def = pending[i];
                match readiness(graph, def, &results) {
                    Readiness::Waiting => i += 1,
                    Readiness::Blocked(parent) => {
                        pending.remove(i);
                        let result = ApplyResult::failed(
                            def.key.clone(),
                            NodeFailure::DependencyFailed(parent.path()),
                        );
                        METRICS.inc_failures();
                        emit_node_applied(&result);
                        results.insert(def.key.clone(), result);
                    }
                    Readiness::Ready(refs) => {
                        pending.remove(i);
                        in_flight.push(self.apply_node(def, refs));
                    }
                }
            }

            match in_flight.next().await {
                Some(result) => {
                    results.insert(result.key.clone(), result);
                }
                None => break,
            }
        }
        debug_assert!(pending.is_empty(), "acyclic graph leaves nothing pending");

        graph
            .topological_order()
            .iter()
            .filter_map(|key| results.remove(key))
            .collect()
    }

    /// Lookup-before-create for a single node whose dependencies succeeded.
    async fn apply_node(&self, def: &ResourceDefinition, refs: ResolvedRefs) -> ApplyResult {
        let span = info_span!("provision.node", kind = %def.kind(), key = %def.key);
        let result = async {
            METRICS.inc_lookups();
            match self.api.lookup(&def.key).await {
                Ok(Some(remote_id)) => {
                    debug!("resource already exists");
                    ApplyResult::already_exists(def.key.clone(), remote_id)
                }
                Ok(None) => {
                    METRICS.inc_creates();
                    match self.api.create(&def.key, &def.spec, &refs).await {
                        Ok(remote_id) => ApplyResult::created(def.key.clone(), remote_id),
                        Err(e) => ApplyResult::failed(def.key.clone(), e.into()),
                    }
                }
                Err(e) => ApplyResult::failed(def.key.clone(), e.into()),
            }
        }
        .instrument(span)
        .await;

        if !result.is_success() {
            METRICS.inc_failures();
        }
        emit_node_applied(&result);
        result
    }
}

fn readiness<'g>(
    graph: &'g ResourceGraph,
    def: &ResourceDefinition,
    results: &BTreeMap<ResourceKey, ApplyResult>,
) -> Readiness<'g> {
    let mut refs = ResolvedRefs::new();
    let mut failed: Option<&'g ResourceKey> = None;

    for dependency in graph.dependencies_of(&def.key) {
        match results.get(dependency) {
            None => return Readiness::Waiting,
            Some(result) => match result.remote_id() {
                Some(remote_id) => {
                    refs.insert(dependency.clone(), remote_id.clone());
                }
                None => {
                    failed.get_or_insert(dependency);
                }
            },
        }
    }

    match failed {
        Some(parent) => Readiness::Blocked(parent),
        None => Readiness::Ready(refs),
    }
}
