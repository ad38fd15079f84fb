//! Resource Graph Builder.
//!
//! Expands a [`ProvisioningConfig`] into four resource definitions and the
//! "must exist before" edges between them. An edge `from → to` means `to`
//! must be created or observed present before `from` is created.
//!
//! Edges are derived from the references each spec carries, which fixes
//! them by kind: Instance → Address, Attachment → Instance, Attachment →
//! Disk. Topological ordering is Kahn's algorithm with the ready set ordered
//! by key (and therefore by kind ordinal first), so the order is stable
//! across runs: Address, Instance, Disk, Attachment.

use std::collections::{BTreeMap, BTreeSet};

use provision_api::{
    AddressSpec, AttachmentSpec, DiskSpec, InstanceSpec, ResourceKey, ResourceKind, ResourceSpec,
};
use serde::Serialize;

use crate::config::ProvisioningConfig;
use crate::error::GraphError;

/// A node of the resource graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceDefinition {
    pub key: ResourceKey,
    pub spec: ResourceSpec,
}

impl ResourceDefinition {
    pub fn new(key: ResourceKey, spec: ResourceSpec) -> Self {
        Self { key, spec }
    }

    pub fn kind(&self) -> ResourceKind {
        self.spec.kind()
    }
}

/// `from` depends on `to`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DependencyEdge {
    pub from: ResourceKey,
    pub to: ResourceKey,
}

/// Validated DAG of resource definitions with a precomputed topological order.
#[derive(Debug, Clone)]
pub struct ResourceGraph {
    nodes: BTreeMap<ResourceKey, ResourceDefinition>,
    edges: BTreeSet<DependencyEdge>,
    /// `dependency → {dependent, ...}`
    downstream: BTreeMap<ResourceKey, BTreeSet<ResourceKey>>,
    /// `dependent → {dependency, ...}`
    upstream: BTreeMap<ResourceKey, BTreeSet<ResourceKey>>,
    order: Vec<ResourceKey>,
}

impl ResourceGraph {
    /// Stamp the fixed topology with identities and specs from `cfg`.
    pub fn build(cfg: &ProvisioningConfig) -> Result<Self, GraphError> {
        let address_key = ResourceKey::address(&cfg.project, &cfg.region, &cfg.address.name);
        let instance_key = ResourceKey::instance(&cfg.project, &cfg.zone, &cfg.instance_name);
        let disk_key = ResourceKey::disk(&cfg.project, &cfg.zone, &cfg.additional_disk.name);
        let attachment_key = ResourceKey::attachment(
            &cfg.project,
            &cfg.zone,
            &cfg.instance_name,
            &cfg.additional_disk.name,
        );

        let definitions = vec![
            ResourceDefinition::new(
                address_key.clone(),
                ResourceSpec::Address(AddressSpec {
                    name: cfg.address.name.clone(),
                    region: cfg.region.clone(),
                    address_type: cfg.address.address_type,
                    network_tier: cfg.address.network_tier,
                }),
            ),
            ResourceDefinition::new(
                instance_key.clone(),
                ResourceSpec::Instance(InstanceSpec {
                    name: cfg.instance_name.clone(),
                    zone: cfg.zone.clone(),
                    machine_type: cfg.machine_type.clone(),
                    network: cfg.network.clone(),
                    boot_disk: cfg.boot_disk.clone(),
                    address: address_key,
                }),
            ),
            ResourceDefinition::new(
                disk_key.clone(),
                ResourceSpec::Disk(DiskSpec {
                    name: cfg.additional_disk.name.clone(),
                    zone: cfg.zone.clone(),
                    disk_type: cfg.additional_disk.disk_type,
                    size_gb: cfg.additional_disk.size_gb,
                }),
            ),
            ResourceDefinition::new(
                attachment_key,
                ResourceSpec::Attachment(AttachmentSpec {
                    instance: instance_key,
                    disk: disk_key,
                    device_name: cfg.additional_disk.name.clone(),
                }),
            ),
        ];

        Self::from_definitions(definitions)
    }

    /// Assemble a graph from arbitrary definitions, deriving edges from spec
    /// references and rejecting duplicates, dangling references and cycles.
    pub fn from_definitions(definitions: Vec<ResourceDefinition>) -> Result<Self, GraphError> {
        let mut graph = ResourceGraph {
            nodes: BTreeMap::new(),
            edges: BTreeSet::new(),
            downstream: BTreeMap::new(),
            upstream: BTreeMap::new(),
            order: Vec::new(),
        };

        for def in definitions {
            if graph.nodes.contains_key(&def.key) {
                return Err(GraphError::DuplicateNode(def.key.path()));
            }
            graph.downstream.entry(def.key.clone()).or_default();
            graph.upstream.entry(def.key.clone()).or_default();
            graph.nodes.insert(def.key.clone(), def);
        }

        let references: Vec<(ResourceKey, ResourceKey)> = graph
            .nodes
            .values()
            .flat_map(|def| {
                def.spec
                    .references()
                    .into_iter()
                    .map(move |target| (def.key.clone(), target.clone()))
            })
            .collect();

        for (from, to) in references {
            if !graph.nodes.contains_key(&to) {
                return Err(GraphError::UnresolvedReference {
                    from: from.path(),
                    missing: to.path(),
                });
            }
            graph
                .downstream
                .entry(to.clone())
                .or_default()
                .insert(from.clone());
            graph
                .upstream
                .entry(from.clone())
                .or_default()
                .insert(to.clone());
            graph.edges.insert(DependencyEdge { from, to });
        }

        graph.order = graph.kahn_order()?;
        Ok(graph)
    }

    /// Definitions in topological order.
    pub fn nodes(&self) -> impl Iterator<Item = &ResourceDefinition> {
        self.order.iter().filter_map(|key| self.nodes.get(key))
    }

    pub fn node(&self, key: &ResourceKey) -> Option<&ResourceDefinition> {
        self.nodes.get(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edges(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.edges.iter()
    }

    /// Keys in topological order (dependencies before dependents).
    pub fn topological_order(&self) -> &[ResourceKey] {
        &self.order
    }

    /// Direct dependencies of `key`.
    pub fn dependencies_of(&self, key: &ResourceKey) -> impl Iterator<Item = &ResourceKey> {
        self.upstream.get(key).into_iter().flatten()
    }

    /// Direct dependents of `key`.
    pub fn dependents_of(&self, key: &ResourceKey) -> impl Iterator<Item = &ResourceKey> {
        self.downstream.get(key).into_iter().flatten()
    }

    /// Kahn waves: every node in wave `n` depends only on nodes in earlier
    /// waves, so a wave's members are independent of each other.
    pub fn levels(&self) -> Vec<Vec<&ResourceKey>> {
        let mut levels: Vec<Vec<&ResourceKey>> = Vec::new();
        let mut level_of: BTreeMap<&ResourceKey, usize> = BTreeMap::new();
        for key in &self.order {
            let level = self
                .dependencies_of(key)
                .filter_map(|dep| level_of.get(dep))
                .map(|l| l + 1)
                .max()
                .unwrap_or(0);
            level_of.insert(key, level);
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(key);
        }
        levels
    }

    /// Kahn's algorithm over a min-ordered ready set.
    fn kahn_order(&self) -> Result<Vec<ResourceKey>, GraphError> {
        let mut in_degree: BTreeMap<&ResourceKey, usize> = self
            .nodes
            .keys()
            .map(|key| (key, self.upstream.get(key).map_or(0, BTreeSet::len)))
            .collect();

        let mut ready: BTreeSet<&ResourceKey> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&key, _)| key)
            .collect();

        let mut sorted = Vec::with_capacity(self.nodes.len());
        while let Some(key) = ready.pop_first() {
            sorted.push(key.clone());
            for dependent in self.dependents_of(key) {
                if let Some(deg) = in_degree.get_mut(dependent) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        if sorted.len() != self.nodes.len() {
            let placed: BTreeSet<&ResourceKey> = sorted.iter().collect();
            return Err(GraphError::Cycle(
                self.nodes
                    .keys()
                    .filter(|k| !placed.contains(k))
                    .map(ResourceKey::path)
                    .collect(),
            ));
        }
        Ok(sorted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_config;
    use provision_api::DiskType;

    fn kinds(graph: &ResourceGraph) -> Vec<ResourceKind> {
        graph.nodes().map(ResourceDefinition::kind).collect()
    }

    #[test]
    fn test_build_produces_four_nodes_and_three_edges() {
        let graph = ResourceGraph::build(&sample_config()).unwrap();
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.edges().count(), 3);
    }

    #[test]
    fn test_topological_order_is_canonical() {
        let graph = ResourceGraph::build(&sample_config()).unwrap();
        assert_eq!(
            kinds(&graph),
            vec![
                ResourceKind::Address,
                ResourceKind::Instance,
                ResourceKind::Disk,
                ResourceKind::Attachment,
            ]
        );
    }

    #[test]
    fn test_every_edge_respects_order() {
        let graph = ResourceGraph::build(&sample_config()).unwrap();
        let position = |key: &ResourceKey| {
            graph
                .topological_order()
                .iter()
                .position(|k| k == key)
                .unwrap()
        };
        for edge in graph.edges() {
            assert!(position(&edge.to) < position(&edge.from), "{edge:?}");
        }
    }

    #[test]
    fn test_edges_are_fixed_by_kind() {
        let graph = ResourceGraph::build(&sample_config()).unwrap();
        let mut pairs: Vec<(ResourceKind, ResourceKind)> = graph
            .edges()
            .map(|e| (e.from.kind(), e.to.kind()))
            .collect();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                (ResourceKind::Instance, ResourceKind::Address),
                (ResourceKind::Attachment, ResourceKind::Instance),
                (ResourceKind::Attachment, ResourceKind::Disk),
            ]
        );
    }

    #[test]
    fn test_keys_derive_from_config() {
        let graph = ResourceGraph::build(&sample_config()).unwrap();
        let paths: Vec<String> = graph.topological_order().iter().map(ResourceKey::path).collect();
        assert_eq!(
            paths,
            vec![
                "projects/p1/regions/us-central1/addresses/ip1",
                "projects/p1/zones/us-central1-a/instances/vm1",
                "projects/p1/zones/us-central1-a/disks/disk1",
                "projects/p1/zones/us-central1-a/instances/vm1/attachedDisks/disk1",
            ]
        );
    }

    #[test]
    fn test_rebuild_is_identical() {
        let a = ResourceGraph::build(&sample_config()).unwrap();
        let b = ResourceGraph::build(&sample_config()).unwrap();
        assert_eq!(a.topological_order(), b.topological_order());
        assert!(a.edges().eq(b.edges()));
        assert!(a.nodes().eq(b.nodes()));
    }

    #[test]
    fn test_levels_group_independent_nodes() {
        let graph = ResourceGraph::build(&sample_config()).unwrap();
        let levels: Vec<Vec<ResourceKind>> = graph
            .levels()
            .into_iter()
            .map(|level| level.into_iter().map(ResourceKey::kind).collect())
            .collect();
        assert_eq!(
            levels,
            vec![
                vec![ResourceKind::Address, ResourceKind::Disk],
                vec![ResourceKind::Instance],
                vec![ResourceKind::Attachment],
            ]
        );
    }

    #[test]
    fn test_dangling_reference_is_rejected() {
        let instance = ResourceKey::instance("p", "z", "vm");
        let disk = ResourceKey::disk("p", "z", "missing");
        let definitions = vec![ResourceDefinition::new(
            ResourceKey::attachment("p", "z", "vm", "missing"),
            ResourceSpec::Attachment(AttachmentSpec {
                instance,
                disk: disk.clone(),
                device_name: "missing".to_string(),
            }),
        )];
        match ResourceGraph::from_definitions(definitions) {
            Err(GraphError::UnresolvedReference { missing, .. }) => {
                assert!(missing == disk.path() || missing.contains("instances/vm"));
            }
            other => panic!("expected UnresolvedReference, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_node_is_rejected() {
        let key = ResourceKey::disk("p", "z", "d");
        let spec = ResourceSpec::Disk(DiskSpec {
            name: "d".to_string(),
            zone: "z".to_string(),
            disk_type: DiskType::PdBalanced,
            size_gb: 1,
        });
        let definitions = vec![
            ResourceDefinition::new(key.clone(), spec.clone()),
            ResourceDefinition::new(key, spec),
        ];
        assert!(matches!(
            ResourceGraph::from_definitions(definitions),
            Err(GraphError::DuplicateNode(_))
        ));
    }
}
