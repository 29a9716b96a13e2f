//! Whole-graph views: topology snapshots and statistics

use crate::entity::{Entity, EntityId};
use crate::relation::Relationship;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Nodes and edges of (part of) the graph, for visualization and export
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Topology {
    pub nodes: Vec<Entity>,
    pub edges: Vec<Relationship>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(mut self, nodes: Vec<Entity>) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn with_edges(mut self, edges: Vec<Relationship>) -> Self {
        self.edges = edges;
        self
    }

    /// Drop edges whose endpoints are not both among the nodes
    pub fn prune_dangling_edges(mut self) -> Self {
        let ids: HashSet<EntityId> = self.nodes.iter().map(|n| n.id).collect();
        self.edges
            .retain(|e| ids.contains(&e.source_id) && ids.contains(&e.target_id));
        self
    }
}

/// Global counts over the graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStatistics {
    pub total_entities: usize,
    pub total_relationships: usize,
    pub entities_by_type: BTreeMap<String, usize>,
    pub relationships_by_type: BTreeMap<String, usize>,
}
