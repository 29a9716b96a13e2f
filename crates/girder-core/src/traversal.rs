//! Traversal query and result types

use crate::entity::{Entity, EntityId};
use crate::relation::{Direction, Relationship, RelationshipType};
use serde::{Deserialize, Serialize};

/// Path query builder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathQuery {
    /// Starting entity
    pub from: EntityId,

    /// Target entity
    pub to: EntityId,

    /// Maximum number of hops
    #[serde(default = "default_depth")]
    pub max_depth: u32,

    /// Edge direction followed from each node
    #[serde(default)]
    pub direction: Direction,

    /// Follow only these relationship types (empty = all types)
    #[serde(default)]
    pub relationship_types: Vec<RelationshipType>,
}

fn default_depth() -> u32 {
    10
}

impl PathQuery {
    pub fn new(from: EntityId, to: EntityId) -> Self {
        Self {
            from,
            to,
            max_depth: default_depth(),
            direction: Direction::Both,
            relationship_types: Vec::new(),
        }
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn filter_relationship_types(mut self, types: Vec<RelationshipType>) -> Self {
        self.relationship_types = types;
        self
    }

    pub fn follows(&self, rel: &Relationship) -> bool {
        self.relationship_types.is_empty()
            || self.relationship_types.contains(&rel.relationship_type)
    }
}

/// An entity reached by a traversal, with its hop distance from the start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityWithDepth {
    pub entity: Entity,

    /// 1 = directly connected to the start entity
    pub depth: u32,
}

/// An entity one hop away, with the connecting relationship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedEntity {
    pub entity: Entity,
    pub relationship: Relationship,
}

/// A node of a materialized CONTAINS hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub entity: Entity,
    pub children: Vec<HierarchyNode>,
}

impl HierarchyNode {
    pub fn leaf(entity: Entity) -> Self {
        Self {
            entity,
            children: Vec::new(),
        }
    }

    /// Number of nodes in this subtree, including self
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(HierarchyNode::size).sum::<usize>()
    }

    /// Number of levels below this node
    pub fn height(&self) -> usize {
        self.children
            .iter()
            .map(|c| 1 + c.height())
            .max()
            .unwrap_or(0)
    }

    pub fn find(&self, id: &EntityId) -> Option<&HierarchyNode> {
        if self.entity.id == *id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }
}

/// One step of a path: the entity reached and the edge used to reach it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathStep {
    pub entity: Entity,

    /// `None` for the first step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via: Option<Relationship>,
}

/// An ordered path through the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphPath {
    pub steps: Vec<PathStep>,
}

impl GraphPath {
    /// Trivial path consisting of a single entity
    pub fn single(entity: Entity) -> Self {
        Self {
            steps: vec![PathStep { entity, via: None }],
        }
    }

    /// Number of edges in the path
    pub fn length(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.steps.iter().map(|s| s.entity.id).collect()
    }

    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.steps.iter().filter_map(|s| s.via.as_ref())
    }
}

/// Traversal statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraversalStats {
    pub nodes_visited: usize,
    pub edges_traversed: usize,
    pub max_depth_reached: u32,
    pub skipped_missing: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_query_builder() {
        let a = EntityId::new();
        let b = EntityId::new();
        let query = PathQuery::new(a, b)
            .with_depth(4)
            .with_direction(Direction::Outgoing)
            .filter_relationship_types(vec![RelationshipType::DependsOn]);

        assert_eq!(query.max_depth, 4);
        assert!(query.follows(&Relationship::new(a, b, RelationshipType::DependsOn)));
        assert!(!query.follows(&Relationship::new(a, b, RelationshipType::Contains)));
        assert!(PathQuery::new(a, b).follows(&Relationship::new(a, b, "FEEDS")));
    }

    #[test]
    fn test_hierarchy_helpers() {
        let building = Entity::new("building", "HQ");
        let floor = Entity::new("floor", "L1");
        let room = Entity::new("room", "101");
        let room_id = room.id;

        let tree = HierarchyNode {
            entity: building,
            children: vec![HierarchyNode {
                entity: floor,
                children: vec![HierarchyNode::leaf(room)],
            }],
        };

        assert_eq!(tree.size(), 3);
        assert_eq!(tree.height(), 2);
        assert_eq!(tree.find(&room_id).map(|n| n.entity.name.as_str()), Some("101"));
        assert!(tree.find(&EntityId::new()).is_none());
    }

    #[test]
    fn test_single_path() {
        let entity = Entity::new("device", "Sensor");
        let path = GraphPath::single(entity.clone());
        assert_eq!(path.length(), 0);
        assert_eq!(path.entity_ids(), vec![entity.id]);
        assert_eq!(path.relationships().count(), 0);
    }
}
