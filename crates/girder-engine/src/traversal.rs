//! Graph traversal over the stored relationships
//!
//! Every walk is a breadth-first search with an explicit visited set, so
//! cyclic data terminates and no entity is expanded twice. Neighbours are
//! visited in relationship order (creation time, then id). An entity that
//! disappears between reading an edge and loading the entity is skipped.

use crate::config::EngineConfig;
use girder_core::{
    Direction, Entity, EntityId, EntityWithDepth, Error, GraphPath, HierarchyNode, PathQuery,
    PathStep, RelatedEntity, Relationship, RelationshipFilter, RelationshipType, Result,
    TraversalStats,
};
use girder_storage::StorageBackend;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Read-only traversal operations
#[derive(Clone)]
pub struct GraphTraversal {
    storage: Arc<dyn StorageBackend>,
    config: Arc<EngineConfig>,
}

impl GraphTraversal {
    pub fn new(storage: Arc<dyn StorageBackend>, config: Arc<EngineConfig>) -> Self {
        Self { storage, config }
    }

    pub(crate) async fn require(&self, id: &EntityId) -> Result<Entity> {
        self.storage
            .get_entity(id)
            .await?
            .ok_or_else(|| Error::EntityNotFound(id.to_string()))
    }

    /// Edges incident to `id` in `direction`, each paired with the far endpoint
    async fn edges(
        &self,
        id: &EntityId,
        direction: Direction,
        relationship_type: Option<&RelationshipType>,
    ) -> Result<Vec<(Relationship, EntityId)>> {
        let mut filter = RelationshipFilter::for_entity(*id, direction);
        filter.relationship_type = relationship_type.cloned();

        let relationships = self.storage.scan_relationships(&filter).await?;
        Ok(relationships
            .into_iter()
            .filter_map(|rel| {
                let next = match direction {
                    Direction::Outgoing => Some(rel.target_id),
                    Direction::Incoming => Some(rel.source_id),
                    Direction::Both => rel.other_end(id),
                }?;
                Some((rel, next))
            })
            .collect())
    }

    /// Breadth-first walk along one relationship type
    async fn walk(
        &self,
        start: &EntityId,
        direction: Direction,
        relationship_type: RelationshipType,
        max_depth: u32,
    ) -> Result<Vec<EntityWithDepth>> {
        self.require(start).await?;
        let max_depth = self.config.depth(Some(max_depth));

        let mut results = Vec::new();
        let mut visited: HashSet<EntityId> = HashSet::new();
        let mut queue: VecDeque<(EntityId, u32)> = VecDeque::new();
        let mut stats = TraversalStats::default();

        visited.insert(*start);
        queue.push_back((*start, 0));

        while let Some((current, depth)) = queue.pop_front() {
            stats.nodes_visited += 1;
            stats.max_depth_reached = stats.max_depth_reached.max(depth);

            if depth >= max_depth {
                continue;
            }

            for (_, next) in self
                .edges(&current, direction, Some(&relationship_type))
                .await?
            {
                stats.edges_traversed += 1;
                if !visited.insert(next) {
                    continue;
                }

                match self.storage.get_entity(&next).await? {
                    Some(entity) => {
                        results.push(EntityWithDepth {
                            entity,
                            depth: depth + 1,
                        });
                        queue.push_back((next, depth + 1));
                    }
                    None => {
                        stats.skipped_missing += 1;
                        tracing::warn!(id = %next, "Skipping entity deleted during traversal");
                    }
                }
            }
        }

        tracing::debug!(
            "Walk from {} along {} ({:?}) visited {} nodes, traversed {} edges, depth {}",
            start,
            relationship_type,
            direction,
            stats.nodes_visited,
            stats.edges_traversed,
            stats.max_depth_reached
        );

        Ok(results)
    }

    /// Earliest-created CONTAINS parent whose source still exists
    pub(crate) async fn parent_of(&self, id: &EntityId) -> Result<Option<Entity>> {
        for (_, parent) in self
            .edges(id, Direction::Incoming, Some(&RelationshipType::Contains))
            .await?
        {
            if let Some(entity) = self.storage.get_entity(&parent).await? {
                return Ok(Some(entity));
            }
        }
        Ok(None)
    }

    /// Direct CONTAINS children, without requiring `id` to exist
    pub(crate) async fn children_of(&self, id: &EntityId) -> Result<Vec<Entity>> {
        let mut seen = HashSet::new();
        let mut children = Vec::new();
        for (_, child) in self
            .edges(id, Direction::Outgoing, Some(&RelationshipType::Contains))
            .await?
        {
            if !seen.insert(child) {
                continue;
            }
            if let Some(entity) = self.storage.get_entity(&child).await? {
                children.push(entity);
            }
        }
        Ok(children)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Containment
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn get_children(&self, id: &EntityId) -> Result<Vec<Entity>> {
        self.require(id).await?;
        self.children_of(id).await
    }

    /// The container of `id`; the earliest-created CONTAINS edge wins
    pub async fn get_parent(&self, id: &EntityId) -> Result<Option<Entity>> {
        self.require(id).await?;
        self.parent_of(id).await
    }

    pub async fn get_descendants(&self, id: &EntityId, max_depth: u32) -> Result<Vec<EntityWithDepth>> {
        self.walk(id, Direction::Outgoing, RelationshipType::Contains, max_depth)
            .await
    }

    pub async fn get_ancestors(&self, id: &EntityId, max_depth: u32) -> Result<Vec<EntityWithDepth>> {
        self.walk(id, Direction::Incoming, RelationshipType::Contains, max_depth)
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Dependencies
    // ─────────────────────────────────────────────────────────────────────────

    /// Entities that depend on `id`, directly or transitively
    pub async fn get_dependents(&self, id: &EntityId, max_depth: u32) -> Result<Vec<EntityWithDepth>> {
        self.walk(id, Direction::Incoming, RelationshipType::DependsOn, max_depth)
            .await
    }

    /// Entities `id` depends on, directly or transitively
    pub async fn get_dependencies(
        &self,
        id: &EntityId,
        max_depth: u32,
    ) -> Result<Vec<EntityWithDepth>> {
        self.walk(id, Direction::Outgoing, RelationshipType::DependsOn, max_depth)
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Neighbourhood, hierarchy and paths
    // ─────────────────────────────────────────────────────────────────────────

    /// One-hop neighbours with the connecting edge, first edge per entity
    pub async fn get_related_entities(
        &self,
        id: &EntityId,
        relationship_type: Option<&RelationshipType>,
        direction: Direction,
    ) -> Result<Vec<RelatedEntity>> {
        self.require(id).await?;

        let mut seen = HashSet::new();
        let mut related = Vec::new();
        for (relationship, next) in self.edges(id, direction, relationship_type).await? {
            if !seen.insert(next) {
                continue;
            }
            if let Some(entity) = self.storage.get_entity(&next).await? {
                related.push(RelatedEntity {
                    entity,
                    relationship,
                });
            }
        }
        Ok(related)
    }

    /// Materialize the CONTAINS hierarchy below `id`
    ///
    /// Returns `None` when the root does not exist. An entity with several
    /// parents is placed under the one that reaches it first.
    pub async fn build_hierarchy_tree(
        &self,
        id: &EntityId,
        max_depth: u32,
    ) -> Result<Option<HierarchyNode>> {
        let Some(root) = self.storage.get_entity(id).await? else {
            return Ok(None);
        };
        let max_depth = self.config.depth(Some(max_depth));

        let mut order = vec![root.id];
        let mut entities: HashMap<EntityId, Entity> = HashMap::new();
        let mut children: HashMap<EntityId, Vec<EntityId>> = HashMap::new();
        let mut visited: HashSet<EntityId> = HashSet::new();
        let mut queue: VecDeque<(EntityId, u32)> = VecDeque::new();

        visited.insert(root.id);
        queue.push_back((root.id, 0));
        entities.insert(root.id, root);

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for (_, next) in self
                .edges(&current, Direction::Outgoing, Some(&RelationshipType::Contains))
                .await?
            {
                if !visited.insert(next) {
                    continue;
                }
                if let Some(entity) = self.storage.get_entity(&next).await? {
                    entities.insert(next, entity);
                    children.entry(current).or_default().push(next);
                    order.push(next);
                    queue.push_back((next, depth + 1));
                }
            }
        }

        // Children always come after their parent in BFS order, so building
        // nodes back to front finds every child subtree already assembled.
        let mut nodes: HashMap<EntityId, HierarchyNode> = HashMap::new();
        for node_id in order.iter().rev() {
            let Some(entity) = entities.remove(node_id) else {
                continue;
            };
            let mut node = HierarchyNode::leaf(entity);
            for child_id in children.remove(node_id).unwrap_or_default() {
                if let Some(child) = nodes.remove(&child_id) {
                    node.children.push(child);
                }
            }
            nodes.insert(*node_id, node);
        }

        Ok(nodes.remove(id))
    }

    /// Shortest path by hop count
    ///
    /// Returns `None` when no path exists within the depth limit.
    pub async fn find_path(&self, query: &PathQuery) -> Result<Option<GraphPath>> {
        let from = self.require(&query.from).await?;
        let to = self.require(&query.to).await?;

        if from.id == to.id {
            return Ok(Some(GraphPath::single(from)));
        }
        let max_depth = self.config.depth(Some(query.max_depth));

        let mut entities: HashMap<EntityId, Entity> = HashMap::new();
        let mut parent: HashMap<EntityId, (EntityId, Relationship)> = HashMap::new();
        let mut visited: HashSet<EntityId> = HashSet::new();
        let mut queue: VecDeque<(EntityId, u32)> = VecDeque::new();
        let mut stats = TraversalStats::default();
        let mut found = false;

        visited.insert(from.id);
        queue.push_back((from.id, 0));
        entities.insert(from.id, from.clone());

        'search: while let Some((current, depth)) = queue.pop_front() {
            stats.nodes_visited += 1;
            if depth >= max_depth {
                continue;
            }

            for (relationship, next) in self.edges(&current, query.direction, None).await? {
                stats.edges_traversed += 1;
                if !query.follows(&relationship) || !visited.insert(next) {
                    continue;
                }
                let Some(entity) = self.storage.get_entity(&next).await? else {
                    stats.skipped_missing += 1;
                    continue;
                };

                entities.insert(next, entity);
                parent.insert(next, (current, relationship));
                if next == to.id {
                    found = true;
                    break 'search;
                }
                queue.push_back((next, depth + 1));
            }
        }

        tracing::debug!(
            "Path search {} -> {} visited {} nodes, traversed {} edges, found: {}",
            from.id,
            to.id,
            stats.nodes_visited,
            stats.edges_traversed,
            found
        );

        if !found {
            return Ok(None);
        }

        // Reconstruct path
        let mut steps = Vec::new();
        let mut current = to.id;
        while let Some((prev, relationship)) = parent.remove(&current) {
            if let Some(entity) = entities.remove(&current) {
                steps.push(PathStep {
                    entity,
                    via: Some(relationship),
                });
            }
            current = prev;
        }
        steps.push(PathStep {
            entity: from,
            via: None,
        });
        steps.reverse();

        Ok(Some(GraphPath { steps }))
    }
}
