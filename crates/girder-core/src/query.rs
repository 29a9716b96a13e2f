//! Filter and query types for listing and searching the graph

use crate::entity::{Entity, EntityId, EntityType};
use crate::limits::MAX_PAGE_SIZE;
use crate::relation::{Direction, Relationship, RelationshipType};
use crate::value::{is_superset, Metadata, Value};
use serde::{Deserialize, Serialize};

fn default_list_limit() -> Option<usize> {
    Some(100)
}

/// Entity listing filter
///
/// All set criteria must match. Results are ordered newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityFilter {
    /// Exact entity type (case-insensitive)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<EntityType>,

    /// Case-insensitive substring of the name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Exact device back-reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_uuid: Option<String>,

    /// Entity metadata must be a superset of these pairs
    #[serde(default)]
    pub metadata: Metadata,

    /// Page size; `None` returns every match
    #[serde(default = "default_list_limit")]
    pub limit: Option<usize>,

    /// Number of matches to skip
    #[serde(default)]
    pub offset: usize,
}

impl Default for EntityFilter {
    fn default() -> Self {
        Self {
            entity_type: None,
            name: None,
            device_uuid: None,
            metadata: Metadata::new(),
            limit: default_list_limit(),
            offset: 0,
        }
    }
}

impl EntityFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter without a page limit, for internal full scans
    pub fn all() -> Self {
        Self {
            limit: None,
            ..Default::default()
        }
    }

    pub fn with_type(mut self, entity_type: impl Into<EntityType>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_device_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.device_uuid = Some(uuid.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit.min(MAX_PAGE_SIZE));
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        if let Some(entity_type) = &self.entity_type {
            if !entity.entity_type.is(entity_type.as_str()) {
                return false;
            }
        }
        if let Some(name) = &self.name {
            if !entity.name.to_lowercase().contains(&name.to_lowercase()) {
                return false;
            }
        }
        if let Some(uuid) = &self.device_uuid {
            if entity.device_uuid.as_deref() != Some(uuid.as_str()) {
                return false;
            }
        }
        is_superset(&entity.metadata, &self.metadata)
    }

    /// Filter, order (creation time descending) and paginate candidates
    ///
    /// Backends use this after any index-assisted pre-filtering so every
    /// backend returns identical pages.
    pub fn apply(&self, candidates: Vec<Entity>) -> Vec<Entity> {
        let mut matched: Vec<Entity> = candidates
            .into_iter()
            .filter(|e| self.matches(e))
            .collect();

        matched.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let page = matched.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => page.take(limit.min(MAX_PAGE_SIZE)).collect(),
            None => page.collect(),
        }
    }
}

/// Relationship listing filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationshipFilter {
    /// Anchor entity that `direction` is relative to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityId>,

    /// Edge direction relative to `entity`
    #[serde(default)]
    pub direction: Direction,

    /// Exact source entity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<EntityId>,

    /// Exact target entity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<EntityId>,

    /// Exact relationship type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship_type: Option<RelationshipType>,
}

impl RelationshipFilter {
    /// Every relationship
    pub fn all() -> Self {
        Self::default()
    }

    /// Relationships incident to `entity` in `direction`
    pub fn for_entity(entity: EntityId, direction: Direction) -> Self {
        Self {
            entity: Some(entity),
            direction,
            ..Default::default()
        }
    }

    pub fn outgoing(entity: EntityId) -> Self {
        Self::for_entity(entity, Direction::Outgoing)
    }

    pub fn incoming(entity: EntityId) -> Self {
        Self::for_entity(entity, Direction::Incoming)
    }

    pub fn from_source(mut self, source: EntityId) -> Self {
        self.source = Some(source);
        self
    }

    pub fn to_target(mut self, target: EntityId) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_type(mut self, relationship_type: impl Into<RelationshipType>) -> Self {
        self.relationship_type = Some(relationship_type.into());
        self
    }

    pub fn matches(&self, rel: &Relationship) -> bool {
        if let Some(entity) = &self.entity {
            let incident = match self.direction {
                Direction::Outgoing => rel.source_id == *entity,
                Direction::Incoming => rel.target_id == *entity,
                Direction::Both => rel.touches(entity),
            };
            if !incident {
                return false;
            }
        }
        if let Some(source) = &self.source {
            if rel.source_id != *source {
                return false;
            }
        }
        if let Some(target) = &self.target {
            if rel.target_id != *target {
                return false;
            }
        }
        if let Some(relationship_type) = &self.relationship_type {
            if rel.relationship_type != *relationship_type {
                return false;
            }
        }
        true
    }

    /// Filter candidates and order them by creation time ascending, then id
    pub fn apply(&self, candidates: Vec<Relationship>) -> Vec<Relationship> {
        let mut matched: Vec<Relationship> = candidates
            .into_iter()
            .filter(|r| self.matches(r))
            .collect();
        matched.sort_by_key(Relationship::order_key);
        matched
    }
}

/// Search mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Case-insensitive exact, prefix and substring matching
    Exact,
    /// Fuzzy subsequence matching
    Fuzzy,
    /// Exact matches first, then fuzzy matches
    #[default]
    Hybrid,
}

impl std::str::FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "fuzzy" => Ok(Self::Fuzzy),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!("unknown search mode: {}", other)),
        }
    }
}

fn default_search_limit() -> usize {
    20
}

/// Name search query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Text to search for
    pub text: String,

    /// Search mode
    #[serde(default)]
    pub mode: SearchMode,

    /// Filter by entity types (empty = all)
    #[serde(default)]
    pub entity_types: Vec<String>,

    /// Maximum number of hits
    #[serde(default = "default_search_limit")]
    pub limit: usize,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mode: SearchMode::default(),
            entity_types: Vec::new(),
            limit: default_search_limit(),
        }
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_types.push(entity_type.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn accepts_type(&self, entity: &Entity) -> bool {
        self.entity_types.is_empty() || self.entity_types.iter().any(|t| entity.is_type(t))
    }
}
