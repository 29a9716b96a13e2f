//! Relationship (edge) types and operations

use crate::entity::EntityId;
use crate::value::{Metadata, Value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique identifier for a relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationshipId(pub Ulid);

impl RelationshipId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    pub fn from_string(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for RelationshipId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RelationshipId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

/// Direction for graph traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outgoing,
    Incoming,
    #[default]
    Both,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Self::Outgoing => Self::Incoming,
            Self::Incoming => Self::Outgoing,
            Self::Both => Self::Both,
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "outgoing" | "out" => Ok(Self::Outgoing),
            "incoming" | "in" => Ok(Self::Incoming),
            "both" => Ok(Self::Both),
            other => Err(format!("unknown direction: {}", other)),
        }
    }
}

/// Type of a relationship
///
/// The three well-known types parse case-insensitively; anything else is kept
/// verbatim as [`RelationshipType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RelationshipType {
    Contains,
    DependsOn,
    RelatedTo,
    Other(String),
}

impl RelationshipType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Contains => "CONTAINS",
            Self::DependsOn => "DEPENDS_ON",
            Self::RelatedTo => "RELATED_TO",
            Self::Other(name) => name,
        }
    }
}

impl std::fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for RelationshipType {
    fn from(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "CONTAINS" => Self::Contains,
            "DEPENDS_ON" => Self::DependsOn,
            "RELATED_TO" => Self::RelatedTo,
            _ => Self::Other(s.to_string()),
        }
    }
}

impl From<String> for RelationshipType {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<RelationshipType> for String {
    fn from(t: RelationshipType) -> Self {
        t.as_str().to_string()
    }
}

/// A directed, typed relationship (edge) between two entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Unique identifier
    pub id: RelationshipId,

    /// Source entity ID
    pub source_id: EntityId,

    /// Target entity ID
    pub target_id: EntityId,

    /// Type of relationship
    pub relationship_type: RelationshipType,

    /// Arbitrary metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Relationship {
    /// Create a new relationship
    pub fn new(
        source_id: EntityId,
        target_id: EntityId,
        relationship_type: impl Into<RelationshipType>,
    ) -> Self {
        Self {
            id: RelationshipId::new(),
            source_id,
            target_id,
            relationship_type: relationship_type.into(),
            metadata: Metadata::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// True when this relationship has the same (source, target, type) triple
    pub fn same_triple(&self, other: &Relationship) -> bool {
        self.source_id == other.source_id
            && self.target_id == other.target_id
            && self.relationship_type == other.relationship_type
    }

    /// The endpoint opposite to `entity`, if `entity` is an endpoint
    pub fn other_end(&self, entity: &EntityId) -> Option<EntityId> {
        if self.source_id == *entity {
            Some(self.target_id)
        } else if self.target_id == *entity {
            Some(self.source_id)
        } else {
            None
        }
    }

    pub fn touches(&self, entity: &EntityId) -> bool {
        self.source_id == *entity || self.target_id == *entity
    }

    /// Deterministic ordering key: creation time, then id
    pub fn order_key(&self) -> (DateTime<Utc>, RelationshipId) {
        (self.created_at, self.id)
    }
}

/// Data for creating a new relationship
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRelationship {
    pub source_id: EntityId,
    pub target_id: EntityId,
    pub relationship_type: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl NewRelationship {
    pub fn new(
        source_id: EntityId,
        target_id: EntityId,
        relationship_type: impl Into<String>,
    ) -> Self {
        Self {
            source_id,
            target_id,
            relationship_type: relationship_type.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn contains(source_id: EntityId, target_id: EntityId) -> Self {
        Self::new(source_id, target_id, RelationshipType::Contains.as_str())
    }

    pub fn depends_on(source_id: EntityId, target_id: EntityId) -> Self {
        Self::new(source_id, target_id, RelationshipType::DependsOn.as_str())
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relationship_creation() {
        let building = EntityId::new();
        let floor = EntityId::new();

        let rel = Relationship::new(building, floor, "contains").with_metadata("order", 1i64);

        assert_eq!(rel.relationship_type, RelationshipType::Contains);
        assert_eq!(rel.other_end(&building), Some(floor));
        assert_eq!(rel.other_end(&floor), Some(building));
        assert_eq!(rel.other_end(&EntityId::new()), None);
        assert_eq!(rel.metadata["order"], Value::Number(1.0));
    }

    #[test]
    fn test_relationship_type_parsing() {
        assert_eq!(RelationshipType::from("DEPENDS_ON"), RelationshipType::DependsOn);
        assert_eq!(RelationshipType::from("related_to"), RelationshipType::RelatedTo);
        assert_eq!(
            RelationshipType::from("FEEDS"),
            RelationshipType::Other("FEEDS".to_string())
        );
        assert_eq!(RelationshipType::DependsOn.to_string(), "DEPENDS_ON");
    }

    #[test]
    fn test_relationship_type_serde() {
        let json = serde_json::to_string(&RelationshipType::Contains).unwrap();
        assert_eq!(json, "\"CONTAINS\"");
        let parsed: RelationshipType = serde_json::from_str("\"powers\"").unwrap();
        assert_eq!(parsed, RelationshipType::Other("powers".to_string()));
    }

    #[test]
    fn test_same_triple() {
        let a = EntityId::new();
        let b = EntityId::new();
        let first = Relationship::new(a, b, RelationshipType::Contains);
        let second = Relationship::new(a, b, "CONTAINS");
        let third = Relationship::new(a, b, RelationshipType::DependsOn);

        assert_ne!(first.id, second.id);
        assert!(first.same_triple(&second));
        assert!(!first.same_triple(&third));
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!("in".parse::<Direction>().unwrap(), Direction::Incoming);
        assert_eq!("Outgoing".parse::<Direction>().unwrap(), Direction::Outgoing);
        assert!("sideways".parse::<Direction>().is_err());
        assert_eq!(Direction::Outgoing.reverse(), Direction::Incoming);
    }
}
