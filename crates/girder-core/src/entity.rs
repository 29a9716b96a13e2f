//! Entity (node) types and operations

use crate::value::{Metadata, Value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique identifier for an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Ulid);

impl EntityId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    pub fn from_string(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for EntityId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

/// Entity type classification
///
/// Open set of names; the well-known facility types have constructors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(pub String);

impl EntityType {
    pub const DEVICE: &'static str = "device";
    pub const BUILDING: &'static str = "building";
    pub const FLOOR: &'static str = "floor";
    pub const ROOM: &'static str = "room";
    pub const ZONE: &'static str = "zone";

    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn device() -> Self {
        Self::new(Self::DEVICE)
    }

    pub fn building() -> Self {
        Self::new(Self::BUILDING)
    }

    pub fn floor() -> Self {
        Self::new(Self::FLOOR)
    }

    pub fn room() -> Self {
        Self::new(Self::ROOM)
    }

    pub fn zone() -> Self {
        Self::new(Self::ZONE)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is(&self, name: &str) -> bool {
        self.0.eq_ignore_ascii_case(name)
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityType {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&String> for EntityType {
    fn from(s: &String) -> Self {
        Self(s.clone())
    }
}

/// An entity in the graph (a node)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier
    pub id: EntityId,

    /// Entity type/category
    pub entity_type: EntityType,

    /// Display name
    pub name: String,

    /// Arbitrary metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// Back-reference to an externally owned device record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_uuid: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub modified_at: DateTime<Utc>,
}

impl Entity {
    /// Create a new entity
    pub fn new(entity_type: impl Into<EntityType>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(),
            entity_type: entity_type.into(),
            name: name.into(),
            metadata: Metadata::new(),
            device_uuid: None,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_device_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.device_uuid = Some(uuid.into());
        self
    }

    pub fn is_type(&self, name: &str) -> bool {
        self.entity_type.is(name)
    }

    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
    }
}

/// Data for creating a new entity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewEntity {
    pub entity_type: String,
    pub name: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_uuid: Option<String>,
}

impl NewEntity {
    pub fn new(entity_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            name: name.into(),
            metadata: Metadata::new(),
            device_uuid: None,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_device_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.device_uuid = Some(uuid.into());
        self
    }
}

/// Partial update of an entity; `None` fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Replaces the whole metadata map when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    /// `Some(None)` clears the device back-reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_uuid: Option<Option<String>>,
}

impl EntityUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn device_uuid(mut self, uuid: Option<String>) -> Self {
        self.device_uuid = Some(uuid);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entity_type.is_none()
            && self.name.is_none()
            && self.metadata.is_none()
            && self.device_uuid.is_none()
    }

    /// Apply the provided fields to `entity`
    pub fn apply_to(self, entity: &mut Entity) {
        if let Some(entity_type) = self.entity_type {
            entity.entity_type = EntityType::new(entity_type);
        }
        if let Some(name) = self.name {
            entity.name = name;
        }
        if let Some(metadata) = self.metadata {
            entity.metadata = metadata;
        }
        if let Some(device_uuid) = self.device_uuid {
            entity.device_uuid = device_uuid;
        }
        entity.touch();
    }
}
