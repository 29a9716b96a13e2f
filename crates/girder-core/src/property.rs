//! Property records - keyed values stored alongside an entity

use crate::entity::EntityId;
use crate::value::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A key/value property owned by an entity
///
/// Unique per `(entity_id, key)`; setting an existing key replaces the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Owning entity
    pub entity_id: EntityId,

    /// Property key
    pub key: String,

    /// Property value
    pub value: Value,

    /// When this value was last written
    pub updated_at: DateTime<Utc>,
}

impl Property {
    pub fn new(entity_id: EntityId, key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            entity_id,
            key: key.into(),
            value: value.into(),
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_creation() {
        let entity_id = EntityId::new();
        let prop = Property::new(entity_id, "firmware", "1.4.2");

        assert_eq!(prop.entity_id, entity_id);
        assert_eq!(prop.key, "firmware");
        assert_eq!(prop.value.as_str(), Some("1.4.2"));
    }
}
