//! Input validation limits for the write boundary and traversal cost bounds

use crate::value::{Metadata, Value};

/// Maximum length for entity names (256 chars)
pub const MAX_ENTITY_NAME_LEN: usize = 256;

/// Maximum length for entity and relationship type names (64 chars)
pub const MAX_TYPE_NAME_LEN: usize = 64;

/// Maximum length for metadata and property keys (128 chars)
pub const MAX_KEY_LEN: usize = 128;

/// Maximum nesting depth of a metadata value (16)
pub const MAX_VALUE_DEPTH: usize = 16;

/// Hard ceiling for every traversal depth (50)
pub const MAX_TRAVERSAL_DEPTH: u32 = 50;

/// Maximum page size for entity listing (1000)
pub const MAX_PAGE_SIZE: usize = 1000;

/// Validation error type
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyEntityName,
    EntityNameTooLong { len: usize, max: usize },
    EmptyEntityType,
    EmptyRelationshipType,
    TypeNameTooLong { len: usize, max: usize },
    EmptyKey,
    KeyTooLong { len: usize, max: usize },
    ValueTooDeep { key: String, depth: usize, max: usize },
    NonFiniteNumber { key: String },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyEntityName => write!(f, "Entity name cannot be empty"),
            Self::EntityNameTooLong { len, max } => {
                write!(f, "Entity name too long: {} chars (max {})", len, max)
            }
            Self::EmptyEntityType => write!(f, "Entity type cannot be empty"),
            Self::EmptyRelationshipType => write!(f, "Relationship type cannot be empty"),
            Self::TypeNameTooLong { len, max } => {
                write!(f, "Type name too long: {} chars (max {})", len, max)
            }
            Self::EmptyKey => write!(f, "Key cannot be empty"),
            Self::KeyTooLong { len, max } => {
                write!(f, "Key too long: {} chars (max {})", len, max)
            }
            Self::ValueTooDeep { key, depth, max } => {
                write!(f, "Value for '{}' nested too deep: {} (max {})", key, depth, max)
            }
            Self::NonFiniteNumber { key } => {
                write!(f, "Value for '{}' is not a finite number", key)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate entity name
pub fn validate_entity_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyEntityName);
    }
    if name.len() > MAX_ENTITY_NAME_LEN {
        return Err(ValidationError::EntityNameTooLong {
            len: name.len(),
            max: MAX_ENTITY_NAME_LEN,
        });
    }
    Ok(())
}

/// Validate entity type
pub fn validate_entity_type(entity_type: &str) -> Result<(), ValidationError> {
    if entity_type.trim().is_empty() {
        return Err(ValidationError::EmptyEntityType);
    }
    validate_type_len(entity_type)
}

/// Validate relationship type
pub fn validate_relationship_type(relationship_type: &str) -> Result<(), ValidationError> {
    if relationship_type.trim().is_empty() {
        return Err(ValidationError::EmptyRelationshipType);
    }
    validate_type_len(relationship_type)
}

fn validate_type_len(name: &str) -> Result<(), ValidationError> {
    if name.len() > MAX_TYPE_NAME_LEN {
        return Err(ValidationError::TypeNameTooLong {
            len: name.len(),
            max: MAX_TYPE_NAME_LEN,
        });
    }
    Ok(())
}

/// Validate a metadata or property key
pub fn validate_key(key: &str) -> Result<(), ValidationError> {
    if key.is_empty() {
        return Err(ValidationError::EmptyKey);
    }
    if key.len() > MAX_KEY_LEN {
        return Err(ValidationError::KeyTooLong {
            len: key.len(),
            max: MAX_KEY_LEN,
        });
    }
    Ok(())
}

/// Validate a single value stored under `key`
pub fn validate_value(key: &str, value: &Value) -> Result<(), ValidationError> {
    let depth = value.depth();
    if depth > MAX_VALUE_DEPTH {
        return Err(ValidationError::ValueTooDeep {
            key: key.to_string(),
            depth,
            max: MAX_VALUE_DEPTH,
        });
    }
    if !all_numbers_finite(value) {
        return Err(ValidationError::NonFiniteNumber {
            key: key.to_string(),
        });
    }
    Ok(())
}

/// Validate a whole metadata map
pub fn validate_metadata(metadata: &Metadata) -> Result<(), ValidationError> {
    for (key, value) in metadata {
        validate_key(key)?;
        validate_value(key, value)?;
    }
    Ok(())
}

fn all_numbers_finite(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_finite(),
        Value::Array(items) => items.iter().all(all_numbers_finite),
        Value::Object(map) => map.values().all(all_numbers_finite),
        _ => true,
    }
}

/// Clamp a caller supplied depth to `ceiling`, itself capped at [`MAX_TRAVERSAL_DEPTH`]
pub fn clamp_depth(depth: u32, ceiling: u32) -> u32 {
    depth.min(ceiling.min(MAX_TRAVERSAL_DEPTH))
}
