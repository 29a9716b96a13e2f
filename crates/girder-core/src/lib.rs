//! Girder Core - Data model for the entity-relationship graph engine
//!
//! This crate provides the entity, relationship and property types, the
//! filters used to scan them, traversal result types and the error type
//! shared by every Girder crate.

pub mod entity;
pub mod error;
pub mod graph;
pub mod limits;
pub mod property;
pub mod query;
pub mod relation;
pub mod traversal;
pub mod value;

pub use entity::{Entity, EntityId, EntityType, EntityUpdate, NewEntity};
pub use error::{Error, ErrorKind, Result};
pub use graph::{GraphStatistics, Topology};
pub use property::Property;
pub use query::{EntityFilter, RelationshipFilter, SearchMode, SearchQuery};
pub use relation::{Direction, NewRelationship, Relationship, RelationshipId, RelationshipType};
pub use traversal::{
    EntityWithDepth, GraphPath, HierarchyNode, PathQuery, PathStep, RelatedEntity, TraversalStats,
};
pub use value::{Metadata, Value};
