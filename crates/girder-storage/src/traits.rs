//! Storage backend trait definitions

use crate::error::StorageResult;
use async_trait::async_trait;
use girder_core::{
    Entity, EntityFilter, EntityId, Property, Relationship, RelationshipFilter, RelationshipId,
};

/// Trait for storage backend implementations
///
/// Every mutation that must be atomic (unique triple insert, cascading
/// entity delete, update of an existing entity) is a single trait method so the backend can run it inside
/// one transaction. Engine components never lock anything themselves.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Initialize the storage (create tables, etc.)
    async fn initialize(&self) -> StorageResult<()>;

    /// Close the storage connection
    async fn close(&self) -> StorageResult<()>;

    /// Health check
    async fn health_check(&self) -> StorageResult<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Entity Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert or replace an entity
    async fn put_entity(&self, entity: &Entity) -> StorageResult<()>;

    /// Replace an existing entity
    ///
    /// Fails with `EntityNotFound` if the entity is gone, so a concurrent
    /// delete is never undone by a late update.
    async fn update_entity(&self, entity: &Entity) -> StorageResult<()>;

    /// Get an entity by id
    async fn get_entity(&self, id: &EntityId) -> StorageResult<Option<Entity>>;

    /// Scan entities matching a filter, ordered and paginated per the filter
    async fn scan_entities(&self, filter: &EntityFilter) -> StorageResult<Vec<Entity>>;

    /// Delete an entity together with its relationships and properties
    ///
    /// Returns `false` when the entity did not exist.
    async fn delete_entity(&self, id: &EntityId) -> StorageResult<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Relationship Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a relationship
    ///
    /// Fails with `EntityNotFound` if an endpoint is missing and with
    /// `DuplicateRelationship` if the (source, target, type) triple exists.
    async fn insert_relationship(&self, relationship: &Relationship) -> StorageResult<()>;

    /// Get a relationship by id
    async fn get_relationship(&self, id: &RelationshipId) -> StorageResult<Option<Relationship>>;

    /// Scan relationships matching a filter, oldest first
    async fn scan_relationships(
        &self,
        filter: &RelationshipFilter,
    ) -> StorageResult<Vec<Relationship>>;

    /// Delete a relationship, returning `false` if it did not exist
    async fn delete_relationship(&self, id: &RelationshipId) -> StorageResult<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Property Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// All properties of an entity, ordered by key
    async fn get_properties(&self, entity_id: &EntityId) -> StorageResult<Vec<Property>>;

    /// Get a single property
    async fn get_property(&self, entity_id: &EntityId, key: &str)
        -> StorageResult<Option<Property>>;

    /// Insert or replace a property; fails with `EntityNotFound` if the owner is missing
    async fn upsert_property(&self, property: &Property) -> StorageResult<()>;

    /// Delete a property, returning `false` if it did not exist
    async fn delete_property(&self, entity_id: &EntityId, key: &str) -> StorageResult<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Bulk Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Count entities and relationships
    async fn counts(&self) -> StorageResult<(usize, usize)> {
        let entities = self.scan_entities(&EntityFilter::all()).await?.len();
        let relationships = self
            .scan_relationships(&RelationshipFilter::all())
            .await?
            .len();
        Ok((entities, relationships))
    }
}
