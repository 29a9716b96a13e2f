//! Relationship store: validated edge creation, lookup and listing

use girder_core::limits;
use girder_core::{
    Error, NewRelationship, Relationship, RelationshipFilter, RelationshipId, RelationshipType,
    Result,
};
use girder_storage::StorageBackend;
use std::sync::Arc;

/// Entry point for relationship reads and writes
#[derive(Clone)]
pub struct RelationshipStore {
    storage: Arc<dyn StorageBackend>,
}

impl RelationshipStore {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    fn validate(relationship: &Relationship) -> Result<()> {
        limits::validate_relationship_type(relationship.relationship_type.as_str())?;
        limits::validate_metadata(&relationship.metadata)?;
        Ok(())
    }

    /// Create a relationship
    ///
    /// Fails with `Conflict` when the (source, target, type) triple exists and
    /// with `EntityNotFound` when an endpoint is missing.
    pub async fn create_relationship(&self, new: NewRelationship) -> Result<Relationship> {
        limits::validate_relationship_type(&new.relationship_type)?;

        let mut relationship = Relationship::new(
            new.source_id,
            new.target_id,
            RelationshipType::from(new.relationship_type.trim()),
        );
        relationship.metadata = new.metadata;
        Self::validate(&relationship)?;

        self.storage.insert_relationship(&relationship).await?;
        tracing::info!(
            id = %relationship.id,
            "Created relationship {} -[{}]-> {}",
            relationship.source_id,
            relationship.relationship_type,
            relationship.target_id
        );
        Ok(relationship)
    }

    /// Insert a relationship as-is, keeping its id and timestamp
    pub async fn restore_relationship(&self, relationship: &Relationship) -> Result<()> {
        Self::validate(relationship)?;
        self.storage.insert_relationship(relationship).await?;
        Ok(())
    }

    pub async fn get_relationship(&self, id: &RelationshipId) -> Result<Option<Relationship>> {
        Ok(self.storage.get_relationship(id).await?)
    }

    pub async fn require_relationship(&self, id: &RelationshipId) -> Result<Relationship> {
        self.get_relationship(id)
            .await?
            .ok_or_else(|| Error::RelationshipNotFound(id.to_string()))
    }

    pub async fn delete_relationship(&self, id: &RelationshipId) -> Result<bool> {
        let deleted = self.storage.delete_relationship(id).await?;
        if deleted {
            tracing::info!(id = %id, "Deleted relationship");
        }
        Ok(deleted)
    }

    /// Relationships matching the filter, oldest first
    pub async fn list_relationships(&self, filter: &RelationshipFilter) -> Result<Vec<Relationship>> {
        let relationships = self.storage.scan_relationships(filter).await?;
        tracing::debug!("Listed {} relationships", relationships.len());
        Ok(relationships)
    }
}
