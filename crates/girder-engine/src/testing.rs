//! Storage wrapper that deletes an entity at an awkward moment, standing in
//! for another writer racing the operation under test

use async_trait::async_trait;
use girder_core::{
    Entity, EntityFilter, EntityId, Property, Relationship, RelationshipFilter, RelationshipId,
};
use girder_storage::{MemoryStorage, StorageBackend, StorageResult};
use std::sync::{Arc, Mutex};

pub struct RacingStorage {
    inner: Arc<MemoryStorage>,
    after_get: Mutex<Option<EntityId>>,
    after_scan: Mutex<Option<EntityId>>,
}

impl RacingStorage {
    pub fn new(inner: Arc<MemoryStorage>) -> Self {
        Self {
            inner,
            after_get: Mutex::new(None),
            after_scan: Mutex::new(None),
        }
    }

    /// Delete `id` right after the first read of it
    pub fn delete_after_get(self, id: EntityId) -> Self {
        *self.after_get.lock().unwrap() = Some(id);
        self
    }

    /// Delete `id` right after the first relationship scan that reaches it
    pub fn delete_after_scan(self, id: EntityId) -> Self {
        *self.after_scan.lock().unwrap() = Some(id);
        self
    }
}

#[async_trait]
impl StorageBackend for RacingStorage {
    async fn initialize(&self) -> StorageResult<()> {
        self.inner.initialize().await
    }

    async fn close(&self) -> StorageResult<()> {
        self.inner.close().await
    }

    async fn health_check(&self) -> StorageResult<bool> {
        self.inner.health_check().await
    }

    async fn put_entity(&self, entity: &Entity) -> StorageResult<()> {
        self.inner.put_entity(entity).await
    }

    async fn update_entity(&self, entity: &Entity) -> StorageResult<()> {
        self.inner.update_entity(entity).await
    }

    async fn get_entity(&self, id: &EntityId) -> StorageResult<Option<Entity>> {
        let found = self.inner.get_entity(id).await?;
        let victim = {
            let mut slot = self.after_get.lock().unwrap();
            if slot.as_ref() == Some(id) {
                slot.take()
            } else {
                None
            }
        };
        if let Some(victim) = victim {
            self.inner.delete_entity(&victim).await?;
        }
        Ok(found)
    }

    async fn scan_entities(&self, filter: &EntityFilter) -> StorageResult<Vec<Entity>> {
        self.inner.scan_entities(filter).await
    }

    async fn delete_entity(&self, id: &EntityId) -> StorageResult<bool> {
        self.inner.delete_entity(id).await
    }

    async fn insert_relationship(&self, relationship: &Relationship) -> StorageResult<()> {
        self.inner.insert_relationship(relationship).await
    }

    async fn get_relationship(&self, id: &RelationshipId) -> StorageResult<Option<Relationship>> {
        self.inner.get_relationship(id).await
    }

    async fn scan_relationships(
        &self,
        filter: &RelationshipFilter,
    ) -> StorageResult<Vec<Relationship>> {
        let found = self.inner.scan_relationships(filter).await?;
        let victim = {
            let mut slot = self.after_scan.lock().unwrap();
            let reached = slot
                .as_ref()
                .is_some_and(|id| found.iter().any(|r| r.touches(id)));
            if reached {
                slot.take()
            } else {
                None
            }
        };
        if let Some(victim) = victim {
            self.inner.delete_entity(&victim).await?;
        }
        Ok(found)
    }

    async fn delete_relationship(&self, id: &RelationshipId) -> StorageResult<bool> {
        self.inner.delete_relationship(id).await
    }

    async fn get_properties(&self, entity_id: &EntityId) -> StorageResult<Vec<Property>> {
        self.inner.get_properties(entity_id).await
    }

    async fn get_property(
        &self,
        entity_id: &EntityId,
        key: &str,
    ) -> StorageResult<Option<Property>> {
        self.inner.get_property(entity_id, key).await
    }

    async fn upsert_property(&self, property: &Property) -> StorageResult<()> {
        self.inner.upsert_property(property).await
    }

    async fn delete_property(&self, entity_id: &EntityId, key: &str) -> StorageResult<bool> {
        self.inner.delete_property(entity_id, key).await
    }
}
