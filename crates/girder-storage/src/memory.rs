//! In-memory storage backend for testing

use crate::error::{StorageError, StorageResult};
use crate::traits::StorageBackend;
use async_trait::async_trait;
use girder_core::{
    Entity, EntityFilter, EntityId, Property, Relationship, RelationshipFilter, RelationshipId,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct MemoryState {
    entities: HashMap<EntityId, Entity>,
    relationships: HashMap<RelationshipId, Relationship>,
    properties: BTreeMap<(EntityId, String), Property>,
}

/// In-memory storage backend
///
/// All tables live behind one lock, so the check-then-insert of a
/// relationship triple and the cascading delete of an entity are atomic.
pub struct MemoryStorage {
    state: RwLock<MemoryState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
        }
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, MemoryState>> {
        self.state.read().map_err(StorageError::lock)
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, MemoryState>> {
        self.state.write().map_err(StorageError::lock)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn initialize(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn health_check(&self) -> StorageResult<bool> {
        Ok(self.state.read().is_ok())
    }

    // Entity operations

    async fn put_entity(&self, entity: &Entity) -> StorageResult<()> {
        let mut state = self.write()?;
        state.entities.insert(entity.id, entity.clone());
        Ok(())
    }

    async fn update_entity(&self, entity: &Entity) -> StorageResult<()> {
        let mut state = self.write()?;
        match state.entities.get_mut(&entity.id) {
            Some(existing) => {
                *existing = entity.clone();
                Ok(())
            }
            None => Err(StorageError::EntityNotFound(entity.id.to_string())),
        }
    }

    async fn get_entity(&self, id: &EntityId) -> StorageResult<Option<Entity>> {
        let state = self.read()?;
        Ok(state.entities.get(id).cloned())
    }

    async fn scan_entities(&self, filter: &EntityFilter) -> StorageResult<Vec<Entity>> {
        let state = self.read()?;
        let candidates = state
            .entities
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        Ok(filter.apply(candidates))
    }

    async fn delete_entity(&self, id: &EntityId) -> StorageResult<bool> {
        let mut state = self.write()?;
        if state.entities.remove(id).is_none() {
            return Ok(false);
        }
        state.relationships.retain(|_, r| !r.touches(id));
        state.properties.retain(|(owner, _), _| owner != id);
        Ok(true)
    }

    // Relationship operations

    async fn insert_relationship(&self, relationship: &Relationship) -> StorageResult<()> {
        let mut state = self.write()?;

        for endpoint in [&relationship.source_id, &relationship.target_id] {
            if !state.entities.contains_key(endpoint) {
                return Err(StorageError::EntityNotFound(endpoint.to_string()));
            }
        }

        if state
            .relationships
            .values()
            .any(|r| r.same_triple(relationship))
        {
            return Err(StorageError::duplicate(relationship));
        }

        state
            .relationships
            .insert(relationship.id, relationship.clone());
        Ok(())
    }

    async fn get_relationship(&self, id: &RelationshipId) -> StorageResult<Option<Relationship>> {
        let state = self.read()?;
        Ok(state.relationships.get(id).cloned())
    }

    async fn scan_relationships(
        &self,
        filter: &RelationshipFilter,
    ) -> StorageResult<Vec<Relationship>> {
        let state = self.read()?;
        let candidates = state
            .relationships
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        Ok(filter.apply(candidates))
    }

    async fn delete_relationship(&self, id: &RelationshipId) -> StorageResult<bool> {
        let mut state = self.write()?;
        Ok(state.relationships.remove(id).is_some())
    }

    // Property operations

    async fn get_properties(&self, entity_id: &EntityId) -> StorageResult<Vec<Property>> {
        let state = self.read()?;
        Ok(state
            .properties
            .iter()
            .filter(|((owner, _), _)| owner == entity_id)
            .map(|(_, p)| p.clone())
            .collect())
    }

    async fn get_property(
        &self,
        entity_id: &EntityId,
        key: &str,
    ) -> StorageResult<Option<Property>> {
        let state = self.read()?;
        Ok(state
            .properties
            .get(&(*entity_id, key.to_string()))
            .cloned())
    }

    async fn upsert_property(&self, property: &Property) -> StorageResult<()> {
        let mut state = self.write()?;
        if !state.entities.contains_key(&property.entity_id) {
            return Err(StorageError::EntityNotFound(property.entity_id.to_string()));
        }
        state.properties.insert(
            (property.entity_id, property.key.clone()),
            property.clone(),
        );
        Ok(())
    }

    async fn delete_property(&self, entity_id: &EntityId, key: &str) -> StorageResult<bool> {
        let mut state = self.write()?;
        Ok(state
            .properties
            .remove(&(*entity_id, key.to_string()))
            .is_some())
    }

    async fn counts(&self) -> StorageResult<(usize, usize)> {
        let state = self.read()?;
        Ok((state.entities.len(), state.relationships.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use girder_core::RelationshipType;

    #[tokio::test]
    async fn test_memory_storage() {
        let storage = MemoryStorage::new();
        storage.initialize().await.unwrap();

        let entity = Entity::new("room", "Lobby");
        storage.put_entity(&entity).await.unwrap();

        let retrieved = storage.get_entity(&entity.id).await.unwrap();
        assert_eq!(retrieved.map(|e| e.name), Some("Lobby".to_string()));

        assert!(storage.delete_entity(&entity.id).await.unwrap());
        assert!(storage.get_entity(&entity.id).await.unwrap().is_none());
        assert!(!storage.delete_entity(&entity.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_requires_existing_entity() {
        let storage = MemoryStorage::new();
        let mut room = Entity::new("room", "101");

        assert!(matches!(
            storage.update_entity(&room).await,
            Err(StorageError::EntityNotFound(_))
        ));
        assert!(storage.get_entity(&room.id).await.unwrap().is_none());

        storage.put_entity(&room).await.unwrap();
        room.name = "102".to_string();
        storage.update_entity(&room).await.unwrap();
        assert_eq!(
            storage.get_entity(&room.id).await.unwrap().map(|e| e.name),
            Some("102".to_string())
        );
    }

    #[tokio::test]
    async fn test_duplicate_and_missing_endpoints() {
        let storage = MemoryStorage::new();
        let floor = Entity::new("floor", "L1");
        let room = Entity::new("room", "101");
        storage.put_entity(&floor).await.unwrap();
        storage.put_entity(&room).await.unwrap();

        let rel = Relationship::new(floor.id, room.id, RelationshipType::Contains);
        storage.insert_relationship(&rel).await.unwrap();

        let again = Relationship::new(floor.id, room.id, RelationshipType::Contains);
        assert!(matches!(
            storage.insert_relationship(&again).await,
            Err(StorageError::DuplicateRelationship { .. })
        ));

        let dangling = Relationship::new(floor.id, EntityId::new(), RelationshipType::Contains);
        assert!(matches!(
            storage.insert_relationship(&dangling).await,
            Err(StorageError::EntityNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cascade_delete() {
        let storage = MemoryStorage::new();
        let room = Entity::new("room", "101");
        let device = Entity::new("device", "Sensor");
        storage.put_entity(&room).await.unwrap();
        storage.put_entity(&device).await.unwrap();
        storage
            .insert_relationship(&Relationship::new(room.id, device.id, "CONTAINS"))
            .await
            .unwrap();
        storage
            .upsert_property(&Property::new(device.id, "firmware", "1.0"))
            .await
            .unwrap();

        assert!(storage.delete_entity(&device.id).await.unwrap());

        let remaining = storage
            .scan_relationships(&RelationshipFilter::for_entity(
                device.id,
                girder_core::Direction::Both,
            ))
            .await
            .unwrap();
        assert!(remaining.is_empty());
        assert!(storage.get_properties(&device.id).await.unwrap().is_empty());
        assert_eq!(storage.counts().await.unwrap(), (1, 0));
    }
}
