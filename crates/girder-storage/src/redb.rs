//! ReDB storage backend

use crate::error::{StorageError, StorageResult};
use crate::migration::Migratable;
use crate::traits::StorageBackend;
use async_trait::async_trait;
use girder_core::{
    Entity, EntityFilter, EntityId, Property, Relationship, RelationshipFilter, RelationshipId,
};
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

// Table definitions
const ENTITIES: TableDefinition<&str, &[u8]> = TableDefinition::new("entities");
const RELATIONSHIPS: TableDefinition<&str, &[u8]> = TableDefinition::new("relationships");
const PROPERTIES: TableDefinition<&str, &[u8]> = TableDefinition::new("properties");
const META: TableDefinition<&str, u32> = TableDefinition::new("meta");

// "source|target|TYPE" -> relationship id
const TRIPLES: TableDefinition<&str, &str> = TableDefinition::new("relationship_triples");

// "entity_id:relationship_id" -> relationship id, one row per endpoint
const INCIDENCE: TableDefinition<&str, &str> = TableDefinition::new("incidence");

const SCHEMA_VERSION_KEY: &str = "schema_version";

/// ReDB storage backend
pub struct RedbStorage {
    db: Mutex<Database>,
}

impl RedbStorage {
    /// Open or create a ReDB database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        let storage = Self { db: Mutex::new(db) };
        storage.migrate_to_latest()?;
        Ok(storage)
    }

    fn db(&self) -> StorageResult<MutexGuard<'_, Database>> {
        self.db.lock().map_err(StorageError::lock)
    }

    fn triple_key(relationship: &Relationship) -> String {
        format!(
            "{}|{}|{}",
            relationship.source_id, relationship.target_id, relationship.relationship_type
        )
    }

    fn incidence_key(entity: &EntityId, relationship: &RelationshipId) -> String {
        format!("{}:{}", entity, relationship)
    }

    fn property_key(entity: &EntityId, key: &str) -> String {
        format!("{}:{}", entity, key)
    }

    /// Key range covering every "<owner>:..." key
    fn prefix_bounds(owner: &EntityId) -> (String, String) {
        (format!("{}:", owner), format!("{};", owner))
    }
}

impl Migratable for RedbStorage {
    fn get_schema_version(&self) -> StorageResult<u32> {
        let db = self.db()?;
        let read_txn = db.begin_read()?;
        let table = match read_txn.open_table(META) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let version = table.get(SCHEMA_VERSION_KEY)?.map(|v| v.value());
        Ok(version.unwrap_or(0))
    }

    fn set_schema_version(&self, version: u32) -> StorageResult<()> {
        let db = self.db()?;
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(META)?;
            table.insert(SCHEMA_VERSION_KEY, version)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn run_migration(&self, version: u32) -> StorageResult<()> {
        let db = self.db()?;
        let write_txn = db.begin_write()?;
        match version {
            1 => {
                write_txn.open_table(ENTITIES)?;
                write_txn.open_table(RELATIONSHIPS)?;
                write_txn.open_table(TRIPLES)?;
                write_txn.open_table(INCIDENCE)?;
            }
            2 => {
                write_txn.open_table(PROPERTIES)?;
            }
            other => {
                return Err(StorageError::Migration(format!(
                    "Unknown schema version {}",
                    other
                )))
            }
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for RedbStorage {
    async fn initialize(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn health_check(&self) -> StorageResult<bool> {
        let db = self.db()?;
        let read_txn = db.begin_read()?;
        read_txn.open_table(ENTITIES)?;
        Ok(true)
    }

    // Entity operations

    async fn put_entity(&self, entity: &Entity) -> StorageResult<()> {
        let key = entity.id.to_string();
        let value = serde_json::to_vec(entity)?;

        let db = self.db()?;
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(ENTITIES)?;
            table.insert(key.as_str(), value.as_slice())?;
        }
        write_txn.commit()?;

        Ok(())
    }

    async fn update_entity(&self, entity: &Entity) -> StorageResult<()> {
        let key = entity.id.to_string();
        let value = serde_json::to_vec(entity)?;

        let db = self.db()?;
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(ENTITIES)?;
            if table.get(key.as_str())?.is_none() {
                return Err(StorageError::EntityNotFound(key));
            }
            table.insert(key.as_str(), value.as_slice())?;
        }
        write_txn.commit()?;

        Ok(())
    }

    async fn get_entity(&self, id: &EntityId) -> StorageResult<Option<Entity>> {
        let key = id.to_string();

        let db = self.db()?;
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(ENTITIES)?;

        if let Some(value) = table.get(key.as_str())? {
            let entity: Entity = serde_json::from_slice(value.value())?;
            Ok(Some(entity))
        } else {
            Ok(None)
        }
    }

    async fn scan_entities(&self, filter: &EntityFilter) -> StorageResult<Vec<Entity>> {
        let db = self.db()?;
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(ENTITIES)?;

        let mut entities = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let entity: Entity = serde_json::from_slice(value.value())?;
            if filter.matches(&entity) {
                entities.push(entity);
            }
        }

        Ok(filter.apply(entities))
    }

    async fn delete_entity(&self, id: &EntityId) -> StorageResult<bool> {
        let key = id.to_string();
        let (start, end) = Self::prefix_bounds(id);

        let db = self.db()?;
        let write_txn = db.begin_write()?;
        let removed;
        {
            let mut entities = write_txn.open_table(ENTITIES)?;
            removed = entities.remove(key.as_str())?.is_some();

            if removed {
                let mut incidence = write_txn.open_table(INCIDENCE)?;
                let mut relationships = write_txn.open_table(RELATIONSHIPS)?;
                let mut triples = write_txn.open_table(TRIPLES)?;

                let rel_ids = incidence
                    .range(start.as_str()..end.as_str())?
                    .map(|entry| entry.map(|(_, v)| v.value().to_string()))
                    .collect::<Result<Vec<_>, _>>()?;

                for rel_id in rel_ids {
                    let relationship: Option<Relationship> =
                        match relationships.remove(rel_id.as_str())? {
                            Some(value) => Some(serde_json::from_slice(value.value())?),
                            None => None,
                        };
                    let Some(relationship) = relationship else {
                        continue;
                    };
                    triples.remove(Self::triple_key(&relationship).as_str())?;
                    for endpoint in [relationship.source_id, relationship.target_id] {
                        incidence
                            .remove(Self::incidence_key(&endpoint, &relationship.id).as_str())?;
                    }
                }

                let mut properties = write_txn.open_table(PROPERTIES)?;
                let property_keys = properties
                    .range(start.as_str()..end.as_str())?
                    .map(|entry| entry.map(|(k, _)| k.value().to_string()))
                    .collect::<Result<Vec<_>, _>>()?;
                for property_key in property_keys {
                    properties.remove(property_key.as_str())?;
                }
            }
        }
        write_txn.commit()?;

        Ok(removed)
    }

    // Relationship operations

    async fn insert_relationship(&self, relationship: &Relationship) -> StorageResult<()> {
        let rel_id = relationship.id.to_string();
        let triple = Self::triple_key(relationship);
        let value = serde_json::to_vec(relationship)?;

        let db = self.db()?;
        let write_txn = db.begin_write()?;
        {
            let entities = write_txn.open_table(ENTITIES)?;
            for endpoint in [&relationship.source_id, &relationship.target_id] {
                if entities.get(endpoint.to_string().as_str())?.is_none() {
                    return Err(StorageError::EntityNotFound(endpoint.to_string()));
                }
            }

            let mut triples = write_txn.open_table(TRIPLES)?;
            if triples.get(triple.as_str())?.is_some() {
                return Err(StorageError::duplicate(relationship));
            }
            triples.insert(triple.as_str(), rel_id.as_str())?;

            let mut relationships = write_txn.open_table(RELATIONSHIPS)?;
            relationships.insert(rel_id.as_str(), value.as_slice())?;

            let mut incidence = write_txn.open_table(INCIDENCE)?;
            for endpoint in [&relationship.source_id, &relationship.target_id] {
                let key = Self::incidence_key(endpoint, &relationship.id);
                incidence.insert(key.as_str(), rel_id.as_str())?;
            }
        }
        write_txn.commit()?;

        Ok(())
    }

    async fn get_relationship(&self, id: &RelationshipId) -> StorageResult<Option<Relationship>> {
        let key = id.to_string();

        let db = self.db()?;
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(RELATIONSHIPS)?;

        if let Some(value) = table.get(key.as_str())? {
            let relationship: Relationship = serde_json::from_slice(value.value())?;
            Ok(Some(relationship))
        } else {
            Ok(None)
        }
    }

    async fn scan_relationships(
        &self,
        filter: &RelationshipFilter,
    ) -> StorageResult<Vec<Relationship>> {
        let db = self.db()?;
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(RELATIONSHIPS)?;

        let mut relationships = Vec::new();
        match filter.entity.or(filter.source).or(filter.target) {
            Some(anchor) => {
                let (start, end) = Self::prefix_bounds(&anchor);
                let incidence = read_txn.open_table(INCIDENCE)?;
                for entry in incidence.range(start.as_str()..end.as_str())? {
                    let (_, rel_id) = entry?;
                    if let Some(value) = table.get(rel_id.value())? {
                        relationships.push(serde_json::from_slice(value.value())?);
                    }
                }
            }
            None => {
                for entry in table.iter()? {
                    let (_, value) = entry?;
                    relationships.push(serde_json::from_slice(value.value())?);
                }
            }
        }

        Ok(filter.apply(relationships))
    }

    async fn delete_relationship(&self, id: &RelationshipId) -> StorageResult<bool> {
        let key = id.to_string();

        let db = self.db()?;
        let write_txn = db.begin_write()?;
        let removed;
        {
            let mut relationships = write_txn.open_table(RELATIONSHIPS)?;
            let relationship: Option<Relationship> = match relationships.remove(key.as_str())? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };
            removed = relationship.is_some();

            if let Some(relationship) = relationship {
                let mut triples = write_txn.open_table(TRIPLES)?;
                triples.remove(Self::triple_key(&relationship).as_str())?;

                let mut incidence = write_txn.open_table(INCIDENCE)?;
                for endpoint in [relationship.source_id, relationship.target_id] {
                    incidence.remove(Self::incidence_key(&endpoint, id).as_str())?;
                }
            }
        }
        write_txn.commit()?;

        Ok(removed)
    }

    // Property operations

    async fn get_properties(&self, entity_id: &EntityId) -> StorageResult<Vec<Property>> {
        let (start, end) = Self::prefix_bounds(entity_id);

        let db = self.db()?;
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(PROPERTIES)?;

        let mut properties = Vec::new();
        for entry in table.range(start.as_str()..end.as_str())? {
            let (_, value) = entry?;
            properties.push(serde_json::from_slice(value.value())?);
        }

        Ok(properties)
    }

    async fn get_property(
        &self,
        entity_id: &EntityId,
        key: &str,
    ) -> StorageResult<Option<Property>> {
        let key = Self::property_key(entity_id, key);

        let db = self.db()?;
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(PROPERTIES)?;

        if let Some(value) = table.get(key.as_str())? {
            let property: Property = serde_json::from_slice(value.value())?;
            Ok(Some(property))
        } else {
            Ok(None)
        }
    }

    async fn upsert_property(&self, property: &Property) -> StorageResult<()> {
        let owner = property.entity_id.to_string();
        let key = Self::property_key(&property.entity_id, &property.key);
        let value = serde_json::to_vec(property)?;

        let db = self.db()?;
        let write_txn = db.begin_write()?;
        {
            let entities = write_txn.open_table(ENTITIES)?;
            if entities.get(owner.as_str())?.is_none() {
                return Err(StorageError::EntityNotFound(owner));
            }

            let mut table = write_txn.open_table(PROPERTIES)?;
            table.insert(key.as_str(), value.as_slice())?;
        }
        write_txn.commit()?;

        Ok(())
    }

    async fn delete_property(&self, entity_id: &EntityId, key: &str) -> StorageResult<bool> {
        let key = Self::property_key(entity_id, key);

        let db = self.db()?;
        let write_txn = db.begin_write()?;
        let removed;
        {
            let mut table = write_txn.open_table(PROPERTIES)?;
            removed = table.remove(key.as_str())?.is_some();
        }
        write_txn.commit()?;

        Ok(removed)
    }

    async fn counts(&self) -> StorageResult<(usize, usize)> {
        let db = self.db()?;
        let read_txn = db.begin_read()?;
        let entities = read_txn.open_table(ENTITIES)?.len()?;
        let relationships = read_txn.open_table(RELATIONSHIPS)?.len()?;
        Ok((entities as usize, relationships as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::CURRENT_VERSION;
    use girder_core::{Direction, RelationshipType};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_redb_storage() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.redb");

        let storage = RedbStorage::open(&db_path).unwrap();
        assert!(storage.health_check().await.unwrap());
        assert_eq!(storage.get_schema_version().unwrap(), CURRENT_VERSION);

        let building = Entity::new("building", "HQ").with_metadata("city", "Oslo");
        storage.put_entity(&building).await.unwrap();

        let retrieved = storage.get_entity(&building.id).await.unwrap();
        assert_eq!(retrieved, Some(building.clone()));

        let found = storage
            .scan_entities(&EntityFilter::new().with_metadata("city", "Oslo"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_update_after_delete_fails() {
        let dir = tempdir().unwrap();
        let storage = RedbStorage::open(dir.path().join("test.redb")).unwrap();

        let mut room = Entity::new("room", "101");
        storage.put_entity(&room).await.unwrap();
        room.name = "102".to_string();
        storage.update_entity(&room).await.unwrap();
        assert_eq!(
            storage.get_entity(&room.id).await.unwrap().map(|e| e.name),
            Some("102".to_string())
        );

        assert!(storage.delete_entity(&room.id).await.unwrap());
        assert!(matches!(
            storage.update_entity(&room).await,
            Err(StorageError::EntityNotFound(_))
        ));
        assert!(storage.get_entity(&room.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_relationship_lifecycle() {
        let dir = tempdir().unwrap();
        let storage = RedbStorage::open(dir.path().join("test.redb")).unwrap();

        let floor = Entity::new("floor", "L1");
        let room = Entity::new("room", "101");
        storage.put_entity(&floor).await.unwrap();
        storage.put_entity(&room).await.unwrap();

        let rel = Relationship::new(floor.id, room.id, RelationshipType::Contains);
        storage.insert_relationship(&rel).await.unwrap();

        let dup = Relationship::new(floor.id, room.id, RelationshipType::Contains);
        assert!(matches!(
            storage.insert_relationship(&dup).await,
            Err(StorageError::DuplicateRelationship { .. })
        ));

        let outgoing = storage
            .scan_relationships(&RelationshipFilter::outgoing(floor.id))
            .await
            .unwrap();
        assert_eq!(outgoing, vec![rel.clone()]);
        let incoming = storage
            .scan_relationships(&RelationshipFilter::incoming(floor.id))
            .await
            .unwrap();
        assert!(incoming.is_empty());

        // Deleting frees the triple for reuse
        assert!(storage.delete_relationship(&rel.id).await.unwrap());
        assert!(!storage.delete_relationship(&rel.id).await.unwrap());
        storage.insert_relationship(&dup).await.unwrap();
    }

    #[tokio::test]
    async fn test_cascade_delete_survives_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.redb");

        let room = Entity::new("room", "101");
        let device = Entity::new("device", "Sensor");
        {
            let storage = RedbStorage::open(&db_path).unwrap();
            storage.put_entity(&room).await.unwrap();
            storage.put_entity(&device).await.unwrap();
            storage
                .insert_relationship(&Relationship::new(room.id, device.id, "CONTAINS"))
                .await
                .unwrap();
            storage
                .upsert_property(&Property::new(device.id, "b", 2i64))
                .await
                .unwrap();
            storage
                .upsert_property(&Property::new(device.id, "a", 1i64))
                .await
                .unwrap();

            let keys: Vec<String> = storage
                .get_properties(&device.id)
                .await
                .unwrap()
                .into_iter()
                .map(|p| p.key)
                .collect();
            assert_eq!(keys, vec!["a", "b"]);

            assert!(storage.delete_entity(&device.id).await.unwrap());
        }

        let storage = RedbStorage::open(&db_path).unwrap();
        assert_eq!(storage.counts().await.unwrap(), (1, 0));
        assert!(storage
            .scan_relationships(&RelationshipFilter::for_entity(room.id, Direction::Both))
            .await
            .unwrap()
            .is_empty());
        assert!(storage.get_properties(&device.id).await.unwrap().is_empty());

        let orphan_prop = storage
            .upsert_property(&Property::new(device.id, "a", 1i64))
            .await;
        assert!(matches!(orphan_prop, Err(StorageError::EntityNotFound(_))));
    }
}
