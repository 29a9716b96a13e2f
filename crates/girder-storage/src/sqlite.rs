//! SQLite storage backend

use crate::error::{StorageError, StorageResult};
use crate::migration::Migratable;
use crate::traits::StorageBackend;
use async_trait::async_trait;
use girder_core::{
    Entity, EntityFilter, EntityId, Property, Relationship, RelationshipFilter, RelationshipId,
};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

// How long a writer waits for another process holding the write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite storage backend
///
/// Rows keep the full record as JSON in `data`; the other columns exist for
/// keys, constraints and index-assisted lookups.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open or create a SQLite database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory SQLite database (for testing)
    pub fn in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.migrate_to_latest()?;
        Ok(storage)
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(StorageError::lock)
    }

    fn entity_exists(conn: &Connection, id: &EntityId) -> StorageResult<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM entities WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn collect_json<T: serde::de::DeserializeOwned>(
        stmt: &mut rusqlite::Statement<'_>,
        params: impl rusqlite::Params,
    ) -> StorageResult<Vec<T>> {
        let rows = stmt.query_map(params, |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(serde_json::from_str(&row?)?);
        }
        Ok(out)
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

impl Migratable for SqliteStorage {
    fn get_schema_version(&self) -> StorageResult<u32> {
        let conn = self.conn()?;
        let version: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        Ok(version)
    }

    fn set_schema_version(&self, version: u32) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(&format!("PRAGMA user_version = {};", version))?;
        Ok(())
    }

    fn run_migration(&self, version: u32) -> StorageResult<()> {
        let conn = self.conn()?;
        match version {
            1 => conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS entities (
                    id TEXT PRIMARY KEY,
                    entity_type TEXT NOT NULL,
                    name TEXT NOT NULL,
                    device_uuid TEXT,
                    created_at TEXT NOT NULL,
                    data TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS relationships (
                    id TEXT PRIMARY KEY,
                    source_id TEXT NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
                    target_id TEXT NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
                    relationship_type TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    data TEXT NOT NULL,
                    UNIQUE (source_id, target_id, relationship_type)
                );

                CREATE INDEX IF NOT EXISTS idx_entities_type ON entities(lower(entity_type));
                CREATE INDEX IF NOT EXISTS idx_entities_device ON entities(device_uuid);
                CREATE INDEX IF NOT EXISTS idx_relationships_source ON relationships(source_id);
                CREATE INDEX IF NOT EXISTS idx_relationships_target ON relationships(target_id);
                "#,
            )?,
            2 => conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS properties (
                    entity_id TEXT NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
                    key TEXT NOT NULL,
                    data TEXT NOT NULL,
                    PRIMARY KEY (entity_id, key)
                );
                "#,
            )?,
            other => {
                return Err(StorageError::Migration(format!(
                    "Unknown schema version {}",
                    other
                )))
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for SqliteStorage {
    async fn initialize(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn health_check(&self) -> StorageResult<bool> {
        let conn = self.conn()?;
        let one: i64 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
        Ok(one == 1)
    }

    // Entity operations

    async fn put_entity(&self, entity: &Entity) -> StorageResult<()> {
        let conn = self.conn()?;
        let data = serde_json::to_string(entity)?;

        // Upsert rather than REPLACE so the cascade does not fire on update
        conn.execute(
            r#"
            INSERT INTO entities (id, entity_type, name, device_uuid, created_at, data)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                entity_type = excluded.entity_type,
                name = excluded.name,
                device_uuid = excluded.device_uuid,
                data = excluded.data
            "#,
            params![
                entity.id.to_string(),
                entity.entity_type.as_str(),
                entity.name,
                entity.device_uuid,
                entity.created_at.to_rfc3339(),
                data
            ],
        )?;

        Ok(())
    }

    async fn update_entity(&self, entity: &Entity) -> StorageResult<()> {
        let conn = self.conn()?;
        let data = serde_json::to_string(entity)?;

        let updated = conn.execute(
            r#"
            UPDATE entities
            SET entity_type = ?2, name = ?3, device_uuid = ?4, data = ?5
            WHERE id = ?1
            "#,
            params![
                entity.id.to_string(),
                entity.entity_type.as_str(),
                entity.name,
                entity.device_uuid,
                data
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::EntityNotFound(entity.id.to_string()));
        }

        Ok(())
    }

    async fn get_entity(&self, id: &EntityId) -> StorageResult<Option<Entity>> {
        let conn = self.conn()?;
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM entities WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match data {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn scan_entities(&self, filter: &EntityFilter) -> StorageResult<Vec<Entity>> {
        let conn = self.conn()?;

        let candidates: Vec<Entity> = match (&filter.device_uuid, &filter.entity_type) {
            (Some(uuid), _) => {
                let mut stmt = conn.prepare("SELECT data FROM entities WHERE device_uuid = ?1")?;
                Self::collect_json(&mut stmt, params![uuid])?
            }
            (None, Some(entity_type)) => {
                let mut stmt = conn
                    .prepare("SELECT data FROM entities WHERE lower(entity_type) = lower(?1)")?;
                Self::collect_json(&mut stmt, params![entity_type.as_str()])?
            }
            (None, None) => {
                let mut stmt = conn.prepare("SELECT data FROM entities")?;
                Self::collect_json(&mut stmt, [])?
            }
        };

        Ok(filter.apply(candidates))
    }

    async fn delete_entity(&self, id: &EntityId) -> StorageResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let key = id.to_string();

        // Explicit deletes keep the cascade intact even if foreign keys are off
        tx.execute(
            "DELETE FROM relationships WHERE source_id = ?1 OR target_id = ?1",
            params![key],
        )?;
        tx.execute("DELETE FROM properties WHERE entity_id = ?1", params![key])?;
        let removed = tx.execute("DELETE FROM entities WHERE id = ?1", params![key])?;
        tx.commit()?;

        Ok(removed > 0)
    }

    // Relationship operations

    async fn insert_relationship(&self, relationship: &Relationship) -> StorageResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        for endpoint in [&relationship.source_id, &relationship.target_id] {
            if !Self::entity_exists(&tx, endpoint)? {
                return Err(StorageError::EntityNotFound(endpoint.to_string()));
            }
        }

        let data = serde_json::to_string(relationship)?;
        let inserted = tx.execute(
            r#"
            INSERT INTO relationships (id, source_id, target_id, relationship_type, created_at, data)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                relationship.id.to_string(),
                relationship.source_id.to_string(),
                relationship.target_id.to_string(),
                relationship.relationship_type.as_str(),
                relationship.created_at.to_rfc3339(),
                data
            ],
        );

        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Err(StorageError::duplicate(relationship)),
            Err(e) => return Err(e.into()),
        }

        tx.commit()?;
        Ok(())
    }

    async fn get_relationship(&self, id: &RelationshipId) -> StorageResult<Option<Relationship>> {
        let conn = self.conn()?;
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM relationships WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match data {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn scan_relationships(
        &self,
        filter: &RelationshipFilter,
    ) -> StorageResult<Vec<Relationship>> {
        let conn = self.conn()?;

        let candidates: Vec<Relationship> = match filter.entity.or(filter.source).or(filter.target)
        {
            Some(anchor) => {
                let mut stmt = conn.prepare(
                    "SELECT data FROM relationships WHERE source_id = ?1 OR target_id = ?1",
                )?;
                Self::collect_json(&mut stmt, params![anchor.to_string()])?
            }
            None => {
                let mut stmt = conn.prepare("SELECT data FROM relationships")?;
                Self::collect_json(&mut stmt, [])?
            }
        };

        Ok(filter.apply(candidates))
    }

    async fn delete_relationship(&self, id: &RelationshipId) -> StorageResult<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM relationships WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(removed > 0)
    }

    // Property operations

    async fn get_properties(&self, entity_id: &EntityId) -> StorageResult<Vec<Property>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT data FROM properties WHERE entity_id = ?1 ORDER BY key")?;
        Self::collect_json(&mut stmt, params![entity_id.to_string()])
    }

    async fn get_property(
        &self,
        entity_id: &EntityId,
        key: &str,
    ) -> StorageResult<Option<Property>> {
        let conn = self.conn()?;
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM properties WHERE entity_id = ?1 AND key = ?2",
                params![entity_id.to_string(), key],
                |row| row.get(0),
            )
            .optional()?;

        match data {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn upsert_property(&self, property: &Property) -> StorageResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !Self::entity_exists(&tx, &property.entity_id)? {
            return Err(StorageError::EntityNotFound(property.entity_id.to_string()));
        }

        let data = serde_json::to_string(property)?;
        tx.execute(
            "INSERT OR REPLACE INTO properties (entity_id, key, data) VALUES (?1, ?2, ?3)",
            params![property.entity_id.to_string(), property.key, data],
        )?;
        tx.commit()?;

        Ok(())
    }

    async fn delete_property(&self, entity_id: &EntityId, key: &str) -> StorageResult<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM properties WHERE entity_id = ?1 AND key = ?2",
            params![entity_id.to_string(), key],
        )?;
        Ok(removed > 0)
    }

    async fn counts(&self) -> StorageResult<(usize, usize)> {
        let conn = self.conn()?;
        let entities: i64 = conn.query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))?;
        let relationships: i64 =
            conn.query_row("SELECT COUNT(*) FROM relationships", [], |row| row.get(0))?;
        Ok((entities as usize, relationships as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::CURRENT_VERSION;
    use girder_core::{Direction, RelationshipType};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_sqlite_storage() {
        let storage = SqliteStorage::in_memory().unwrap();
        assert!(storage.health_check().await.unwrap());
        assert_eq!(storage.get_schema_version().unwrap(), CURRENT_VERSION);

        let entity = Entity::new("device", "Thermostat").with_device_uuid("dev-1");
        storage.put_entity(&entity).await.unwrap();

        let retrieved = storage.get_entity(&entity.id).await.unwrap().unwrap();
        assert_eq!(retrieved, entity);

        let by_uuid = storage
            .scan_entities(&EntityFilter::new().with_device_uuid("dev-1"))
            .await
            .unwrap();
        assert_eq!(by_uuid.len(), 1);

        let by_type = storage
            .scan_entities(&EntityFilter::new().with_type("DEVICE"))
            .await
            .unwrap();
        assert_eq!(by_type.len(), 1);
    }

    #[tokio::test]
    async fn test_update_keeps_relationships() {
        let storage = SqliteStorage::in_memory().unwrap();
        let room = Entity::new("room", "101");
        let mut device = Entity::new("device", "Sensor");
        storage.put_entity(&room).await.unwrap();
        storage.put_entity(&device).await.unwrap();
        storage
            .insert_relationship(&Relationship::new(room.id, device.id, RelationshipType::Contains))
            .await
            .unwrap();

        device.name = "Renamed".to_string();
        storage.update_entity(&device).await.unwrap();

        assert_eq!(storage.counts().await.unwrap(), (2, 1));
        assert_eq!(
            storage.get_entity(&device.id).await.unwrap().map(|e| e.name),
            Some("Renamed".to_string())
        );

        assert!(storage.delete_entity(&device.id).await.unwrap());
        assert!(matches!(
            storage.update_entity(&device).await,
            Err(StorageError::EntityNotFound(_))
        ));
        assert!(storage.get_entity(&device.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_triple() {
        let storage = SqliteStorage::in_memory().unwrap();
        let a = Entity::new("device", "A");
        let b = Entity::new("device", "B");
        storage.put_entity(&a).await.unwrap();
        storage.put_entity(&b).await.unwrap();

        storage
            .insert_relationship(&Relationship::new(a.id, b.id, "DEPENDS_ON"))
            .await
            .unwrap();
        let err = storage
            .insert_relationship(&Relationship::new(a.id, b.id, "DEPENDS_ON"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateRelationship { .. }));

        // Same pair, different type is fine
        storage
            .insert_relationship(&Relationship::new(a.id, b.id, "RELATED_TO"))
            .await
            .unwrap();

        let missing = storage
            .insert_relationship(&Relationship::new(a.id, EntityId::new(), "DEPENDS_ON"))
            .await
            .unwrap_err();
        assert!(matches!(missing, StorageError::EntityNotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_racing_handles_share_one_triple() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("graph.db");
        let first = Arc::new(SqliteStorage::open(&db_path).unwrap());
        let second = Arc::new(SqliteStorage::open(&db_path).unwrap());

        let floor = Entity::new("floor", "L1");
        let room = Entity::new("room", "101");
        first.put_entity(&floor).await.unwrap();
        first.put_entity(&room).await.unwrap();

        let tasks = [first, second].map(|storage| {
            let rel = Relationship::new(floor.id, room.id, RelationshipType::Contains);
            tokio::spawn(async move { storage.insert_relationship(&rel).await })
        });
        let mut inserted = 0;
        let mut duplicates = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(()) => inserted += 1,
                Err(StorageError::DuplicateRelationship { .. }) => duplicates += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!((inserted, duplicates), (1, 1));

        let reader = SqliteStorage::open(&db_path).unwrap();
        assert_eq!(reader.counts().await.unwrap(), (2, 1));
    }

    #[tokio::test]
    async fn test_cascade_and_persistence() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("graph.db");

        let (room, device) = {
            let storage = SqliteStorage::open(&db_path).unwrap();
            let room = Entity::new("room", "101");
            let device = Entity::new("device", "Sensor");
            storage.put_entity(&room).await.unwrap();
            storage.put_entity(&device).await.unwrap();
            storage
                .insert_relationship(&Relationship::new(room.id, device.id, "CONTAINS"))
                .await
                .unwrap();
            storage
                .upsert_property(&Property::new(device.id, "firmware", "2.1"))
                .await
                .unwrap();
            (room, device)
        };

        let storage = SqliteStorage::open(&db_path).unwrap();
        let prop = storage.get_property(&device.id, "firmware").await.unwrap();
        assert_eq!(prop.map(|p| p.value), Some("2.1".into()));

        assert!(storage.delete_entity(&device.id).await.unwrap());
        let rels = storage
            .scan_relationships(&RelationshipFilter::for_entity(room.id, Direction::Both))
            .await
            .unwrap();
        assert!(rels.is_empty());
        assert!(storage.get_properties(&device.id).await.unwrap().is_empty());
    }
}
