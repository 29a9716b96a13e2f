//! Entity store: validated entity and property writes, listings and search

use crate::config::EngineConfig;
use girder_core::limits::{self, MAX_PAGE_SIZE};
use girder_core::{
    Entity, EntityFilter, EntityId, EntityUpdate, Error, NewEntity, Property, Result, SearchQuery,
    Value,
};
use girder_search::{HybridSearchEngine, SearchEngine};
use girder_storage::StorageBackend;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Entry point for entity and property reads and writes
#[derive(Clone)]
pub struct EntityStore {
    storage: Arc<dyn StorageBackend>,
    search: Arc<dyn SearchEngine>,
    config: Arc<EngineConfig>,
}

impl EntityStore {
    pub fn new(storage: Arc<dyn StorageBackend>, config: Arc<EngineConfig>) -> Self {
        Self {
            storage,
            search: Arc::new(HybridSearchEngine::new()),
            config,
        }
    }

    /// Replace the search engine used by [`EntityStore::search`]
    pub fn with_search_engine(mut self, search: Arc<dyn SearchEngine>) -> Self {
        self.search = search;
        self
    }

    fn validate(entity: &Entity) -> Result<()> {
        limits::validate_entity_type(entity.entity_type.as_str())?;
        limits::validate_entity_name(&entity.name)?;
        limits::validate_metadata(&entity.metadata)?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Entities
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn create_entity(&self, new: NewEntity) -> Result<Entity> {
        let mut entity = Entity::new(new.entity_type, new.name);
        entity.metadata = new.metadata;
        entity.device_uuid = new.device_uuid;
        Self::validate(&entity)?;

        self.storage.put_entity(&entity).await?;
        tracing::info!(id = %entity.id, entity_type = %entity.entity_type, "Created entity '{}'", entity.name);
        Ok(entity)
    }

    /// Store an entity as-is, keeping its id and timestamps
    pub async fn restore_entity(&self, entity: &Entity) -> Result<()> {
        Self::validate(entity)?;
        self.storage.put_entity(entity).await?;
        Ok(())
    }

    pub async fn get_entity(&self, id: &EntityId) -> Result<Option<Entity>> {
        Ok(self.storage.get_entity(id).await?)
    }

    /// Like [`EntityStore::get_entity`] but absent is an error
    pub async fn require_entity(&self, id: &EntityId) -> Result<Entity> {
        self.get_entity(id)
            .await?
            .ok_or_else(|| Error::EntityNotFound(id.to_string()))
    }

    pub async fn update_entity(&self, id: &EntityId, update: EntityUpdate) -> Result<Entity> {
        let mut entity = self.require_entity(id).await?;
        update.apply_to(&mut entity);
        Self::validate(&entity)?;

        self.storage.update_entity(&entity).await?;
        tracing::info!(id = %entity.id, "Updated entity '{}'", entity.name);
        Ok(entity)
    }

    /// Delete an entity with its relationships and properties
    pub async fn delete_entity(&self, id: &EntityId) -> Result<bool> {
        let deleted = self.storage.delete_entity(id).await?;
        if deleted {
            tracing::info!(id = %id, "Deleted entity");
        } else {
            tracing::debug!(id = %id, "Delete skipped, entity absent");
        }
        Ok(deleted)
    }

    pub async fn list_entities(&self, filter: &EntityFilter) -> Result<Vec<Entity>> {
        let entities = self.storage.scan_entities(filter).await?;
        tracing::debug!("Listed {} entities", entities.len());
        Ok(entities)
    }

    /// First entity carrying the given device back-reference
    pub async fn find_by_device_uuid(&self, device_uuid: &str) -> Result<Option<Entity>> {
        let filter = EntityFilter::all().with_device_uuid(device_uuid);
        let mut matches = self.storage.scan_entities(&filter).await?;
        // Listings are newest first; the oldest holder of a uuid wins
        Ok(matches.pop())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Search
    // ─────────────────────────────────────────────────────────────────────────

    /// Name search: exact, then prefix, then substring, then fuzzy matches
    pub async fn search_entities(&self, text: &str, limit: Option<usize>) -> Result<Vec<Entity>> {
        let limit = limit.unwrap_or(self.config.search_limit);
        self.search(&SearchQuery::new(text).with_limit(limit)).await
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<Entity>> {
        if query.text.trim().is_empty() || query.limit == 0 {
            return Ok(Vec::new());
        }

        let candidates = self.storage.scan_entities(&EntityFilter::all()).await?;
        let query = query.clone().with_limit(query.limit.min(MAX_PAGE_SIZE));
        let found = self.search.search_entities(&query, &candidates).await?;

        tracing::debug!(
            "Search '{}' matched {} of {} entities",
            query.text,
            found.len(),
            candidates.len()
        );
        Ok(found)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Type summaries
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn get_entity_types(&self) -> Result<BTreeSet<String>> {
        Ok(self.count_entities_by_type().await?.into_keys().collect())
    }

    pub async fn count_entities_by_type(&self) -> Result<BTreeMap<String, usize>> {
        let entities = self.storage.scan_entities(&EntityFilter::all()).await?;
        let mut counts = BTreeMap::new();
        for entity in entities {
            *counts.entry(entity.entity_type.0).or_insert(0) += 1;
        }
        Ok(counts)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Properties
    // ─────────────────────────────────────────────────────────────────────────

    /// All properties of an entity, ordered by key
    pub async fn get_all_properties(&self, id: &EntityId) -> Result<Vec<Property>> {
        self.require_entity(id).await?;
        Ok(self.storage.get_properties(id).await?)
    }

    pub async fn get_property(&self, id: &EntityId, key: &str) -> Result<Option<Property>> {
        self.require_entity(id).await?;
        Ok(self.storage.get_property(id, key).await?)
    }

    /// Set a property, replacing any previous value under `key`
    pub async fn set_property(
        &self,
        id: &EntityId,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<Property> {
        let property = Property::new(*id, key, value);
        limits::validate_key(&property.key)?;
        limits::validate_value(&property.key, &property.value)?;

        // The backend checks the owner inside the same write
        self.storage.upsert_property(&property).await?;
        tracing::debug!(id = %id, key, "Set property");
        Ok(property)
    }

    /// Store a property as-is, keeping its timestamp
    pub async fn restore_property(&self, property: &Property) -> Result<()> {
        limits::validate_key(&property.key)?;
        limits::validate_value(&property.key, &property.value)?;
        self.storage.upsert_property(property).await?;
        Ok(())
    }

    pub async fn delete_property(&self, id: &EntityId, key: &str) -> Result<bool> {
        self.require_entity(id).await?;
        Ok(self.storage.delete_property(id, key).await?)
    }
}
