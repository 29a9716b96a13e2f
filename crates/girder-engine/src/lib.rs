//! Girder Engine - Entity-relationship graph engine
//!
//! Bundles the entity and relationship stores, breadth-first traversal and
//! the analytics built on it. Every component holds an explicit storage
//! handle and shares one [`EngineConfig`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use girder_core::{NewEntity, NewRelationship};
//! use girder_engine::{EngineConfig, GraphEngine};
//! use girder_storage::MemoryStorage;
//!
//! # async fn demo() -> girder_core::Result<()> {
//! let engine = GraphEngine::new(Arc::new(MemoryStorage::new()), EngineConfig::default());
//! let floor = engine.entities().create_entity(NewEntity::new("floor", "L1")).await?;
//! let room = engine.entities().create_entity(NewEntity::new("room", "101")).await?;
//! engine
//!     .relationships()
//!     .create_relationship(NewRelationship::contains(floor.id, room.id))
//!     .await?;
//! let below = engine.traversal().get_descendants(&floor.id, 5).await?;
//! assert_eq!(below.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod analytics;
pub mod config;
pub mod entities;
pub mod metrics;
pub mod relationships;
pub mod snapshot;
pub mod traversal;

#[cfg(test)]
mod testing;

pub use analytics::{
    AggregateMetrics, AggregatedMetric, BuildingStatus, DeviceLocation, DeviceState, FloorStatus,
    GraphAnalytics, ImpactReason, ImpactReport, ImpactedEntity, RoomStatus, StatusSummary,
};
pub use config::EngineConfig;
pub use entities::EntityStore;
pub use metrics::{
    Aggregation, DeviceStatus, MetricSnapshot, MetricsSource, NoMetrics, PropertyMetrics,
    StaticMetrics,
};
pub use relationships::RelationshipStore;
pub use snapshot::{GraphSnapshot, ImportSummary, SNAPSHOT_VERSION};
pub use traversal::GraphTraversal;

use girder_storage::StorageBackend;
use std::sync::Arc;

/// All engine components wired to one storage handle
#[derive(Clone)]
pub struct GraphEngine {
    storage: Arc<dyn StorageBackend>,
    config: Arc<EngineConfig>,
    entities: EntityStore,
    relationships: RelationshipStore,
    traversal: GraphTraversal,
    analytics: GraphAnalytics,
}

impl GraphEngine {
    /// Engine without a metrics supplier
    pub fn new(storage: Arc<dyn StorageBackend>, config: EngineConfig) -> Self {
        let config = Arc::new(config);
        let traversal = GraphTraversal::new(storage.clone(), config.clone());
        let analytics = GraphAnalytics::new(
            storage.clone(),
            traversal.clone(),
            Arc::new(NoMetrics),
            config.clone(),
        );

        Self {
            entities: EntityStore::new(storage.clone(), config.clone()),
            relationships: RelationshipStore::new(storage.clone()),
            traversal,
            analytics,
            storage,
            config,
        }
    }

    /// Use `metrics` for aggregate metrics and device status
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSource>) -> Self {
        self.analytics = GraphAnalytics::new(
            self.storage.clone(),
            self.traversal.clone(),
            metrics,
            self.config.clone(),
        );
        self
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn entities(&self) -> &EntityStore {
        &self.entities
    }

    pub fn relationships(&self) -> &RelationshipStore {
        &self.relationships
    }

    pub fn traversal(&self) -> &GraphTraversal {
        &self.traversal
    }

    pub fn analytics(&self) -> &GraphAnalytics {
        &self.analytics
    }
}
