//! Portable JSON snapshots of a whole graph

use crate::GraphEngine;
use chrono::{DateTime, Utc};
use girder_core::{Entity, EntityFilter, Error, ErrorKind, Property, Relationship, Result};
use serde::{Deserialize, Serialize};

/// Snapshot format version written by [`GraphEngine::export_snapshot`]
pub const SNAPSHOT_VERSION: u32 = 1;

/// Every entity, relationship and property, ids and timestamps included
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub properties: Vec<Property>,
}

/// What an import did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub entities: usize,
    pub relationships: usize,
    pub properties: usize,
    /// Relationships skipped because the triple already existed
    pub skipped_relationships: usize,
}

impl GraphEngine {
    pub async fn export_snapshot(&self) -> Result<GraphSnapshot> {
        let topology = self.analytics().get_topology(None).await?;

        let mut properties = Vec::new();
        for entity in &topology.nodes {
            properties.extend(self.storage().get_properties(&entity.id).await?);
        }

        tracing::info!(
            "Exported {} entities, {} relationships, {} properties",
            topology.nodes.len(),
            topology.edges.len(),
            properties.len()
        );

        Ok(GraphSnapshot {
            version: SNAPSHOT_VERSION,
            exported_at: Utc::now(),
            entities: topology.nodes,
            relationships: topology.edges,
            properties,
        })
    }

    /// Replay a snapshot into this graph
    ///
    /// Without `merge` the graph must be empty. With `merge`, entities and
    /// properties are upserted by id and relationships whose triple already
    /// exists are skipped.
    pub async fn import_snapshot(&self, snapshot: &GraphSnapshot, merge: bool) -> Result<ImportSummary> {
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(Error::Validation(format!(
                "Unsupported snapshot version {} (newest known is {})",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }

        if !merge {
            let existing = self
                .storage()
                .scan_entities(&EntityFilter::new().with_limit(1))
                .await?;
            if !existing.is_empty() {
                return Err(Error::Conflict(
                    "Graph already has entities. Use merge to add to existing data.".to_string(),
                ));
            }
        }

        let mut summary = ImportSummary::default();

        for entity in &snapshot.entities {
            self.entities().restore_entity(entity).await?;
            summary.entities += 1;
        }

        for relationship in &snapshot.relationships {
            match self.relationships().restore_relationship(relationship).await {
                Ok(()) => summary.relationships += 1,
                Err(e) if merge && e.kind() == ErrorKind::Conflict => {
                    tracing::debug!(id = %relationship.id, "Skipping existing relationship");
                    summary.skipped_relationships += 1;
                }
                Err(e) => return Err(e),
            }
        }

        for property in &snapshot.properties {
            self.entities().restore_property(property).await?;
            summary.properties += 1;
        }

        tracing::info!(
            "Imported {} entities, {} relationships ({} skipped), {} properties",
            summary.entities,
            summary.relationships,
            summary.skipped_relationships,
            summary.properties
        );
        Ok(summary)
    }
}
