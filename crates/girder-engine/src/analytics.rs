//! Graph analytics built on top of traversal

use crate::config::EngineConfig;
use crate::metrics::{Aggregation, DeviceStatus, MetricsSource};
use crate::traversal::GraphTraversal;
use girder_core::{
    Entity, EntityFilter, EntityId, EntityType, Error, GraphStatistics, RelationshipFilter, Result,
    Topology,
};
use girder_storage::StorageBackend;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Why an entity shows up in an impact report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactReason {
    /// Inside the source through CONTAINS
    Contained,
    /// Depends on the source through DEPENDS_ON
    Dependent,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactedEntity {
    pub entity: Entity,
    pub reason: ImpactReason,
    /// Smallest hop distance over both walks
    pub depth: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactReport {
    pub source: Entity,
    pub impacted: Vec<ImpactedEntity>,
}

impl ImpactReport {
    pub fn contains(&self, id: &EntityId) -> bool {
        self.impacted.iter().any(|i| i.entity.id == *id)
    }
}

/// Online/offline rollup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
    pub unknown: usize,
}

impl StatusSummary {
    pub fn record(&mut self, status: DeviceStatus) {
        self.total += 1;
        match status {
            DeviceStatus::Online => self.online += 1,
            DeviceStatus::Offline => self.offline += 1,
            DeviceStatus::Unknown => self.unknown += 1,
        }
    }

    pub fn merge(&mut self, other: &StatusSummary) {
        self.total += other.total;
        self.online += other.online;
        self.offline += other.offline;
        self.unknown += other.unknown;
    }
}

/// One metric combined over a subtree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetric {
    pub aggregation: Aggregation,
    pub value: f64,
    pub samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub entity_id: EntityId,
    /// Root plus every CONTAINS descendant
    pub entity_count: usize,
    pub devices: StatusSummary,
    pub metrics: BTreeMap<String, AggregatedMetric>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub device: Entity,
    pub status: DeviceStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomStatus {
    pub room: Entity,
    pub devices: Vec<DeviceState>,
    pub summary: StatusSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorStatus {
    pub floor: Entity,
    pub rooms: Vec<RoomStatus>,
    /// Devices contained by the floor itself rather than a room
    pub devices: Vec<DeviceState>,
    pub summary: StatusSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingStatus {
    pub building: Entity,
    pub floors: Vec<FloorStatus>,
    /// Rooms contained by the building without a floor in between
    #[serde(default)]
    pub rooms: Vec<RoomStatus>,
    pub summary: StatusSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceLocation {
    pub device: Entity,
    /// Containers from the outermost (nearest building) down to the direct parent
    pub path: Vec<Entity>,
    pub building: Option<Entity>,
    pub floor: Option<Entity>,
    pub room: Option<Entity>,
    pub zone: Option<Entity>,
}

impl DeviceLocation {
    /// Container names joined outermost first, e.g. `HQ / L1 / 101`
    pub fn display_path(&self) -> String {
        self.path
            .iter()
            .map(|e| e.name.as_str())
            .collect::<Vec<_>>()
            .join(" / ")
    }
}

/// Higher level queries over the graph
#[derive(Clone)]
pub struct GraphAnalytics {
    storage: Arc<dyn StorageBackend>,
    traversal: GraphTraversal,
    metrics: Arc<dyn MetricsSource>,
    config: Arc<EngineConfig>,
}

impl GraphAnalytics {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        traversal: GraphTraversal,
        metrics: Arc<dyn MetricsSource>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            storage,
            traversal,
            metrics,
            config,
        }
    }

    async fn device_state(&self, device: Entity) -> Result<DeviceState> {
        let snapshot = self.metrics.snapshot(&device).await?;
        let status = DeviceStatus::resolve(&device, snapshot.as_ref());
        Ok(DeviceState { device, status })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Whole-graph views
    // ─────────────────────────────────────────────────────────────────────────

    /// Nodes and edges, optionally restricted to one entity type
    pub async fn get_topology(&self, entity_type: Option<&str>) -> Result<Topology> {
        let mut filter = EntityFilter::all();
        if let Some(entity_type) = entity_type {
            filter = filter.with_type(entity_type);
        }
        let nodes = self.storage.scan_entities(&filter).await?;
        let edges = self
            .storage
            .scan_relationships(&RelationshipFilter::all())
            .await?;

        let topology = Topology::new()
            .with_nodes(nodes)
            .with_edges(edges)
            .prune_dangling_edges();
        tracing::debug!(
            "Topology has {} nodes and {} edges",
            topology.nodes.len(),
            topology.edges.len()
        );
        Ok(topology)
    }

    pub async fn get_statistics(&self) -> Result<GraphStatistics> {
        let entities = self.storage.scan_entities(&EntityFilter::all()).await?;
        let relationships = self
            .storage
            .scan_relationships(&RelationshipFilter::all())
            .await?;

        let mut stats = GraphStatistics {
            total_entities: entities.len(),
            total_relationships: relationships.len(),
            ..Default::default()
        };
        for entity in &entities {
            *stats
                .entities_by_type
                .entry(entity.entity_type.0.clone())
                .or_insert(0) += 1;
        }
        for relationship in &relationships {
            *stats
                .relationships_by_type
                .entry(relationship.relationship_type.to_string())
                .or_insert(0) += 1;
        }
        Ok(stats)
    }

    /// Entities with no relationship in either direction
    pub async fn find_orphaned_entities(&self) -> Result<Vec<Entity>> {
        let entities = self.storage.scan_entities(&EntityFilter::all()).await?;
        let relationships = self
            .storage
            .scan_relationships(&RelationshipFilter::all())
            .await?;

        let connected: HashSet<EntityId> = relationships
            .iter()
            .flat_map(|r| [r.source_id, r.target_id])
            .collect();
        Ok(entities
            .into_iter()
            .filter(|e| !connected.contains(&e.id))
            .collect())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Subtree analysis
    // ─────────────────────────────────────────────────────────────────────────

    /// Everything affected if `id` fails: its contents and its dependents
    pub async fn analyze_impact(&self, id: &EntityId) -> Result<ImpactReport> {
        let source = self.traversal.require(id).await?;
        let ceiling = self.config.ceiling();

        let contained = self.traversal.get_descendants(id, ceiling).await?;
        let dependents = self.traversal.get_dependents(id, ceiling).await?;

        let mut index: HashMap<EntityId, usize> = HashMap::new();
        let mut impacted: Vec<ImpactedEntity> = Vec::new();
        for item in contained {
            index.insert(item.entity.id, impacted.len());
            impacted.push(ImpactedEntity {
                entity: item.entity,
                reason: ImpactReason::Contained,
                depth: item.depth,
            });
        }
        for item in dependents {
            match index.get(&item.entity.id) {
                Some(&pos) => {
                    let existing = &mut impacted[pos];
                    existing.reason = ImpactReason::Both;
                    existing.depth = existing.depth.min(item.depth);
                }
                None => {
                    index.insert(item.entity.id, impacted.len());
                    impacted.push(ImpactedEntity {
                        entity: item.entity,
                        reason: ImpactReason::Dependent,
                        depth: item.depth,
                    });
                }
            }
        }
        impacted.sort_by_key(|i| i.depth);

        tracing::debug!("Impact of {} reaches {} entities", id, impacted.len());
        Ok(ImpactReport { source, impacted })
    }

    /// Counts and supplier metrics over `id` and its CONTAINS descendants
    pub async fn get_aggregate_metrics(&self, id: &EntityId) -> Result<AggregateMetrics> {
        let root = self.traversal.require(id).await?;
        let descendants = self
            .traversal
            .get_descendants(id, self.config.ceiling())
            .await?;

        let subtree: Vec<Entity> = std::iter::once(root)
            .chain(descendants.into_iter().map(|d| d.entity))
            .collect();

        let mut devices = StatusSummary::default();
        let mut samples: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        let mut skipped: HashSet<String> = HashSet::new();

        for entity in &subtree {
            let snapshot = self.metrics.snapshot(entity).await?;
            if entity.is_type(EntityType::DEVICE) {
                devices.record(DeviceStatus::resolve(entity, snapshot.as_ref()));
            }
            let Some(snapshot) = snapshot else {
                continue;
            };
            for (name, value) in snapshot.values {
                if self.config.aggregations.contains_key(&name) {
                    samples.entry(name).or_default().push(value);
                } else if skipped.insert(name.clone()) {
                    tracing::debug!(metric = %name, "Skipping metric without a declared aggregation");
                }
            }
        }

        let metrics = samples
            .into_iter()
            .filter_map(|(name, values)| {
                let aggregation = *self.config.aggregations.get(&name)?;
                let value = aggregation.apply(&values)?;
                Some((
                    name,
                    AggregatedMetric {
                        aggregation,
                        value,
                        samples: values.len(),
                    },
                ))
            })
            .collect();

        Ok(AggregateMetrics {
            entity_id: *id,
            entity_count: subtree.len(),
            devices,
            metrics,
        })
    }

    /// Floors, rooms and devices of a building with status rollups
    pub async fn get_building_status(&self, id: &EntityId) -> Result<BuildingStatus> {
        let building = self.traversal.require(id).await?;
        if !building.is_type(EntityType::BUILDING) {
            return Err(Error::InvalidType {
                id: id.to_string(),
                expected: EntityType::BUILDING.to_string(),
                actual: building.entity_type.to_string(),
            });
        }

        let mut floors = Vec::new();
        let mut rooms = Vec::new();
        let mut summary = StatusSummary::default();

        for child in self.traversal.children_of(id).await? {
            if child.is_type(EntityType::ROOM) {
                let room = self.room_status(child).await?;
                summary.merge(&room.summary);
                rooms.push(room);
                continue;
            }
            if !child.is_type(EntityType::FLOOR) {
                continue;
            }

            let mut floor_rooms = Vec::new();
            let mut floor_devices = Vec::new();
            let mut floor_summary = StatusSummary::default();

            for inner in self.traversal.children_of(&child.id).await? {
                if inner.is_type(EntityType::ROOM) {
                    let room = self.room_status(inner).await?;
                    floor_summary.merge(&room.summary);
                    floor_rooms.push(room);
                } else if inner.is_type(EntityType::DEVICE) {
                    let state = self.device_state(inner).await?;
                    floor_summary.record(state.status);
                    floor_devices.push(state);
                }
            }

            summary.merge(&floor_summary);
            floors.push(FloorStatus {
                floor: child,
                rooms: floor_rooms,
                devices: floor_devices,
                summary: floor_summary,
            });
        }

        Ok(BuildingStatus {
            building,
            floors,
            rooms,
            summary,
        })
    }

    async fn room_status(&self, room: Entity) -> Result<RoomStatus> {
        let mut devices = Vec::new();
        let mut summary = StatusSummary::default();
        for device in self.traversal.children_of(&room.id).await? {
            if !device.is_type(EntityType::DEVICE) {
                continue;
            }
            let state = self.device_state(device).await?;
            summary.record(state.status);
            devices.push(state);
        }
        Ok(RoomStatus {
            room,
            devices,
            summary,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Devices
    // ─────────────────────────────────────────────────────────────────────────

    /// Container chain of every device, following earliest parents
    pub async fn get_device_locations(&self) -> Result<Vec<DeviceLocation>> {
        let devices = self
            .storage
            .scan_entities(&EntityFilter::all().with_type(EntityType::DEVICE))
            .await?;
        let ceiling = self.config.ceiling() as usize;

        let mut locations = Vec::with_capacity(devices.len());
        for device in devices {
            let mut chain: Vec<Entity> = Vec::new();
            let mut seen: HashSet<EntityId> = HashSet::from([device.id]);
            let mut current = device.id;

            while chain.len() < ceiling {
                let Some(parent) = self.traversal.parent_of(&current).await? else {
                    break;
                };
                if !seen.insert(parent.id) {
                    break;
                }
                current = parent.id;
                let is_building = parent.is_type(EntityType::BUILDING);
                chain.push(parent);
                if is_building {
                    break;
                }
            }

            let nearest = |entity_type: &str| chain.iter().find(|e| e.is_type(entity_type)).cloned();
            let building = nearest(EntityType::BUILDING);
            let floor = nearest(EntityType::FLOOR);
            let room = nearest(EntityType::ROOM);
            let zone = nearest(EntityType::ZONE);

            chain.reverse();
            locations.push(DeviceLocation {
                device,
                path: chain,
                building,
                floor,
                room,
                zone,
            });
        }

        Ok(locations)
    }

    /// Other devices sharing the immediate container of the device
    pub async fn find_correlated_devices(&self, device_uuid: &str) -> Result<Vec<Entity>> {
        let filter = EntityFilter::all()
            .with_type(EntityType::DEVICE)
            .with_device_uuid(device_uuid);
        let device = self
            .storage
            .scan_entities(&filter)
            .await?
            .pop()
            .ok_or_else(|| Error::EntityNotFound(format!("device_uuid {}", device_uuid)))?;

        let Some(parent) = self.traversal.parent_of(&device.id).await? else {
            return Ok(Vec::new());
        };

        Ok(self
            .traversal
            .children_of(&parent.id)
            .await?
            .into_iter()
            .filter(|e| e.id != device.id && e.is_type(EntityType::DEVICE))
            .collect())
    }
}
