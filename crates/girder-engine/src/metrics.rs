//! Metrics suppliers and aggregation functions
//!
//! The engine never produces telemetry itself. A [`MetricsSource`] hands out
//! a per-entity snapshot and the analytics layer aggregates what it is given.

use async_trait::async_trait;
use girder_core::{Entity, EntityId, Result, Value};
use girder_storage::StorageBackend;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

/// Property key prefix read by [`PropertyMetrics`]
pub const METRIC_PROPERTY_PREFIX: &str = "metric.";

/// Property key holding the online flag for [`PropertyMetrics`]
pub const ONLINE_PROPERTY: &str = "online";

/// How values of one metric are combined across a subtree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    #[serde(alias = "avg", alias = "mean")]
    Average,
    Min,
    Max,
}

impl Aggregation {
    /// Combine values; `None` when there is nothing to combine
    pub fn apply(self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let result = match self {
            Self::Sum => values.iter().sum(),
            Self::Average => values.iter().sum::<f64>() / values.len() as f64,
            Self::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        };
        Some(result)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Average => "average",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

impl std::str::FromStr for Aggregation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sum" => Ok(Self::Sum),
            "average" | "avg" | "mean" => Ok(Self::Average),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            other => Err(format!("unknown aggregation: {}", other)),
        }
    }
}

impl std::fmt::Display for Aggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Telemetry for one entity at one point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,

    #[serde(default)]
    pub values: BTreeMap<String, f64>,
}

impl MetricSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_online(mut self, online: bool) -> Self {
        self.online = Some(online);
        self
    }

    pub fn with_value(mut self, name: impl Into<String>, value: f64) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.online.is_none() && self.values.is_empty()
    }
}

/// Online state of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
    Unknown,
}

impl DeviceStatus {
    /// Snapshot flag first, then the `status` metadata field
    pub fn resolve(entity: &Entity, snapshot: Option<&MetricSnapshot>) -> Self {
        if let Some(online) = snapshot.and_then(|s| s.online) {
            return if online { Self::Online } else { Self::Offline };
        }
        match entity
            .metadata
            .get("status")
            .and_then(Value::as_str)
            .map(str::to_lowercase)
            .as_deref()
        {
            Some("online") => Self::Online,
            Some("offline") => Self::Offline,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supplier of per-entity telemetry
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Latest snapshot for `entity`, if the supplier knows it
    async fn snapshot(&self, entity: &Entity) -> Result<Option<MetricSnapshot>>;
}

/// Supplier that knows nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMetrics;

#[async_trait]
impl MetricsSource for NoMetrics {
    async fn snapshot(&self, _entity: &Entity) -> Result<Option<MetricSnapshot>> {
        Ok(None)
    }
}

/// In-memory snapshots keyed by entity id
#[derive(Default)]
pub struct StaticMetrics {
    snapshots: RwLock<HashMap<EntityId, MetricSnapshot>>,
}

impl StaticMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`StaticMetrics::insert`]
    ///
    /// Owning `self` means no reader can hold the lock, so a poisoned map is
    /// taken over as-is instead of losing the snapshot.
    pub fn with(mut self, id: EntityId, snapshot: MetricSnapshot) -> Self {
        self.snapshots
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, snapshot);
        self
    }

    pub fn insert(&self, id: EntityId, snapshot: MetricSnapshot) -> Result<()> {
        let mut snapshots = self.snapshots.write().map_err(|e| {
            girder_core::Error::Storage(format!("Lock error: {}", e))
        })?;
        snapshots.insert(id, snapshot);
        Ok(())
    }
}

#[async_trait]
impl MetricsSource for StaticMetrics {
    async fn snapshot(&self, entity: &Entity) -> Result<Option<MetricSnapshot>> {
        let snapshots = self.snapshots.read().map_err(|e| {
            girder_core::Error::Storage(format!("Lock error: {}", e))
        })?;
        Ok(snapshots.get(&entity.id).cloned())
    }
}

/// Reads telemetry stored as entity properties
///
/// Numeric `metric.<name>` properties become metric values and a boolean
/// `online` property becomes the online flag.
pub struct PropertyMetrics {
    storage: Arc<dyn StorageBackend>,
}

impl PropertyMetrics {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl MetricsSource for PropertyMetrics {
    async fn snapshot(&self, entity: &Entity) -> Result<Option<MetricSnapshot>> {
        let properties = self.storage.get_properties(&entity.id).await?;

        let mut snapshot = MetricSnapshot::new();
        for property in properties {
            if property.key == ONLINE_PROPERTY {
                snapshot.online = property.value.as_bool();
            } else if let Some(name) = property.key.strip_prefix(METRIC_PROPERTY_PREFIX) {
                if let Some(value) = property.value.as_f64() {
                    snapshot.values.insert(name.to_string(), value);
                }
            }
        }

        Ok((!snapshot.is_empty()).then_some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use girder_core::Property;
    use girder_storage::MemoryStorage;

    #[test]
    fn test_aggregations() {
        let values = [2.0, 4.0, 9.0];
        assert_eq!(Aggregation::Sum.apply(&values), Some(15.0));
        assert_eq!(Aggregation::Average.apply(&values), Some(5.0));
        assert_eq!(Aggregation::Min.apply(&values), Some(2.0));
        assert_eq!(Aggregation::Max.apply(&values), Some(9.0));
        assert_eq!(Aggregation::Sum.apply(&[]), None);
        assert_eq!("AVG".parse::<Aggregation>(), Ok(Aggregation::Average));
    }

    #[test]
    fn test_status_resolution() {
        let device = Entity::new("device", "Probe").with_metadata("status", "Offline");
        assert_eq!(DeviceStatus::resolve(&device, None), DeviceStatus::Offline);

        let snapshot = MetricSnapshot::new().with_online(true);
        assert_eq!(
            DeviceStatus::resolve(&device, Some(&snapshot)),
            DeviceStatus::Online
        );

        let bare = Entity::new("device", "Probe");
        let values_only = MetricSnapshot::new().with_value("temperature", 20.0);
        assert_eq!(
            DeviceStatus::resolve(&bare, Some(&values_only)),
            DeviceStatus::Unknown
        );
    }

    #[tokio::test]
    async fn test_static_metrics() {
        let device = Entity::new("device", "Probe");
        let source = StaticMetrics::new().with(
            device.id,
            MetricSnapshot::new().with_value("temperature", 21.5),
        );

        let snapshot = source.snapshot(&device).await.unwrap().unwrap();
        assert_eq!(snapshot.values.get("temperature"), Some(&21.5));

        let other = Entity::new("device", "Other");
        assert!(source.snapshot(&other).await.unwrap().is_none());
    }

    #[test]
    fn test_static_metrics_builder_survives_poison() {
        let device = Entity::new("device", "Probe");
        let source = StaticMetrics::new();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = source.snapshots.write().unwrap();
            panic!("writer died holding the lock");
        }));
        assert!(source.snapshots.is_poisoned());

        let mut source = source.with(device.id, MetricSnapshot::new().with_online(true));
        let snapshots = source
            .snapshots
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        assert_eq!(snapshots.get(&device.id).and_then(|s| s.online), Some(true));
    }

    #[tokio::test]
    async fn test_property_metrics() {
        let storage = Arc::new(MemoryStorage::new());
        let device = Entity::new("device", "Probe");
        storage.put_entity(&device).await.unwrap();
        for property in [
            Property::new(device.id, "metric.power", 120.0),
            Property::new(device.id, "metric.label", "not a number"),
            Property::new(device.id, "online", false),
            Property::new(device.id, "firmware", "1.2"),
        ] {
            storage.upsert_property(&property).await.unwrap();
        }

        let source = PropertyMetrics::new(storage.clone());
        let snapshot = source.snapshot(&device).await.unwrap().unwrap();
        assert_eq!(snapshot.online, Some(false));
        assert_eq!(snapshot.values.len(), 1);
        assert_eq!(snapshot.values.get("power"), Some(&120.0));

        let quiet = Entity::new("device", "Quiet");
        storage.put_entity(&quiet).await.unwrap();
        assert!(source.snapshot(&quiet).await.unwrap().is_none());
    }
}
