//! Engine configuration

use crate::metrics::Aggregation;
use girder_core::limits::{self, MAX_PAGE_SIZE, MAX_TRAVERSAL_DEPTH};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tunables shared by every engine component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Depth ceiling applied to every traversal (never above 50)
    pub max_depth: u32,

    /// Depth used when a caller does not give one
    pub default_depth: u32,

    /// Default page size for entity listings
    pub list_limit: usize,

    /// Default number of search hits
    pub search_limit: usize,

    /// Aggregation function per metric name
    pub aggregations: BTreeMap<String, Aggregation>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let aggregations = [
            ("temperature", Aggregation::Average),
            ("humidity", Aggregation::Average),
            ("power", Aggregation::Sum),
        ]
        .into_iter()
        .map(|(name, agg)| (name.to_string(), agg))
        .collect();

        Self {
            max_depth: MAX_TRAVERSAL_DEPTH,
            default_depth: 10,
            list_limit: 100,
            search_limit: 20,
            aggregations,
        }
    }
}

impl EngineConfig {
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_aggregation(mut self, metric: impl Into<String>, aggregation: Aggregation) -> Self {
        self.aggregations.insert(metric.into(), aggregation);
        self
    }

    /// Effective ceiling, capped at the hard maximum
    pub fn ceiling(&self) -> u32 {
        self.max_depth.min(MAX_TRAVERSAL_DEPTH)
    }

    /// Clamp a caller depth, substituting the default when absent
    pub fn depth(&self, requested: Option<u32>) -> u32 {
        limits::clamp_depth(requested.unwrap_or(self.default_depth), self.ceiling())
    }

    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.list_limit).min(MAX_PAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_clamping() {
        let config = EngineConfig::default().with_max_depth(80);
        assert_eq!(config.ceiling(), 50);
        assert_eq!(config.depth(None), 10);
        assert_eq!(config.depth(Some(500)), 50);

        let config = EngineConfig::default().with_max_depth(3);
        assert_eq!(config.depth(Some(7)), 3);
        assert_eq!(config.depth(Some(0)), 0);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"max_depth": 5, "aggregations": {"co2": "max"}}"#).unwrap();
        assert_eq!(config.max_depth, 5);
        assert_eq!(config.list_limit, 100);
        assert_eq!(config.aggregations.get("co2"), Some(&Aggregation::Max));
        assert!(!config.aggregations.contains_key("temperature"));
    }
}
