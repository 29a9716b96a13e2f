//! Hybrid search: exact-engine hits first, then fuzzy hits

use async_trait::async_trait;
use std::collections::HashSet;

use crate::exact::ExactSearchEngine;
#[cfg(feature = "fuzzy")]
use crate::fuzzy::FuzzySearchEngine;
use crate::traits::{Result, SearchEngine, SearchError, SearchHit};
use girder_core::{Entity, SearchMode, SearchQuery};

/// Dispatches on `SearchQuery::mode`
pub struct HybridSearchEngine {
    exact: ExactSearchEngine,
    #[cfg(feature = "fuzzy")]
    fuzzy: FuzzySearchEngine,
}

impl HybridSearchEngine {
    pub fn new() -> Self {
        Self {
            exact: ExactSearchEngine::new(),
            #[cfg(feature = "fuzzy")]
            fuzzy: FuzzySearchEngine::new(),
        }
    }

    #[cfg(feature = "fuzzy")]
    async fn fuzzy_hits(&self, query: &SearchQuery, entities: &[Entity]) -> Result<Vec<SearchHit>> {
        self.fuzzy.search(query, entities).await
    }

    #[cfg(not(feature = "fuzzy"))]
    async fn fuzzy_hits(&self, _query: &SearchQuery, _entities: &[Entity]) -> Result<Vec<SearchHit>> {
        Err(SearchError::UnsupportedMode(
            "fuzzy search requires the `fuzzy` feature".to_string(),
        ))
    }
}

impl Default for HybridSearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchEngine for HybridSearchEngine {
    async fn search(&self, query: &SearchQuery, entities: &[Entity]) -> Result<Vec<SearchHit>> {
        match query.mode {
            SearchMode::Exact => self.exact.search(query, entities).await,
            SearchMode::Fuzzy => self.fuzzy_hits(query, entities).await,
            SearchMode::Hybrid => {
                let exact_hits = self.exact.search(query, entities).await?;
                let fuzzy_hits = match self.fuzzy_hits(query, entities).await {
                    Ok(hits) => hits,
                    Err(SearchError::UnsupportedMode(_)) => Vec::new(),
                    Err(e) => return Err(e),
                };

                // Merge and deduplicate by id
                let mut seen = HashSet::new();
                let mut combined = Vec::with_capacity(exact_hits.len() + fuzzy_hits.len());
                for hit in exact_hits.into_iter().chain(fuzzy_hits) {
                    if seen.insert(hit.entity.id) {
                        combined.push(hit);
                    }
                }

                Ok(combined)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hybrid_search_orders_exact_before_fuzzy() {
        let engine = HybridSearchEngine::new();
        let entities = vec![
            Entity::new("device", "Main Pump Controller"),
            Entity::new("device", "Pump"),
            Entity::new("device", "Pressure Unit Monitor Panel"),
        ];

        let hits = engine
            .search(&SearchQuery::new("pump"), &entities)
            .await
            .unwrap();
        let names: Vec<&str> = hits.iter().map(|h| h.entity.name.as_str()).collect();

        assert_eq!(&names[..2], &["Pump", "Main Pump Controller"]);
        let unique: HashSet<_> = hits.iter().map(|h| h.entity.id).collect();
        assert_eq!(unique.len(), hits.len());
    }

    #[tokio::test]
    async fn test_exact_mode_skips_fuzzy() {
        let engine = HybridSearchEngine::new();
        let entities = vec![Entity::new("device", "Thermostat")];

        let query = SearchQuery::new("thrm").with_mode(SearchMode::Exact);
        assert!(engine.search(&query, &entities).await.unwrap().is_empty());
    }
}
