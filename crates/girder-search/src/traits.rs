//! Search engine traits

use async_trait::async_trait;
use girder_core::{Entity, SearchQuery};

pub use crate::error::{SearchError, SearchResult as Result};

/// A ranked search result
///
/// Lower `rank` sorts first; `score` is only meaningful within one engine.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub entity: Entity,
    pub rank: u8,
    pub score: u32,
}

/// Trait for search engines
///
/// Engines are stateless: callers pass the candidate entities on every call.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Rank the candidates against the query, best hit first
    async fn search(&self, query: &SearchQuery, entities: &[Entity]) -> Result<Vec<SearchHit>>;

    /// Search and return only the entities, truncated to the query limit
    async fn search_entities(
        &self,
        query: &SearchQuery,
        entities: &[Entity],
    ) -> Result<Vec<Entity>> {
        let hits = self.search(query, entities).await?;
        Ok(hits
            .into_iter()
            .take(query.limit)
            .map(|hit| hit.entity)
            .collect())
    }
}
