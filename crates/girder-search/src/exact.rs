//! Exact search engine - case-insensitive exact, prefix and substring matching

use async_trait::async_trait;

use crate::traits::{Result, SearchEngine, SearchHit};
use girder_core::{Entity, SearchQuery};

pub const RANK_EXACT: u8 = 0;
pub const RANK_PREFIX: u8 = 1;
pub const RANK_SUBSTRING: u8 = 2;

/// Simple exact substring search engine (stateless)
pub struct ExactSearchEngine;

impl ExactSearchEngine {
    pub fn new() -> Self {
        Self
    }

    fn rank(name: &str, needle: &str) -> Option<u8> {
        let name = name.to_lowercase();
        if name == needle {
            Some(RANK_EXACT)
        } else if name.starts_with(needle) {
            Some(RANK_PREFIX)
        } else if name.contains(needle) {
            Some(RANK_SUBSTRING)
        } else {
            None
        }
    }
}

impl Default for ExactSearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchEngine for ExactSearchEngine {
    async fn search(&self, query: &SearchQuery, entities: &[Entity]) -> Result<Vec<SearchHit>> {
        let needle = query.text.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<SearchHit> = entities
            .iter()
            .filter(|entity| query.accepts_type(entity))
            .filter_map(|entity| {
                Self::rank(&entity.name, &needle).map(|rank| SearchHit {
                    entity: entity.clone(),
                    rank,
                    score: 0,
                })
            })
            .collect();

        // Shorter names are closer matches within a rank
        hits.sort_by(|a, b| {
            a.rank
                .cmp(&b.rank)
                .then(a.entity.name.len().cmp(&b.entity.name.len()))
                .then_with(|| a.entity.name.cmp(&b.entity.name))
                .then(a.entity.id.cmp(&b.entity.id))
        });

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.entity.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_exact_search_ranking() {
        let search = ExactSearchEngine::new();
        let entities = vec![
            Entity::new("room", "Server Room Annex"),
            Entity::new("room", "Main Server Room"),
            Entity::new("room", "server room"),
            Entity::new("room", "Lobby"),
        ];

        let query = SearchQuery::new("Server Room");
        let hits = search.search(&query, &entities).await.unwrap();

        assert_eq!(
            names(&hits),
            vec!["server room", "Server Room Annex", "Main Server Room"]
        );
        assert_eq!(hits[0].rank, RANK_EXACT);
        assert_eq!(hits[1].rank, RANK_PREFIX);
        assert_eq!(hits[2].rank, RANK_SUBSTRING);
    }

    #[tokio::test]
    async fn test_exact_search_by_type() {
        let search = ExactSearchEngine::new();
        let entities = vec![
            Entity::new("device", "Lobby Sensor"),
            Entity::new("room", "Lobby"),
        ];

        let query = SearchQuery::new("lobby").with_entity_type("device");
        let hits = search.search(&query, &entities).await.unwrap();

        assert_eq!(names(&hits), vec!["Lobby Sensor"]);
    }

    #[tokio::test]
    async fn test_empty_search() {
        let search = ExactSearchEngine::new();
        let entities = vec![Entity::new("room", "Lobby")];

        let hits = search.search(&SearchQuery::new("  "), &entities).await.unwrap();
        assert!(hits.is_empty());

        let hits = search.search(&SearchQuery::new("x"), &[]).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_limit_applies_to_entities() {
        let search = ExactSearchEngine::new();
        let entities: Vec<Entity> = (0..5)
            .map(|i| Entity::new("device", format!("Sensor {}", i)))
            .collect();

        let query = SearchQuery::new("sensor").with_limit(2);
        let found = search.search_entities(&query, &entities).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "Sensor 0");
    }
}
