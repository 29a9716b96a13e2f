//! Fuzzy search using nucleo

use async_trait::async_trait;
use nucleo_matcher::{
    pattern::{AtomKind, CaseMatching, Normalization, Pattern},
    Config, Matcher, Utf32Str,
};

use crate::error::SearchResult;
use crate::traits::{SearchEngine, SearchHit};
use girder_core::{Entity, SearchQuery};

/// Rank assigned to fuzzy hits, after every exact-engine rank
pub const RANK_FUZZY: u8 = 3;

/// Stateless fuzzy search engine using nucleo
pub struct FuzzySearchEngine {
    /// Minimum nucleo score a hit needs
    pub min_score: u32,
}

impl FuzzySearchEngine {
    pub fn new() -> Self {
        Self { min_score: 0 }
    }

    pub fn with_min_score(mut self, min_score: u32) -> Self {
        self.min_score = min_score;
        self
    }

    fn score_entity(entity: &Entity, pattern: &Pattern, matcher: &mut Matcher) -> Option<u32> {
        let mut buf = Vec::new();
        pattern.score(Utf32Str::new(&entity.name, &mut buf), matcher)
    }
}

impl Default for FuzzySearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchEngine for FuzzySearchEngine {
    async fn search(&self, query: &SearchQuery, entities: &[Entity]) -> SearchResult<Vec<SearchHit>> {
        let text = query.text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let pattern = Pattern::new(
            text,
            CaseMatching::Ignore,
            Normalization::Smart,
            AtomKind::Fuzzy,
        );
        let mut matcher = Matcher::new(Config::DEFAULT);

        let mut hits: Vec<SearchHit> = entities
            .iter()
            .filter(|e| query.accepts_type(e))
            .filter_map(|e| {
                Self::score_entity(e, &pattern, &mut matcher)
                    .filter(|score| *score >= self.min_score)
                    .map(|score| SearchHit {
                        entity: e.clone(),
                        rank: RANK_FUZZY,
                        score,
                    })
            })
            .collect();

        // Sort by score descending
        hits.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.entity.name.cmp(&b.entity.name))
                .then(a.entity.id.cmp(&b.entity.id))
        });

        tracing::trace!(text, hits = hits.len(), "fuzzy search");
        Ok(hits)
    }
}
