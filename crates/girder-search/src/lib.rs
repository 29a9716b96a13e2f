//! Girder Search - Name search engines for the entity graph
//!
//! Provides exact/prefix/substring search, fuzzy search (nucleo) and a
//! hybrid engine that ranks exact hits ahead of fuzzy ones.

pub mod error;
pub mod exact;
pub mod hybrid;
pub mod traits;

#[cfg(feature = "fuzzy")]
pub mod fuzzy;

pub use error::{SearchError, SearchResult};
pub use exact::ExactSearchEngine;
pub use hybrid::HybridSearchEngine;
pub use traits::{SearchEngine, SearchHit};

#[cfg(feature = "fuzzy")]
pub use fuzzy::FuzzySearchEngine;
