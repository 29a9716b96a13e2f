//! Search error types

use thiserror::Error;

/// Result type alias for search operations
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Search-specific error types
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Query error: {0}")]
    Query(String),

    #[error("Unsupported search mode: {0}")]
    UnsupportedMode(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SearchError> for girder_core::Error {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Query(msg) | SearchError::UnsupportedMode(msg) => {
                girder_core::Error::Validation(msg)
            }
            other => girder_core::Error::Storage(other.to_string()),
        }
    }
}
