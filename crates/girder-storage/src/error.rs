//! Storage error types

use thiserror::Error;

/// Result type alias for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Storage-specific error types
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Duplicate relationship: {source_id} -[{relationship_type}]-> {target_id}")]
    DuplicateRelationship {
        source_id: String,
        target_id: String,
        relationship_type: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[cfg(feature = "redb")]
    #[error("ReDB error: {0}")]
    Redb(#[from] ::redb::Error),

    #[cfg(feature = "redb")]
    #[error("ReDB database error: {0}")]
    RedbDatabase(#[from] ::redb::DatabaseError),

    #[cfg(feature = "redb")]
    #[error("ReDB table error: {0}")]
    RedbTable(#[from] ::redb::TableError),

    #[cfg(feature = "redb")]
    #[error("ReDB storage error: {0}")]
    RedbStorage(#[from] ::redb::StorageError),

    #[cfg(feature = "redb")]
    #[error("ReDB commit error: {0}")]
    RedbCommit(#[from] ::redb::CommitError),

    #[cfg(feature = "redb")]
    #[error("ReDB transaction error: {0}")]
    RedbTransaction(#[from] ::redb::TransactionError),

    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] ::rusqlite::Error),
}

impl StorageError {
    pub(crate) fn lock<E: std::fmt::Display>(err: E) -> Self {
        Self::Database(format!("Lock error: {}", err))
    }

    pub(crate) fn duplicate(relationship: &girder_core::Relationship) -> Self {
        Self::DuplicateRelationship {
            source_id: relationship.source_id.to_string(),
            target_id: relationship.target_id.to_string(),
            relationship_type: relationship.relationship_type.to_string(),
        }
    }
}

/// Classify storage failures into engine errors
///
/// Duplicate triples become `Conflict`, missing endpoints `EntityNotFound`;
/// everything else is reported unchanged as `Storage`.
impl From<StorageError> for girder_core::Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::EntityNotFound(id) => girder_core::Error::EntityNotFound(id),
            dup @ StorageError::DuplicateRelationship { .. } => {
                girder_core::Error::Conflict(dup.to_string())
            }
            other => girder_core::Error::Storage(other.to_string()),
        }
    }
}
