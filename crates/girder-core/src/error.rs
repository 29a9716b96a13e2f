//! Error types for Girder Core

use crate::limits::ValidationError;
use thiserror::Error;

/// Result type alias using Girder's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Girder error types
///
/// Every public engine operation fails with one of these variants. The
/// boundary layer maps them to transport status codes through [`Error::kind`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Relationship not found: {0}")]
    RelationshipNotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid entity type for {id}: expected {expected}, got {actual}")]
    InvalidType {
        id: String,
        expected: String,
        actual: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Coarse error classification exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    InvalidType,
    Storage,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::EntityNotFound(_) | Self::RelationshipNotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::InvalidType { .. } => ErrorKind::InvalidType,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(format!("serialization: {}", err))
    }
}
