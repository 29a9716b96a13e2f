//! Girder Storage - Storage backends for the entity-relationship graph
//!
//! This crate provides the `StorageBackend` trait and its memory, ReDB and
//! SQLite implementations. Each backend performs the unique-triple insert and
//! the cascading entity delete atomically.

#![allow(clippy::result_large_err)]

pub mod error;
pub mod migration;
pub mod traits;

#[cfg(feature = "redb")]
pub mod redb;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub mod memory;

pub use error::{StorageError, StorageResult};
pub use migration::{Migratable, SchemaVersion, CURRENT_VERSION};
pub use traits::StorageBackend;

#[cfg(feature = "redb")]
pub use redb::RedbStorage;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;

pub use memory::MemoryStorage;
