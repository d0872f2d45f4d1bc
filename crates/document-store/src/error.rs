use thiserror::Error;

use crate::{AggregateId, Version};

/// Errors that can occur when interacting with the document store.
#[derive(Debug, Error)]
pub enum DocumentStoreError {
    /// The document changed since it was read.
    #[error(
        "Concurrency conflict on {collection}/{id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        collection: String,
        id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// The document does not exist.
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: AggregateId },

    /// A document with the same key already exists.
    #[error("Document already exists: {collection}/{id}")]
    AlreadyExists { collection: String, id: AggregateId },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DocumentStoreError {
    /// Returns true if the write lost an optimistic concurrency race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DocumentStoreError::ConcurrencyConflict { .. })
    }

    /// Returns true if the backing store itself is unavailable or broken.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            DocumentStoreError::Database(_) | DocumentStoreError::Migration(_)
        )
    }
}

/// Result type for document store operations.
pub type Result<T> = std::result::Result<T, DocumentStoreError>;
