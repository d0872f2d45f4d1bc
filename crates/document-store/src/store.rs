use async_trait::async_trait;

use crate::{AggregateId, Document, DocumentQuery, Result, Version};

/// Core trait for document store implementations.
///
/// All implementations must be thread-safe (Send + Sync) and must make
/// [`replace`](DocumentStore::replace) and [`delete`](DocumentStore::delete)
/// atomic with respect to the version check: two writers holding the same
/// version can never both succeed.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a new document at [`Version::first`].
    ///
    /// Fails with `AlreadyExists` if the key is taken. The stored document,
    /// with its assigned version, is returned.
    async fn insert(&self, document: Document) -> Result<Document>;

    /// Fetches a document by key.
    async fn get(&self, collection: &str, id: AggregateId) -> Result<Option<Document>>;

    /// Overwrites a document's body if its stored version is still `expected`.
    ///
    /// Fails with `ConcurrencyConflict` if another writer got there first and
    /// with `NotFound` if the document has been deleted.
    async fn replace(&self, document: Document, expected: Version) -> Result<Document>;

    /// Deletes a document, optionally only if it is still at `expected`.
    ///
    /// Returns whether a document was removed.
    async fn delete(
        &self,
        collection: &str,
        id: AggregateId,
        expected: Option<Version>,
    ) -> Result<bool>;

    /// Returns the documents matching a query.
    async fn find(&self, query: DocumentQuery) -> Result<Vec<Document>>;
}

/// Extension trait providing convenience methods for document stores.
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Checks if a document exists.
    async fn exists(&self, collection: &str, id: AggregateId) -> Result<bool> {
        Ok(self.get(collection, id).await?.is_some())
    }

    /// Counts the documents matching a query.
    async fn count(&self, query: DocumentQuery) -> Result<usize> {
        Ok(self.find(query).await?.len())
    }
}

// Blanket implementation for all DocumentStore implementations
impl<T: DocumentStore + ?Sized> DocumentStoreExt for T {}
