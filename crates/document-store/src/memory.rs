use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    AggregateId, Document, DocumentQuery, DocumentStoreError, Result, Version,
    store::DocumentStore,
};

type Key = (String, AggregateId);

/// In-memory document store.
///
/// Every write takes the map's write lock, so the version check and the
/// write happen as one step, the same guarantee the PostgreSQL store gets
/// from a conditional `UPDATE`.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<HashMap<Key, Document>>>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of documents stored.
    pub async fn document_count(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Removes every document.
    pub async fn clear(&self) {
        self.documents.write().await.clear();
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(&self, mut document: Document) -> Result<Document> {
        let key = (document.collection.clone(), document.id);
        let mut documents = self.documents.write().await;

        if documents.contains_key(&key) {
            return Err(DocumentStoreError::AlreadyExists {
                collection: document.collection,
                id: document.id,
            });
        }

        document.version = Version::first();
        document.updated_at = document.created_at;
        documents.insert(key, document.clone());
        Ok(document)
    }

    async fn get(&self, collection: &str, id: AggregateId) -> Result<Option<Document>> {
        let documents = self.documents.read().await;
        Ok(documents.get(&(collection.to_string(), id)).cloned())
    }

    async fn replace(&self, mut document: Document, expected: Version) -> Result<Document> {
        let key = (document.collection.clone(), document.id);
        let mut documents = self.documents.write().await;

        let Some(current) = documents.get(&key) else {
            return Err(DocumentStoreError::NotFound {
                collection: document.collection,
                id: document.id,
            });
        };

        if current.version != expected {
            return Err(DocumentStoreError::ConcurrencyConflict {
                collection: document.collection,
                id: document.id,
                expected,
                actual: current.version,
            });
        }

        document.version = current.version.next();
        document.created_at = current.created_at;
        document.updated_at = Utc::now();
        documents.insert(key, document.clone());
        Ok(document)
    }

    async fn delete(
        &self,
        collection: &str,
        id: AggregateId,
        expected: Option<Version>,
    ) -> Result<bool> {
        let key = (collection.to_string(), id);
        let mut documents = self.documents.write().await;

        match documents.get(&key) {
            None => Ok(false),
            Some(current) => {
                if let Some(expected) = expected
                    && current.version != expected
                {
                    return Err(DocumentStoreError::ConcurrencyConflict {
                        collection: collection.to_string(),
                        id,
                        expected,
                        actual: current.version,
                    });
                }
                documents.remove(&key);
                Ok(true)
            }
        }
    }

    async fn find(&self, query: DocumentQuery) -> Result<Vec<Document>> {
        let documents = self.documents.read().await;
        let mut found: Vec<_> = documents
            .values()
            .filter(|doc| {
                if doc.collection != query.collection {
                    return false;
                }
                if let Some(before) = query.created_before
                    && doc.created_at >= before
                {
                    return false;
                }
                if let Some(before) = query.updated_before
                    && doc.updated_at >= before
                {
                    return false;
                }
                query.matches_fields(&doc.body)
            })
            .cloned()
            .collect();

        found.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.id.as_uuid().cmp(&b.id.as_uuid()))
        });

        let offset = query.offset.unwrap_or(0);
        let found = found.into_iter().skip(offset);
        let found = match query.limit {
            Some(limit) => found.take(limit).collect(),
            None => found.collect(),
        };

        Ok(found)
    }
}
