//! Storage collaborator for the fulfillment core.
//!
//! Entities are persisted as versioned JSON documents. Every mutation goes
//! through [`DocumentStore::replace`], which only succeeds when the caller
//! still holds the latest version: the compare-and-swap primitive the rest of
//! the system builds its atomic find-and-update operations on.

pub mod document;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use common::AggregateId;
pub use document::{Document, Version};
pub use error::{DocumentStoreError, Result};
pub use memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use query::DocumentQuery;
pub use store::{DocumentStore, DocumentStoreExt};
