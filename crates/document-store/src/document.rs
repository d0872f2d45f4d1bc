use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::AggregateId;

/// Version number of a stored document, used for optimistic concurrency control.
///
/// A document that has never been written is at version 0. The first insert
/// stores version 1 and every successful replace increments it by 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the version of a document that has not been stored yet.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the version a document has right after insert.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// A stored entity together with its storage metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Collection the document lives in (e.g. "orders", "products").
    pub collection: String,

    /// Key of the document inside its collection.
    pub id: AggregateId,

    /// Version of the stored body.
    pub version: Version,

    /// The entity itself as JSON.
    pub body: serde_json::Value,

    /// When the document was first inserted.
    pub created_at: DateTime<Utc>,

    /// When the document was last written.
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Creates an unsaved document from a raw JSON body.
    pub fn new(collection: impl Into<String>, id: AggregateId, body: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            collection: collection.into(),
            id,
            version: Version::initial(),
            body,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates an unsaved document by serializing an entity.
    pub fn from_state<T: Serialize>(
        collection: impl Into<String>,
        id: AggregateId,
        state: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(collection, id, serde_json::to_value(state)?))
    }

    /// Replaces the body with a newly serialized entity, keeping the metadata.
    pub fn with_state<T: Serialize>(mut self, state: &T) -> Result<Self, serde_json::Error> {
        self.body = serde_json::to_value(state)?;
        Ok(self)
    }

    /// Deserializes the body into an entity.
    pub fn to_state<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.body.clone())
    }

    /// Returns a top-level field of the body, if present.
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.body.get(name)
    }
}
