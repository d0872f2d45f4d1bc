use chrono::{DateTime, Utc};

/// Builder for filtering documents inside one collection.
///
/// Field filters compare top-level body fields for equality. Results are
/// ordered by creation time, oldest first.
#[derive(Debug, Clone, Default)]
pub struct DocumentQuery {
    /// Collection to search.
    pub collection: String,

    /// Top-level body fields that must equal the given JSON values.
    pub fields: Vec<(String, serde_json::Value)>,

    /// Only documents inserted strictly before this instant.
    pub created_before: Option<DateTime<Utc>>,

    /// Only documents last written strictly before this instant.
    pub updated_before: Option<DateTime<Utc>>,

    /// Maximum number of documents to return.
    pub limit: Option<usize>,

    /// Number of documents to skip.
    pub offset: Option<usize>,
}

impl DocumentQuery {
    /// Creates a query matching every document of a collection.
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Default::default()
        }
    }

    /// Requires a top-level body field to equal `value`.
    pub fn field_eq(mut self, field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.push((field.into(), value.into()));
        self
    }

    /// Keeps documents inserted before `instant`.
    pub fn created_before(mut self, instant: DateTime<Utc>) -> Self {
        self.created_before = Some(instant);
        self
    }

    /// Keeps documents last written before `instant`.
    pub fn updated_before(mut self, instant: DateTime<Utc>) -> Self {
        self.updated_before = Some(instant);
        self
    }

    /// Limits the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips the first `offset` results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns the field filters as one JSON object, the shape used for
    /// containment matching.
    pub fn fields_object(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self.fields.iter().cloned().collect();
        serde_json::Value::Object(map)
    }

    /// Returns true if `body` satisfies every field filter.
    pub fn matches_fields(&self, body: &serde_json::Value) -> bool {
        self.fields
            .iter()
            .all(|(field, expected)| body.get(field) == Some(expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_matches_everything() {
        let query = DocumentQuery::collection("orders");
        assert!(query.matches_fields(&serde_json::json!({"status": "pending"})));
    }

    #[test]
    fn field_filters_are_conjunctive() {
        let query = DocumentQuery::collection("orders")
            .field_eq("status", "ready")
            .field_eq("agent", serde_json::Value::Null);

        assert!(query.matches_fields(&serde_json::json!({"status": "ready", "agent": null})));
        assert!(!query.matches_fields(&serde_json::json!({"status": "ready", "agent": "a"})));
        assert!(!query.matches_fields(&serde_json::json!({"status": "ready"})));
    }

    #[test]
    fn fields_object_collects_filters() {
        let query = DocumentQuery::collection("orders")
            .field_eq("status", "cancelled")
            .limit(10);
        assert_eq!(
            query.fields_object(),
            serde_json::json!({"status": "cancelled"})
        );
        assert_eq!(query.limit, Some(10));
    }
}
