use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateId, Document, DocumentQuery, DocumentStoreError, Result, Version,
    store::DocumentStore,
};

const COLUMNS: &str = "collection, id, version, body, created_at, updated_at";

/// PostgreSQL-backed document store.
///
/// Documents live in a single `documents` table keyed by `(collection, id)`.
/// Conditional writes are single `UPDATE … WHERE version = $expected`
/// statements, so the row lock taken by the update serializes racing writers.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_document(row: PgRow) -> Result<Document> {
        Ok(Document {
            collection: row.try_get("collection")?,
            id: AggregateId::from_uuid(row.try_get::<Uuid, _>("id")?),
            version: Version::new(row.try_get("version")?),
            body: row.try_get("body")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        })
    }

    async fn current_version(&self, collection: &str, id: AggregateId) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT version FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        Ok(version.map(Version::new))
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn insert(&self, document: Document) -> Result<Document> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO documents (collection, id, version, body, created_at, updated_at)
            VALUES ($1, $2, 1, $3, $4, $4)
            ON CONFLICT (collection, id) DO NOTHING
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&document.collection)
        .bind(document.id.as_uuid())
        .bind(&document.body)
        .bind(document.created_at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_document(row),
            None => Err(DocumentStoreError::AlreadyExists {
                collection: document.collection,
                id: document.id,
            }),
        }
    }

    async fn get(&self, collection: &str, id: AggregateId) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM documents WHERE collection = $1 AND id = $2"
        ))
        .bind(collection)
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_document).transpose()
    }

    async fn replace(&self, document: Document, expected: Version) -> Result<Document> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE documents
            SET body = $1, version = version + 1, updated_at = NOW()
            WHERE collection = $2 AND id = $3 AND version = $4
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&document.body)
        .bind(&document.collection)
        .bind(document.id.as_uuid())
        .bind(expected.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Self::row_to_document(row);
        }

        tracing::debug!(
            collection = %document.collection,
            id = ?document.id,
            expected = ?expected,
            "conditional replace did not match"
        );
        match self.current_version(&document.collection, document.id).await? {
            Some(actual) => Err(DocumentStoreError::ConcurrencyConflict {
                collection: document.collection,
                id: document.id,
                expected,
                actual,
            }),
            None => Err(DocumentStoreError::NotFound {
                collection: document.collection,
                id: document.id,
            }),
        }
    }

    async fn delete(
        &self,
        collection: &str,
        id: AggregateId,
        expected: Option<Version>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM documents
            WHERE collection = $1 AND id = $2 AND ($3::BIGINT IS NULL OR version = $3)
            "#,
        )
        .bind(collection)
        .bind(id.as_uuid())
        .bind(expected.map(|v| v.as_i64()))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        match (expected, self.current_version(collection, id).await?) {
            (Some(expected), Some(actual)) => Err(DocumentStoreError::ConcurrencyConflict {
                collection: collection.to_string(),
                id,
                expected,
                actual,
            }),
            _ => Ok(false),
        }
    }

    async fn find(&self, query: DocumentQuery) -> Result<Vec<Document>> {
        let mut sql = format!("SELECT {COLUMNS} FROM documents WHERE collection = $1");
        let mut param_count = 1;

        if !query.fields.is_empty() {
            param_count += 1;
            sql.push_str(&format!(" AND body @> ${param_count}"));
        }
        if query.created_before.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at < ${param_count}"));
        }
        if query.updated_before.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND updated_at < ${param_count}"));
        }

        sql.push_str(" ORDER BY created_at ASC, id ASC");

        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = query.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        let mut q = sqlx::query(&sql).bind(&query.collection);

        if !query.fields.is_empty() {
            q = q.bind(query.fields_object());
        }
        if let Some(before) = query.created_before {
            q = q.bind(before);
        }
        if let Some(before) = query.updated_before {
            q = q.bind(before);
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_document).collect()
    }
}
