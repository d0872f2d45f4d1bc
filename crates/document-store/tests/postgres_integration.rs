//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container and need a Docker daemon, so
//! they are ignored by default. Run with:
//!
//! ```bash
//! cargo test -p document-store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use document_store::{
    AggregateId, Document, DocumentQuery, DocumentStore, DocumentStoreError, DocumentStoreExt,
    PostgresDocumentStore, Version,
};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_documents_table.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and a cleared table
async fn get_test_store() -> PostgresDocumentStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(8)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE documents")
        .execute(&pool)
        .await
        .unwrap();

    PostgresDocumentStore::new(pool)
}

fn order_document(status: &str) -> Document {
    Document::new(
        "orders",
        AggregateId::new(),
        serde_json::json!({ "status": status, "agent": null }),
    )
}

#[tokio::test]
#[ignore = "requires docker"]
async fn insert_get_and_duplicate_key() {
    let store = get_test_store().await;
    let doc = order_document("pending");

    let stored = store.insert(doc.clone()).await.unwrap();
    assert_eq!(stored.version, Version::first());

    let loaded = store.get("orders", doc.id).await.unwrap().unwrap();
    assert_eq!(loaded.body, doc.body);

    let duplicate = store.insert(doc).await;
    assert!(matches!(
        duplicate,
        Err(DocumentStoreError::AlreadyExists { .. })
    ));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn replace_is_a_compare_and_swap() {
    let store = get_test_store().await;
    let stored = store.insert(order_document("ready")).await.unwrap();

    let mut claimed = stored.clone();
    claimed.body = serde_json::json!({ "status": "delivering", "agent": "a-1" });
    let after = store.replace(claimed, stored.version).await.unwrap();
    assert_eq!(after.version, Version::new(2));

    let stale = store.replace(stored.clone(), stored.version).await;
    assert!(stale.unwrap_err().is_conflict());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires docker"]
async fn racing_replaces_have_one_winner() {
    let store = get_test_store().await;
    let stored = store.insert(order_document("ready")).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        let doc = stored.clone();
        handles.push(tokio::spawn(async move {
            store.replace(doc, Version::first()).await.is_ok()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn find_uses_containment_and_time_filters() {
    let store = get_test_store().await;
    store.insert(order_document("ready")).await.unwrap();
    store.insert(order_document("ready")).await.unwrap();
    store.insert(order_document("pending")).await.unwrap();

    let ready = store
        .find(
            DocumentQuery::collection("orders")
                .field_eq("status", "ready")
                .field_eq("agent", serde_json::Value::Null),
        )
        .await
        .unwrap();
    assert_eq!(ready.len(), 2);

    let old = store
        .count(
            DocumentQuery::collection("orders")
                .created_before(chrono::Utc::now() - chrono::Duration::hours(1)),
        )
        .await
        .unwrap();
    assert_eq!(old, 0);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn conditional_delete() {
    let store = get_test_store().await;
    let stored = store.insert(order_document("cancelled")).await.unwrap();

    let stale = store
        .delete("orders", stored.id, Some(Version::new(9)))
        .await;
    assert!(stale.unwrap_err().is_conflict());

    assert!(
        store
            .delete("orders", stored.id, Some(stored.version))
            .await
            .unwrap()
    );
    assert!(!store.exists("orders", stored.id).await.unwrap());
}
