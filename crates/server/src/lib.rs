//! Service host for the fulfillment core.
//!
//! Wires the core onto a document store, keeps the expiry sweeper running
//! and exposes health and Prometheus endpoints.

pub mod config;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use document_store::DocumentStore;
use fulfillment::{FulfillmentCore, InMemoryAddressBook, InMemoryStoreDirectory, TracingNotifier};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;

/// Shared state handed to the routes.
pub struct AppState<S: DocumentStore> {
    pub core: FulfillmentCore<S>,
    /// Name of the storage backend, reported by `/health`.
    pub backend: &'static str,
}

/// Creates the Axum application router.
pub fn create_app<S: DocumentStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds the fulfillment core with the in-process directories and a
/// notifier that writes pushes to the log.
pub fn create_core<S: DocumentStore + Clone + 'static>(
    store: S,
    config: &Config,
) -> FulfillmentCore<S> {
    FulfillmentCore::new(
        store,
        Arc::new(InMemoryAddressBook::new()),
        Arc::new(InMemoryStoreDirectory::new()),
        Arc::new(TracingNotifier),
        config.fulfillment.clone(),
    )
}

/// Creates the default application state on top of `store`.
pub fn create_default_state<S: DocumentStore + Clone + 'static>(
    store: S,
    backend: &'static str,
    config: &Config,
) -> Arc<AppState<S>> {
    Arc::new(AppState {
        core: create_core(store, config),
        backend,
    })
}
