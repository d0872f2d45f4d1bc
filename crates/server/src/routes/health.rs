//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use document_store::DocumentStore;
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub backend: &'static str,
    /// Status topics currently tracked by the broadcaster.
    pub live_topics: usize,
}

/// GET /health: returns system health status.
pub async fn check<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        backend: state.backend,
        live_topics: state.core.broadcaster().topic_count(),
    })
}
