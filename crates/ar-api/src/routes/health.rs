//! Health check endpoint.

use axum::{extract::State, routing::get, Json, Router};

use crate::dto::HealthResponse;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let revision = state.store.revision().await;

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.status.version_info().version.clone(),
        uptime_seconds: state.status.uptime().as_secs(),
        config_revision: revision.version,
    })
}
