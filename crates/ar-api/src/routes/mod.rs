//! API routes.

pub mod alertmanager;
pub mod health;
pub mod metrics;

use crate::error::ApiError;
use crate::state::AppState;
use axum::{http::Uri, Router};

/// Creates the main API router.
///
/// Health is served both under `/api/alertmanager` and at the root, where
/// load balancer probes expect it.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api/alertmanager",
            alertmanager::routes().merge(health::routes()),
        )
        .merge(health::routes())
        .merge(metrics::routes())
        .fallback(not_found)
        .with_state(state)
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("no route for {}", uri.path()))
}
