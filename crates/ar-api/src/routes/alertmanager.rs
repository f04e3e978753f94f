//! Alertmanager receiver testing, status and configuration endpoints.

use ar_core::{AlertmanagerConfiguration, StatusSnapshot, TestReceiversResult};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::dto::{ReloadResponse, TestReceiversBody};
use crate::error::ApiError;
use crate::state::AppState;

/// Creates the `/api/alertmanager` routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/receivers/test", post(test_receivers))
        .route("/status", get(get_status))
        .route("/config", get(get_config).post(post_config))
}

/// Sends a test notification through every config of the requested receivers.
///
/// The response status is 400 if any config is invalid, otherwise 408 if any
/// timed out, otherwise 500 if any failed, otherwise 200.
#[instrument(skip_all)]
async fn test_receivers(
    State(state): State<AppState>,
    body: Result<Json<TestReceiversBody>, JsonRejection>,
) -> Result<(StatusCode, Json<TestReceiversResult>), ApiError> {
    let Json(body) = body.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Receiver test request rejected");
        ApiError::from(rejection)
    })?;
    let request = body.into_request()?;
    if state.shutdown.is_cancelled() {
        return Err(ApiError::ServiceUnavailable(
            "server is shutting down".to_string(),
        ));
    }

    let result = state
        .tester
        .test_receivers(request, state.shutdown.child_token())
        .await?;

    let status = StatusCode::from_u16(result.status_code())
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok((status, Json(result)))
}

async fn get_status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.status.get_status().await)
}

/// Returns the active configuration with secure settings redacted.
async fn get_config(State(state): State<AppState>) -> Json<AlertmanagerConfiguration> {
    Json(state.store.snapshot().await.redacted())
}

/// Replaces the active configuration.
///
/// Takes the raw body so that parse errors are reported like validation errors.
#[instrument(skip_all)]
async fn post_config(
    State(state): State<AppState>,
    body: String,
) -> Result<(StatusCode, Json<ReloadResponse>), ApiError> {
    let outcome = state.store.reload_json(&body).await.map_err(|e| {
        warn!(error = %e, "Configuration rejected");
        ApiError::from(e)
    })?;

    info!(
        revision = outcome.revision.version,
        changed = outcome.changed,
        "Configuration accepted"
    );
    Ok((StatusCode::ACCEPTED, Json(ReloadResponse::from(outcome))))
}
