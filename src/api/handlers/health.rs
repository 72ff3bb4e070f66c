use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::api::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Serialize)]
struct HealthResponse {
    status: HealthStatus,
    database_connected: bool,
}

/// `GET /health` — liveness/readiness probe, grounded on the teacher's
/// `services/health.rs` and `original_source/app/routers/observability.py`.
pub async fn health(State(state): State<AppState>) -> Response {
    let database_connected = sqlx::query("SELECT 1")
        .fetch_one(state.store.pool())
        .await
        .is_ok();

    let status = if database_connected {
        HealthStatus::Healthy
    } else {
        HealthStatus::Unhealthy
    };

    let code = if database_connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(HealthResponse {
            status,
            database_connected,
        }),
    )
        .into_response()
}
