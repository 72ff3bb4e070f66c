use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};

use crate::api::state::AppState;

/// `GET /metrics` — Prometheus text-exposition endpoint, grounded on
/// `original_source/app/routers/observability.py::metrics`.
pub async fn metrics(State(state): State<AppState>) -> Response {
    let (content_type, body) = state.metrics.encode();
    ([(CONTENT_TYPE, content_type)], body).into_response()
}
