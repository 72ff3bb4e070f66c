use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::Engine;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::domain::Product;

const ADMIN_SECRET_HEADER: &str = "x-admin-secret";
const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

fn ensure_admin_authorized(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    let provided = headers
        .get(ADMIN_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if provided == state.config.admin_secret && !provided.is_empty() {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "admin authorization failed").into_response())
    }
}

/// Opaque pagination cursor: base64 of the `created_at` RFC3339 timestamp
/// of the last row on the previous page.
fn encode_cursor(ts: DateTime<Utc>) -> String {
    base64::engine::general_purpose::STANDARD.encode(ts.to_rfc3339())
}

fn decode_cursor(raw: &str) -> Option<DateTime<Utc>> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(raw).ok()?;
    let s = String::from_utf8(bytes).ok()?;
    DateTime::parse_from_rfc3339(&s).ok().map(|dt| dt.with_timezone(&Utc))
}

#[derive(Debug, Deserialize)]
pub struct ListProductsQuery {
    pub q: Option<String>,
    pub is_active: Option<bool>,
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct ListProductsResponse {
    pub items: Vec<Product>,
    pub next_cursor: Option<String>,
}

/// `GET /products` — cursor-paginated, newest first.
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListProductsQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let cursor = query.cursor.as_deref().and_then(decode_cursor);

    match state
        .store
        .list_products(query.q.as_deref(), query.is_active, cursor, limit)
        .await
    {
        Ok(items) => {
            let next_cursor = items.last().map(|p| encode_cursor(p.created_at));
            Json(ListProductsResponse { items, next_cursor }).into_response()
        }
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateProductBody {
    pub name: String,
    pub price: Decimal,
    pub stock: i32,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
}

fn default_is_active() -> bool {
    true
}

/// `POST /products` — admin collaborator, gated on `X-Admin-Secret`.
pub async fn create_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateProductBody>,
) -> Response {
    if let Err(resp) = ensure_admin_authorized(&state, &headers) {
        return resp;
    }

    if body.name.trim().is_empty() || body.stock < 0 {
        return (
            StatusCode::BAD_REQUEST,
            "name must be non-empty and stock must be >= 0",
        )
            .into_response();
    }

    match state
        .store
        .insert_product(body.name.trim(), body.price, body.stock, body.is_active)
        .await
    {
        Ok(product) => (StatusCode::CREATED, Json(product)).into_response(),
        Err(e) => e.into_response(),
    }
}
