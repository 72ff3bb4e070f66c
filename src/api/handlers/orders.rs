use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::state::AppState;
use crate::cancel;
use crate::domain::Order;
use crate::order_writer::{self, CreateOrderRequest, OrderItemRequest};

const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

#[derive(Debug, Deserialize)]
pub struct CreateOrderItemBody {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderBody {
    pub user_email: String,
    pub items: Vec<CreateOrderItemBody>,
}

#[derive(Debug, Serialize)]
struct ValidationErrorBody {
    error: String,
}

/// `POST /orders`
pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateOrderBody>,
) -> Response {
    let Some(idempotency_key) = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= 255)
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ValidationErrorBody {
                error: "Idempotency-Key header is required and must be <= 255 chars".to_string(),
            }),
        )
            .into_response();
    };

    if !state.rate_limiter.check(&body.user_email) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ValidationErrorBody {
                error: "rate limit exceeded".to_string(),
            }),
        )
            .into_response();
    }

    let request = CreateOrderRequest {
        user_email: body.user_email,
        items: body
            .items
            .into_iter()
            .map(|i| OrderItemRequest {
                product_id: i.product_id,
                quantity: i.quantity,
            })
            .collect(),
    };

    match order_writer::create(&state.store, request, idempotency_key).await {
        // Replays return 201 too: the client's perspective is "my order was
        // created", whether this call or an earlier one with the same key
        // did the creating. Only a fresh creation counts toward the metric.
        Ok((order, is_duplicate)) => {
            if !is_duplicate {
                state.metrics.inc_orders_created();
            }
            (StatusCode::CREATED, Json(order)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// `GET /orders/{id}`
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, Response> {
    match state.store.get_order(order_id).await {
        Ok(Some(order)) => Ok(Json(order)),
        Ok(None) => Err((StatusCode::NOT_FOUND, "order not found").into_response()),
        Err(e) => Err(e.into_response()),
    }
}

/// `POST /orders/{id}/cancel`
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Response {
    match cancel::cancel(&state.store, order_id).await {
        Ok(order) => {
            state.metrics.inc_orders_canceled();
            Json(order).into_response()
        }
        Err(e) => e.into_response(),
    }
}
