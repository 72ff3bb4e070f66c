use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::state::AppState;
use crate::domain::OrderStatus;
use crate::payment::{process_callback, PaymentOutcome};
use crate::webhook::verify_signature;

const SIGNATURE_HEADER: &str = "x-payment-signature";

#[derive(Debug, Deserialize)]
pub struct PaymentCallbackBody {
    #[allow(dead_code)]
    pub payment_id: String,
    pub order_id: Uuid,
    pub status: PaymentOutcome,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

/// `POST /payments/callback`
///
/// Signature verification happens here, ahead of `process_callback`, per
/// spec: it is the HTTP collaborator's job, not the payment coordinator's.
pub async fn payment_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let Some(signature) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        return bad_request("missing signature header");
    };

    if verify_signature(&state.config.payment_webhook_secret, &body, signature).is_err() {
        return bad_request("invalid signature");
    }

    let payload: PaymentCallbackBody = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => return bad_request(format!("malformed body: {e}")),
    };

    match process_callback(
        &state.store,
        &payload.payment_id,
        payload.order_id,
        payload.status,
    )
    .await
    {
        Ok((order, transitioned)) => {
            if transitioned {
                match order.status {
                    OrderStatus::Paid => state.metrics.inc_orders_paid(),
                    OrderStatus::Canceled => state.metrics.inc_orders_canceled(),
                    _ => {}
                }
            }
            Json(order).into_response()
        }
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct FakePaymentRequestBody {
    #[allow(dead_code)]
    pub order_id: Uuid,
    #[allow(dead_code)]
    pub amount: Decimal,
}

#[derive(Serialize)]
pub struct FakePaymentResponseBody {
    pub payment_id: String,
    pub status: &'static str,
}

/// `POST /_fake_payments` — test-only collaborator standing in for a real
/// payment provider's "create payment" endpoint.
pub async fn create_fake_payment(Json(_body): Json<FakePaymentRequestBody>) -> Response {
    Json(FakePaymentResponseBody {
        payment_id: Uuid::new_v4().to_string(),
        status: "pending",
    })
    .into_response()
}
