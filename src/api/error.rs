//! Error → HTTP status mapping (spec §7): each domain error enum grows an
//! `IntoResponse` impl here rather than leaking `StatusCode` choices into
//! the handlers themselves.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::{CancelError, OrderCreationError, PaymentError, ReservationError, StoreError};
use crate::webhook::WebhookError;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn respond(status: StatusCode, message: impl ToString) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

impl IntoResponse for OrderCreationError {
    fn into_response(self) -> Response {
        match self {
            OrderCreationError::IdempotencyConflict => {
                respond(StatusCode::CONFLICT, self)
            }
            OrderCreationError::Reservation(ReservationError::InsufficientStock { .. }) => {
                respond(StatusCode::CONFLICT, self)
            }
            OrderCreationError::Reservation(_) | OrderCreationError::Validation(_) => {
                respond(StatusCode::BAD_REQUEST, self)
            }
            OrderCreationError::NotFound => respond(StatusCode::NOT_FOUND, self),
            OrderCreationError::Transient(e) => e.into_response(),
        }
    }
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        match self {
            PaymentError::NotFound => respond(StatusCode::NOT_FOUND, self),
            PaymentError::IllegalTransition(_) => respond(StatusCode::CONFLICT, self),
            PaymentError::Transient(e) => e.into_response(),
        }
    }
}

impl IntoResponse for CancelError {
    fn into_response(self) -> Response {
        match self {
            CancelError::NotFound => respond(StatusCode::NOT_FOUND, self),
            CancelError::Terminal => respond(StatusCode::CONFLICT, self),
            CancelError::Transient(e) => e.into_response(),
        }
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        match self {
            StoreError::NotFound => respond(StatusCode::NOT_FOUND, self),
            StoreError::Conflict => respond(StatusCode::CONFLICT, self),
            StoreError::Transient(_) => respond(StatusCode::SERVICE_UNAVAILABLE, self),
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        respond(StatusCode::BAD_REQUEST, self)
    }
}
