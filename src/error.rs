use thiserror::Error;
use uuid::Uuid;

use crate::domain::order::{OrderEvent, OrderStatus};

/// Errors surfaced by the `Store` trait.
///
/// `Conflict` covers unique-key violations (used to detect idempotency-key
/// races); `Transient` covers retryable infrastructure failures the outbox
/// dispatcher backs off and retries rather than dead-lettering immediately.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("unique constraint violated")]
    Conflict,

    #[error("entity not found")]
    NotFound,

    #[error("transient database error: {0}")]
    Transient(#[from] sqlx::Error),
}

impl StoreError {
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some("23505") {
                return StoreError::Conflict;
            }
        }
        if matches!(err, sqlx::Error::RowNotFound) {
            return StoreError::NotFound;
        }
        StoreError::Transient(err)
    }
}

/// Errors from `StockReserver::reserve`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReservationError {
    #[error("products not found: {ids:?}")]
    ProductsMissing { ids: Vec<Uuid> },

    #[error("product {id} is not active")]
    ProductInactive { id: Uuid },

    #[error("insufficient stock for product {id}: requested {requested}, available {available}")]
    InsufficientStock {
        id: Uuid,
        requested: i32,
        available: i32,
    },
}

/// Errors from `OrderWriter::create`.
#[derive(Error, Debug)]
pub enum OrderCreationError {
    #[error("idempotency key conflict: different payload for same key")]
    IdempotencyConflict,

    #[error(transparent)]
    Reservation(#[from] ReservationError),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("referenced order not found")]
    NotFound,

    #[error(transparent)]
    Transient(#[from] StoreError),
}

/// Illegal state transition rejected by `OrderStateMachine::transition`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("illegal transition from {from:?} on {event:?}")]
pub struct IllegalTransition {
    pub from: OrderStatus,
    pub event: OrderEvent,
}

/// Errors from `PaymentCoordinator::process_callback`.
#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("order not found")]
    NotFound,

    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),

    #[error(transparent)]
    Transient(#[from] StoreError),
}

/// Errors from explicit order cancellation.
#[derive(Error, Debug)]
pub enum CancelError {
    #[error("order not found")]
    NotFound,

    #[error("order is in a terminal state")]
    Terminal,

    #[error(transparent)]
    Transient(#[from] StoreError),
}
