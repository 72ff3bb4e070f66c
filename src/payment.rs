//! Payment callback processing: drives the order state machine to `paid`
//! or to `canceled` + stock restoration, idempotently.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Order, OrderEvent};
use crate::error::{PaymentError, StoreError};
use crate::reservation::restore;
use crate::state_machine::{restores_stock, transition};
use crate::store::PostgresStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    Success,
    Failed,
}

impl From<PaymentOutcome> for OrderEvent {
    fn from(outcome: PaymentOutcome) -> Self {
        match outcome {
            PaymentOutcome::Success => OrderEvent::PaymentSucceeded,
            PaymentOutcome::Failed => OrderEvent::PaymentFailed,
        }
    }
}

/// Processes one payment-result callback. A callback against a terminal
/// order (`paid` or `canceled`) is a no-op returning the order unchanged —
/// webhook delivery is at-least-once, so replays must be harmless.
///
/// Returns `(order, transitioned)`, where `transitioned` is `false` for the
/// no-op replay path — callers (e.g. metrics) use it to avoid double-counting
/// a status change that already happened on an earlier delivery.
pub async fn process_callback(
    store: &PostgresStore,
    _payment_id: &str,
    order_id: Uuid,
    outcome: PaymentOutcome,
) -> Result<(Order, bool), PaymentError> {
    let mut tx = store.begin().await.map_err(PaymentError::Transient)?;

    let mut order = store
        .get_order_for_update(&mut tx, order_id)
        .await
        .map_err(PaymentError::Transient)?
        .ok_or(PaymentError::NotFound)?;

    if order.status.is_terminal() {
        return Ok((order, false));
    }

    let event: OrderEvent = outcome.into();
    let next = transition(order.status, event)?;

    if restores_stock(order.status, event) {
        restore(store, &mut tx, &order.items)
            .await
            .map_err(PaymentError::Transient)?;
    }

    store
        .update_order_status(&mut tx, order.id, next)
        .await
        .map_err(PaymentError::Transient)?;
    tx.commit().await.map_err(StoreError::from_sqlx)?;

    order.status = next;
    Ok((order, true))
}
