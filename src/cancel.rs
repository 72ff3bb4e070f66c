//! Explicit order cancellation (`POST /orders/{id}/cancel`).

use uuid::Uuid;

use crate::domain::{Order, OrderEvent};
use crate::error::{CancelError, StoreError};
use crate::reservation::restore;
use crate::state_machine::{restores_stock, transition};
use crate::store::PostgresStore;

pub async fn cancel(store: &PostgresStore, order_id: Uuid) -> Result<Order, CancelError> {
    let mut tx = store.begin().await.map_err(CancelError::Transient)?;

    let mut order = store
        .get_order_for_update(&mut tx, order_id)
        .await
        .map_err(CancelError::Transient)?
        .ok_or(CancelError::NotFound)?;

    if order.status.is_terminal() {
        return Err(CancelError::Terminal);
    }

    let next = transition(order.status, OrderEvent::Cancel)
        .expect("cancel is legal from every non-terminal status");

    if restores_stock(order.status, OrderEvent::Cancel) {
        restore(store, &mut tx, &order.items)
            .await
            .map_err(CancelError::Transient)?;
    }

    store
        .update_order_status(&mut tx, order.id, next)
        .await
        .map_err(CancelError::Transient)?;
    tx.commit().await.map_err(StoreError::from_sqlx)?;

    order.status = next;
    Ok(order)
}
