//! Idempotent order creation: the single commit that deduplicates client
//! retries, reserves stock, persists the order, and enqueues the
//! `order.created` outbox event.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Order, OrderStatus, OutboxEvent, OutboxEventKind, OutboxStatus};
use crate::error::{OrderCreationError, StoreError};
use crate::hashing::{request_hash, HashableLine};
use crate::reservation::{reserve, ReservationLine};
use crate::store::PostgresStore;

/// One requested line in a create-order call.
#[derive(Debug, Clone)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub user_email: String,
    pub items: Vec<OrderItemRequest>,
}

#[derive(Serialize)]
struct OutboxItemPayload {
    product_id: String,
    quantity: i32,
    price: String,
}

#[derive(Serialize)]
struct OrderCreatedPayload {
    order_id: String,
    total: String,
    items: Vec<OutboxItemPayload>,
}

/// `create(request, idempotency_key) -> (order, is_duplicate)` per the
/// idempotent-creation algorithm: lookup, reserve, persist, bind key,
/// enqueue outbox, commit — with a re-lookup-and-resolve path when a
/// concurrent writer wins the idempotency-key insert race.
pub async fn create(
    store: &PostgresStore,
    request: CreateOrderRequest,
    idempotency_key: &str,
) -> Result<(Order, bool), OrderCreationError> {
    validate(&request)?;

    let lines: Vec<HashableLine> = request
        .items
        .iter()
        .map(|i| HashableLine {
            product_id: i.product_id,
            quantity: i.quantity,
        })
        .collect();
    let hash = request_hash(&request.user_email, &lines);

    if let Some(existing) = store
        .lookup_idempotency_key(idempotency_key)
        .await
        .map_err(OrderCreationError::Transient)?
    {
        if existing.request_hash != hash {
            return Err(OrderCreationError::IdempotencyConflict);
        }
        let order = store
            .get_order(existing.order_id)
            .await
            .map_err(OrderCreationError::Transient)?
            .ok_or(OrderCreationError::NotFound)?;
        return Ok((order, true));
    }

    let order_id = Uuid::new_v4();
    let reservation_lines: Vec<ReservationLine> = request
        .items
        .iter()
        .map(|i| ReservationLine {
            product_id: i.product_id,
            quantity: i.quantity,
        })
        .collect();

    let mut tx = store.begin().await.map_err(OrderCreationError::Transient)?;

    let (items_total, items) = reserve(store, &mut tx, order_id, &reservation_lines)
        .await
        .map_err(OrderCreationError::from)?;

    let now = Utc::now();
    let order = Order {
        id: order_id,
        user_email: request.user_email.clone(),
        status: OrderStatus::Reserved,
        items_total,
        items,
        created_at: now,
        updated_at: now,
    };

    store
        .insert_order(&mut tx, &order)
        .await
        .map_err(OrderCreationError::Transient)?;
    store
        .insert_order_items(&mut tx, &order.items)
        .await
        .map_err(OrderCreationError::Transient)?;

    match store
        .bind_idempotency_key(&mut tx, idempotency_key, &hash, order.id)
        .await
    {
        Ok(()) => {}
        Err(StoreError::Conflict) => {
            // Rollback by dropping the transaction; re-lookup to resolve.
            drop(tx);
            let winner = store
                .lookup_idempotency_key(idempotency_key)
                .await
                .map_err(OrderCreationError::Transient)?
                .ok_or(OrderCreationError::IdempotencyConflict)?;
            if winner.request_hash != hash {
                return Err(OrderCreationError::IdempotencyConflict);
            }
            let order = store
                .get_order(winner.order_id)
                .await
                .map_err(OrderCreationError::Transient)?
                .ok_or(OrderCreationError::NotFound)?;
            return Ok((order, true));
        }
        Err(other) => return Err(OrderCreationError::Transient(other)),
    }

    let payload = OrderCreatedPayload {
        order_id: order.id.to_string(),
        total: order.items_total.to_string(),
        items: order
            .items
            .iter()
            .map(|i| OutboxItemPayload {
                product_id: i.product_id.to_string(),
                quantity: i.quantity,
                price: i.price_snapshot.to_string(),
            })
            .collect(),
    };
    let payload_bytes =
        serde_json::to_vec(&payload).expect("order.created payload is always serializable");

    let event = OutboxEvent {
        id: Uuid::new_v4(),
        event_type: OutboxEventKind::ORDER_CREATED.to_string(),
        payload: payload_bytes,
        status: OutboxStatus::Pending,
        attempts: 0,
        next_attempt_at: now,
        created_at: now,
    };
    store
        .insert_outbox_event(&mut tx, &event)
        .await
        .map_err(OrderCreationError::Transient)?;

    tx.commit().await.map_err(StoreError::from_sqlx)?;

    Ok((order, false))
}

fn validate(request: &CreateOrderRequest) -> Result<(), OrderCreationError> {
    if request.items.is_empty() {
        return Err(OrderCreationError::Validation(
            "items must contain at least one line".to_string(),
        ));
    }
    if !request.user_email.contains('@') {
        return Err(OrderCreationError::Validation(
            "user_email must be a valid email address".to_string(),
        ));
    }
    for item in &request.items {
        if item.quantity <= 0 {
            return Err(OrderCreationError::Validation(format!(
                "quantity must be > 0 for product {}",
                item.product_id
            )));
        }
    }
    Ok(())
}
