//! Integration tests against a real Postgres instance. Skipped (printing a
//! notice instead of failing) when `DATABASE_URL` is unset, following the
//! teacher's plain `#[tokio::test]` style with no custom harness.

use orders_service::domain::OrderStatus;
use orders_service::order_writer::{self, CreateOrderRequest, OrderItemRequest};
use orders_service::payment::{process_callback, PaymentOutcome};
use orders_service::store::PostgresStore;
use uuid::Uuid;

async fn test_store() -> Option<PostgresStore> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let store = PostgresStore::new(&url, 5).await.expect("connect to test database");
    store.migrate().await.expect("run migrations");
    Some(store)
}

async fn fixture_product(store: &PostgresStore, stock: i32) -> Uuid {
    let product = store
        .insert_product("widget", rust_decimal::Decimal::new(999, 2), stock, true)
        .await
        .expect("insert fixture product");
    product.id
}

fn order_request(user_email: &str, product_id: Uuid, quantity: i32) -> CreateOrderRequest {
    CreateOrderRequest {
        user_email: user_email.to_string(),
        items: vec![OrderItemRequest {
            product_id,
            quantity,
        }],
    }
}

#[tokio::test]
async fn idempotent_replay_returns_same_order() {
    let Some(store) = test_store().await else {
        println!("skipping: DATABASE_URL not set");
        return;
    };

    let product_id = fixture_product(&store, 10).await;
    let key = Uuid::new_v4().to_string();

    let (first, first_dup) = order_writer::create(&store, order_request("a@example.com", product_id, 2), &key)
        .await
        .expect("first create succeeds");
    assert!(!first_dup);

    let (second, second_dup) = order_writer::create(&store, order_request("a@example.com", product_id, 2), &key)
        .await
        .expect("replay succeeds");
    assert!(second_dup);
    assert_eq!(first.id, second.id);
}

#[tokio::test]
async fn idempotency_conflict_on_changed_payload() {
    let Some(store) = test_store().await else {
        println!("skipping: DATABASE_URL not set");
        return;
    };

    let product_id = fixture_product(&store, 10).await;
    let key = Uuid::new_v4().to_string();

    order_writer::create(&store, order_request("a@example.com", product_id, 2), &key)
        .await
        .expect("first create succeeds");

    let err = order_writer::create(&store, order_request("a@example.com", product_id, 3), &key)
        .await
        .expect_err("different payload under same key must conflict");
    assert!(matches!(
        err,
        orders_service::error::OrderCreationError::IdempotencyConflict
    ));
}

#[tokio::test]
async fn insufficient_stock_is_rejected() {
    let Some(store) = test_store().await else {
        println!("skipping: DATABASE_URL not set");
        return;
    };

    let product_id = fixture_product(&store, 1).await;
    let key = Uuid::new_v4().to_string();

    let err = order_writer::create(&store, order_request("a@example.com", product_id, 5), &key)
        .await
        .expect_err("5 against stock of 1 must fail");
    assert!(matches!(
        err,
        orders_service::error::OrderCreationError::Reservation(
            orders_service::error::ReservationError::InsufficientStock { .. }
        )
    ));
}

#[tokio::test]
async fn concurrent_orders_never_oversell_the_last_unit() {
    let Some(store) = test_store().await else {
        println!("skipping: DATABASE_URL not set");
        return;
    };

    let product_id = fixture_product(&store, 1).await;
    let store_a = store.clone();
    let store_b = store.clone();

    let task_a = tokio::spawn(async move {
        order_writer::create(
            &store_a,
            order_request("a@example.com", product_id, 1),
            &Uuid::new_v4().to_string(),
        )
        .await
    });
    let task_b = tokio::spawn(async move {
        order_writer::create(
            &store_b,
            order_request("b@example.com", product_id, 1),
            &Uuid::new_v4().to_string(),
        )
        .await
    });

    let (result_a, result_b) = tokio::join!(task_a, task_b);
    let outcomes = [result_a.unwrap(), result_b.unwrap()];
    let successes = outcomes.iter().filter(|r| r.is_ok()).count();
    let failures = outcomes.iter().filter(|r| r.is_err()).count();

    assert_eq!(successes, 1, "exactly one of the two racers should win the last unit");
    assert_eq!(failures, 1);
}

#[tokio::test]
async fn payment_failure_restores_stock() {
    let Some(store) = test_store().await else {
        println!("skipping: DATABASE_URL not set");
        return;
    };

    let product_id = fixture_product(&store, 5).await;
    let key = Uuid::new_v4().to_string();

    let (order, _) = order_writer::create(&store, order_request("a@example.com", product_id, 3), &key)
        .await
        .expect("create succeeds");
    assert_eq!(order.status, OrderStatus::Reserved);

    let product_after_reserve = store.get_product(product_id).await.unwrap().unwrap();
    assert_eq!(product_after_reserve.stock, 2);

    let (updated, transitioned) = process_callback(&store, "pay_1", order.id, PaymentOutcome::Failed)
        .await
        .expect("callback processes");
    assert_eq!(updated.status, OrderStatus::Canceled);
    assert!(transitioned);

    let product_after_failure = store.get_product(product_id).await.unwrap().unwrap();
    assert_eq!(product_after_failure.stock, 5, "stock must be fully restored");
}

#[tokio::test]
async fn cancel_after_cancel_is_rejected_not_double_restored() {
    let Some(store) = test_store().await else {
        println!("skipping: DATABASE_URL not set");
        return;
    };

    let product_id = fixture_product(&store, 5).await;
    let key = Uuid::new_v4().to_string();

    let (order, _) = order_writer::create(&store, order_request("a@example.com", product_id, 2), &key)
        .await
        .expect("create succeeds");

    let canceled = orders_service::cancel::cancel(&store, order.id)
        .await
        .expect("first cancel succeeds");
    assert_eq!(canceled.status, OrderStatus::Canceled);

    let err = orders_service::cancel::cancel(&store, order.id)
        .await
        .expect_err("cancel on an already-canceled order must be rejected");
    assert!(matches!(err, orders_service::error::CancelError::Terminal));

    let product = store.get_product(product_id).await.unwrap().unwrap();
    assert_eq!(product.stock, 5, "stock restored exactly once");
}
