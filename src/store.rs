//! PostgreSQL storage adapter.
//!
//! Owns the connection pool and every SQL statement the core issues. Row
//! locking (`select_for_update`) and skip-locked outbox claiming both live
//! here so the rest of the core only ever talks in terms of domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Row};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{IdempotencyRecord, Order, OrderItem, OrderStatus, OutboxEvent, OutboxStatus, Product};
use crate::error::StoreError;

/// A transaction borrowed from the pool. Dropping it without `commit()`
/// rolls it back and releases any row locks it holds.
pub type Tx<'a> = sqlx::Transaction<'a, Postgres>;

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(StoreError::from_sqlx)?;

        info!("connected to PostgreSQL");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("database migrations completed");
        Ok(())
    }

    pub async fn begin(&self) -> Result<Tx<'_>, StoreError> {
        self.pool.begin().await.map_err(StoreError::from_sqlx)
    }

    // ==================== Products ====================

    fn row_to_product(row: &sqlx::postgres::PgRow) -> Product {
        Product {
            id: row.get("id"),
            name: row.get("name"),
            price: row.get("price"),
            stock: row.get("stock"),
            is_active: row.get("is_active"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    /// Locks the given product ids in ascending order and returns whichever
    /// of them exist. Callers compare the returned set against the
    /// requested ids to detect missing products.
    #[instrument(skip(self, tx))]
    pub async fn select_for_update(
        &self,
        tx: &mut Tx<'_>,
        mut ids: Vec<Uuid>,
    ) -> Result<Vec<Product>, StoreError> {
        ids.sort();
        ids.dedup();

        let rows = sqlx::query(
            r#"
            SELECT id, name, price, stock, is_active, created_at, updated_at
            FROM products
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut **tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(rows.iter().map(Self::row_to_product).collect())
    }

    pub async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, price, stock, is_active, created_at, updated_at
            FROM products WHERE id = $1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(row.as_ref().map(Self::row_to_product))
    }

    pub async fn update_product_stock(
        &self,
        tx: &mut Tx<'_>,
        product_id: Uuid,
        new_stock: i32,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"UPDATE products SET stock = $2, updated_at = NOW() WHERE id = $1"#,
        )
        .bind(product_id)
        .bind(new_stock)
        .execute(&mut **tx)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    pub async fn insert_product(
        &self,
        name: &str,
        price: Decimal,
        stock: i32,
        is_active: bool,
    ) -> Result<Product, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO products (id, name, price, stock, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            RETURNING id, name, price, stock, is_active, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(price)
        .bind(stock)
        .bind(is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(Self::row_to_product(&row))
    }

    /// Cursor-paginated product listing for the admin collaborator. `cursor`
    /// is the `created_at` of the last row of the previous page; pages are
    /// ordered newest-first.
    pub async fn list_products(
        &self,
        search: Option<&str>,
        is_active: Option<bool>,
        cursor: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, price, stock, is_active, created_at, updated_at
            FROM products
            WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%')
              AND ($2::bool IS NULL OR is_active = $2)
              AND ($3::timestamptz IS NULL OR created_at < $3)
            ORDER BY created_at DESC
            LIMIT $4
            "#,
        )
        .bind(search)
        .bind(is_active)
        .bind(cursor)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(rows.iter().map(Self::row_to_product).collect())
    }

    // ==================== Orders ====================

    pub async fn insert_order(&self, tx: &mut Tx<'_>, order: &Order) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_email, status, items_total, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(order.id)
        .bind(&order.user_email)
        .bind(order.status.as_str())
        .bind(order.items_total)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    pub async fn insert_order_items(
        &self,
        tx: &mut Tx<'_>,
        items: &[OrderItem],
    ) -> Result<(), StoreError> {
        for item in items {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, quantity, price_snapshot)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(item.id)
            .bind(item.order_id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.price_snapshot)
            .execute(&mut **tx)
            .await
            .map_err(StoreError::from_sqlx)?;
        }
        Ok(())
    }

    fn row_to_order(row: &sqlx::postgres::PgRow) -> Order {
        let status_str: String = row.get("status");
        Order {
            id: row.get("id"),
            user_email: row.get("user_email"),
            status: status_str.parse().expect("status column always valid"),
            items_total: row.get("items_total"),
            items: Vec::new(),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    fn row_to_item(row: &sqlx::postgres::PgRow) -> OrderItem {
        OrderItem {
            id: row.get("id"),
            order_id: row.get("order_id"),
            product_id: row.get("product_id"),
            quantity: row.get("quantity"),
            price_snapshot: row.get("price_snapshot"),
        }
    }

    async fn fetch_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT id, order_id, product_id, quantity, price_snapshot FROM order_items WHERE order_id = $1"#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(rows.iter().map(Self::row_to_item).collect())
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(
            r#"SELECT id, user_email, status, items_total, created_at, updated_at FROM orders WHERE id = $1"#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        let Some(row) = row else { return Ok(None) };
        let mut order = Self::row_to_order(&row);
        order.items = self.fetch_items(order.id).await?;
        Ok(Some(order))
    }

    /// Locks the order row so concurrent payment callbacks / cancels on the
    /// same order serialize.
    pub async fn get_order_for_update(
        &self,
        tx: &mut Tx<'_>,
        order_id: Uuid,
    ) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(
            r#"SELECT id, user_email, status, items_total, created_at, updated_at FROM orders WHERE id = $1 FOR UPDATE"#,
        )
        .bind(order_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        let Some(row) = row else { return Ok(None) };
        let mut order = Self::row_to_order(&row);
        let rows = sqlx::query(
            r#"SELECT id, order_id, product_id, quantity, price_snapshot FROM order_items WHERE order_id = $1"#,
        )
        .bind(order.id)
        .fetch_all(&mut **tx)
        .await
        .map_err(StoreError::from_sqlx)?;
        order.items = rows.iter().map(Self::row_to_item).collect();
        Ok(Some(order))
    }

    pub async fn update_order_status(
        &self,
        tx: &mut Tx<'_>,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<(), StoreError> {
        sqlx::query(r#"UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1"#)
            .bind(order_id)
            .bind(status.as_str())
            .execute(&mut **tx)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    // ==================== Idempotency ====================

    pub async fn lookup_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        let row = sqlx::query(
            r#"SELECT key, request_hash, order_id, created_at FROM idempotency_keys WHERE key = $1"#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(row.map(|r| IdempotencyRecord {
            key: r.get("key"),
            request_hash: r.get("request_hash"),
            order_id: r.get("order_id"),
            created_at: r.get("created_at"),
        }))
    }

    /// Inserts the binding; returns `Err(StoreError::Conflict)` on a unique
    /// violation so the caller can re-`lookup` and resolve the race.
    pub async fn bind_idempotency_key(
        &self,
        tx: &mut Tx<'_>,
        key: &str,
        request_hash: &str,
        order_id: Uuid,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO idempotency_keys (key, request_hash, order_id, created_at) VALUES ($1, $2, $3, NOW())"#,
        )
        .bind(key)
        .bind(request_hash)
        .bind(order_id)
        .execute(&mut **tx)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    // ==================== Outbox ====================

    fn row_to_outbox(row: &sqlx::postgres::PgRow) -> OutboxEvent {
        let status_str: String = row.get("status");
        OutboxEvent {
            id: row.get("id"),
            event_type: row.get("event_type"),
            payload: row.get("payload"),
            status: status_str.parse().expect("status column always valid"),
            attempts: row.get("attempts"),
            next_attempt_at: row.get("next_attempt_at"),
            created_at: row.get("created_at"),
        }
    }

    pub async fn insert_outbox_event(
        &self,
        tx: &mut Tx<'_>,
        event: &OutboxEvent,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO outbox (id, event_type, payload, status, attempts, next_attempt_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(event.id)
        .bind(&event.event_type)
        .bind(&event.payload)
        .bind(event.status.as_str())
        .bind(event.attempts)
        .bind(event.next_attempt_at)
        .bind(event.created_at)
        .execute(&mut **tx)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    /// Claims up to `limit` pending, due rows under `FOR UPDATE SKIP
    /// LOCKED`, so competing dispatcher replicas partition the queue
    /// without coordination.
    #[instrument(skip(self, tx))]
    pub async fn claim_due_outbox(
        &self,
        tx: &mut Tx<'_>,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<OutboxEvent>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_type, payload, status, attempts, next_attempt_at, created_at
            FROM outbox
            WHERE status = 'pending' AND next_attempt_at <= $1
            ORDER BY next_attempt_at ASC
            LIMIT $2
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&mut **tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(rows.iter().map(Self::row_to_outbox).collect())
    }

    /// Backing query for the `outbox_pending` gauge.
    pub async fn count_pending_outbox(&self) -> Result<i64, StoreError> {
        let row = sqlx::query(r#"SELECT COUNT(*) AS count FROM outbox WHERE status = 'pending'"#)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(row.get("count"))
    }

    pub async fn mark_outbox_sent(&self, tx: &mut Tx<'_>, id: Uuid) -> Result<(), StoreError> {
        sqlx::query(r#"UPDATE outbox SET status = 'sent' WHERE id = $1"#)
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    pub async fn schedule_outbox_retry(
        &self,
        tx: &mut Tx<'_>,
        id: Uuid,
        attempts: i32,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"UPDATE outbox SET attempts = $2, next_attempt_at = $3 WHERE id = $1"#,
        )
        .bind(id)
        .bind(attempts)
        .bind(next_attempt_at)
        .execute(&mut **tx)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    pub async fn mark_outbox_dead(
        &self,
        tx: &mut Tx<'_>,
        id: Uuid,
        attempts: i32,
    ) -> Result<(), StoreError> {
        sqlx::query(r#"UPDATE outbox SET status = 'dead', attempts = $2 WHERE id = $1"#)
            .bind(id)
            .bind(attempts)
            .execute(&mut **tx)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(())
    }
}
