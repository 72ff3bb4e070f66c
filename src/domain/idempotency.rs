use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A bound `(key, request_hash) -> order_id` mapping. Written once per
/// successful order creation and never updated; `request_hash` is
/// immutable for a given `key`.
#[derive(Debug, Clone)]
pub struct IdempotencyRecord {
    pub key: String,
    pub request_hash: String,
    pub order_id: Uuid,
    pub created_at: DateTime<Utc>,
}
