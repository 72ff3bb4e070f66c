use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outbox event status. `Sent` and `Dead` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    Pending,
    Sent,
    Dead,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Sent => "sent",
            OutboxStatus::Dead => "dead",
        }
    }
}

impl std::str::FromStr for OutboxStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OutboxStatus::Pending),
            "sent" => Ok(OutboxStatus::Sent),
            "dead" => Ok(OutboxStatus::Dead),
            other => Err(format!("unknown outbox status: {other}")),
        }
    }
}

/// A durable row of the transactional outbox, written in the same
/// transaction as the state change it describes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: Uuid,
    pub event_type: String,
    pub payload: Vec<u8>,
    pub status: OutboxStatus,
    pub attempts: i32,
    pub next_attempt_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Closed tagged variant of the dispatcher's known event types. Unknown
/// `event_type` strings are not represented here and are treated by the
/// dispatcher as trivially successful, to preserve forward compatibility
/// without a dynamic plugin registry.
pub enum OutboxEventKind {
    OrderCreated,
}

impl OutboxEventKind {
    pub const ORDER_CREATED: &'static str = "order.created";

    pub fn from_event_type(event_type: &str) -> Option<Self> {
        match event_type {
            Self::ORDER_CREATED => Some(Self::OrderCreated),
            _ => None,
        }
    }
}
