pub mod idempotency;
pub mod order;
pub mod outbox;
pub mod product;

pub use idempotency::IdempotencyRecord;
pub use order::{Order, OrderEvent, OrderItem, OrderStatus};
pub use outbox::{OutboxEvent, OutboxEventKind, OutboxStatus};
pub use product::Product;
