//! Background outbox dispatcher: claims due pending events with
//! skip-locked semantics, runs a handler per event type, and applies
//! retry/backoff/dead-letter policy.
//!
//! Multiple dispatcher replicas are safe to run concurrently because
//! claiming uses `FOR UPDATE SKIP LOCKED` — no external leader election is
//! needed.

use chrono::Utc;
use rand::Rng;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::{OrderEvent, OrderStatus, OutboxEvent, OutboxEventKind};
use crate::metrics::Metrics;
use crate::payment_provider::SharedPaymentProvider;
use crate::state_machine::transition;
use crate::store::{PostgresStore, Tx};

#[derive(Debug, Clone)]
pub struct OutboxDispatcherConfig {
    pub poll_interval: Duration,
    pub max_attempts: i32,
    pub retry_base_delay: Duration,
    pub claim_batch_size: i64,
}

impl Default for OutboxDispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_attempts: 5,
            retry_base_delay: Duration::from_secs(1),
            claim_batch_size: 10,
        }
    }
}

/// A cloneable handle that lets the owner signal the dispatcher to stop
/// after its in-flight iteration finishes.
#[derive(Clone)]
pub struct DispatcherStop {
    tx: watch::Sender<bool>,
}

impl DispatcherStop {
    pub fn signal(&self) {
        let _ = self.tx.send(true);
    }
}

pub struct OutboxDispatcher {
    store: Arc<PostgresStore>,
    config: OutboxDispatcherConfig,
    payment_provider: SharedPaymentProvider,
    metrics: Arc<Metrics>,
    stop_rx: watch::Receiver<bool>,
}

impl OutboxDispatcher {
    pub fn new(
        store: Arc<PostgresStore>,
        config: OutboxDispatcherConfig,
        payment_provider: SharedPaymentProvider,
        metrics: Arc<Metrics>,
    ) -> (Self, DispatcherStop) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                store,
                config,
                payment_provider,
                metrics,
                stop_rx: rx,
            },
            DispatcherStop { tx },
        )
    }

    /// Runs the claim/handle/backoff loop until stopped. Finishes the
    /// in-flight iteration before exiting — it never abandons a
    /// transaction mid-commit.
    pub async fn run(mut self) {
        info!("outbox dispatcher started");
        loop {
            if *self.stop_rx.borrow() {
                break;
            }

            if let Err(e) = self.tick().await {
                error!("outbox dispatcher tick failed: {e}");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = self.stop_rx.changed() => {}
            }
        }
        info!("outbox dispatcher stopped");
    }

    #[instrument(skip(self))]
    async fn tick(&self) -> Result<(), crate::error::StoreError> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;

        let events = self
            .store
            .claim_due_outbox(&mut tx, self.config.claim_batch_size, now)
            .await?;

        if events.is_empty() {
            tx.commit().await.map_err(crate::error::StoreError::from_sqlx)?;
            self.refresh_outbox_pending_gauge().await;
            return Ok(());
        }

        info!("claimed {} outbox event(s)", events.len());

        for event in events {
            match self.handle(&mut tx, &event).await {
                Ok(()) => {
                    self.store.mark_outbox_sent(&mut tx, event.id).await?;
                }
                Err(e) => {
                    self.metrics.inc_worker_errors();
                    self.record_failure(&mut tx, &event, &e.to_string()).await?;
                }
            }
        }

        tx.commit().await.map_err(crate::error::StoreError::from_sqlx)?;
        self.refresh_outbox_pending_gauge().await;
        Ok(())
    }

    /// Updates the `outbox_pending` gauge from the current row count.
    /// Best-effort: a transient failure here just leaves the gauge stale
    /// until the next tick, it never fails the dispatcher loop.
    async fn refresh_outbox_pending_gauge(&self) {
        match self.store.count_pending_outbox().await {
            Ok(count) => self.metrics.set_outbox_pending(count),
            Err(e) => warn!("failed to refresh outbox_pending gauge: {e}"),
        }
    }

    async fn record_failure(
        &self,
        tx: &mut Tx<'_>,
        event: &OutboxEvent,
        reason: &str,
    ) -> Result<(), crate::error::StoreError> {
        let attempts = event.attempts + 1;
        if attempts >= self.config.max_attempts {
            warn!(
                "outbox event {} moved to dead letter after {attempts} attempts: {reason}",
                event.id
            );
            self.store.mark_outbox_dead(tx, event.id, attempts).await?;
        } else {
            let jitter_secs: f64 = rand::thread_rng().gen_range(0.0..1.0);
            let backoff_secs =
                self.config.retry_base_delay.as_secs_f64() * 2f64.powi(attempts - 1) + jitter_secs;
            let next_attempt_at = Utc::now()
                + chrono::Duration::milliseconds((backoff_secs * 1000.0).round() as i64);

            warn!(
                "outbox event {} retry {attempts}/{} scheduled in {backoff_secs:.2}s: {reason}",
                event.id, self.config.max_attempts
            );
            self.store
                .schedule_outbox_retry(tx, event.id, attempts, next_attempt_at)
                .await?;
        }
        Ok(())
    }

    async fn handle(&self, tx: &mut Tx<'_>, event: &OutboxEvent) -> anyhow::Result<()> {
        match OutboxEventKind::from_event_type(&event.event_type) {
            Some(OutboxEventKind::OrderCreated) => self.handle_order_created(tx, event).await,
            None => Ok(()), // unknown event types succeed silently (forward compatibility)
        }
    }

    async fn handle_order_created(&self, tx: &mut Tx<'_>, event: &OutboxEvent) -> anyhow::Result<()> {
        #[derive(serde::Deserialize)]
        struct Payload {
            order_id: String,
        }
        let payload: Payload = serde_json::from_slice(&event.payload)?;
        let order_id = Uuid::from_str(&payload.order_id)?;

        let order = self
            .store
            .get_order_for_update(tx, order_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("order {order_id} referenced by outbox event not found"))?;

        // Re-driving this transition on retry is a no-op: once the order is
        // past `reserved`, `transition` rejects `PaymentInitiated` and we
        // simply skip straight to re-contacting the provider, which is
        // itself idempotent from the provider's point of view.
        if order.status == OrderStatus::Reserved {
            let next = transition(order.status, OrderEvent::PaymentInitiated)?;
            self.store.update_order_status(tx, order.id, next).await?;
        } else if order.status != OrderStatus::PaymentPending {
            // Paid or canceled already — nothing left to do.
            return Ok(());
        }

        self.payment_provider
            .initiate_payment(order.id, order.items_total)
            .await?;

        Ok(())
    }
}
