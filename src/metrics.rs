//! Prometheus-style metrics, mirroring the counters and gauge the original
//! service declares in `original_source/app/routers/observability.py`
//! (`orders_total`, `orders_canceled_total`, `orders_paid_total`,
//! `outbox_pending`, `worker_errors_total`), wired up so they are actually
//! incremented at the call sites that produce those events rather than
//! left as dead declarations.

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    orders_total: IntCounter,
    orders_canceled_total: IntCounter,
    orders_paid_total: IntCounter,
    outbox_pending: IntGauge,
    worker_errors_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let orders_total =
            IntCounter::new("orders_total", "Total number of orders created")
                .expect("static metric name/help is always valid");
        let orders_canceled_total = IntCounter::new(
            "orders_canceled_total",
            "Total number of orders canceled",
        )
        .expect("static metric name/help is always valid");
        let orders_paid_total =
            IntCounter::new("orders_paid_total", "Total number of orders paid")
                .expect("static metric name/help is always valid");
        let outbox_pending =
            IntGauge::new("outbox_pending", "Number of pending outbox events")
                .expect("static metric name/help is always valid");
        let worker_errors_total = IntCounter::new(
            "worker_errors_total",
            "Total number of worker errors",
        )
        .expect("static metric name/help is always valid");

        registry
            .register(Box::new(orders_total.clone()))
            .expect("metric registered exactly once");
        registry
            .register(Box::new(orders_canceled_total.clone()))
            .expect("metric registered exactly once");
        registry
            .register(Box::new(orders_paid_total.clone()))
            .expect("metric registered exactly once");
        registry
            .register(Box::new(outbox_pending.clone()))
            .expect("metric registered exactly once");
        registry
            .register(Box::new(worker_errors_total.clone()))
            .expect("metric registered exactly once");

        Self {
            registry,
            orders_total,
            orders_canceled_total,
            orders_paid_total,
            outbox_pending,
            worker_errors_total,
        }
    }

    pub fn inc_orders_created(&self) {
        self.orders_total.inc();
    }

    pub fn inc_orders_canceled(&self) {
        self.orders_canceled_total.inc();
    }

    pub fn inc_orders_paid(&self) {
        self.orders_paid_total.inc();
    }

    pub fn inc_worker_errors(&self) {
        self.worker_errors_total.inc();
    }

    pub fn set_outbox_pending(&self, count: i64) {
        self.outbox_pending.set(count);
    }

    /// Renders the registry in Prometheus text exposition format, along
    /// with its content type, for the `/metrics` handler.
    pub fn encode(&self) -> (String, Vec<u8>) {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .expect("text encoding of gathered metrics never fails");
        (encoder.format_type().to_string(), buffer)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_increment() {
        let metrics = Metrics::new();
        metrics.inc_orders_created();
        metrics.inc_orders_created();
        metrics.inc_orders_paid();
        metrics.set_outbox_pending(3);

        let (content_type, body) = metrics.encode();
        let text = String::from_utf8(body).expect("prometheus text format is UTF-8");

        assert!(content_type.starts_with("text/plain"));
        assert!(text.contains("orders_total 2"));
        assert!(text.contains("orders_paid_total 1"));
        assert!(text.contains("orders_canceled_total 0"));
        assert!(text.contains("outbox_pending 3"));
    }
}
