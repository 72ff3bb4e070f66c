use std::sync::Arc;

use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::payment_provider::SharedPaymentProvider;
use crate::rate_limiter::RateLimiter;
use crate::store::PostgresStore;

/// Shared application state for every API handler, following the
/// teacher's `AppState` shape (`api/state.rs`).
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<PostgresStore>,
    pub config: Arc<AppConfig>,
    pub rate_limiter: Arc<RateLimiter>,
    pub payment_provider: SharedPaymentProvider,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        store: Arc<PostgresStore>,
        config: Arc<AppConfig>,
        rate_limiter: Arc<RateLimiter>,
        payment_provider: SharedPaymentProvider,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            config,
            rate_limiter,
            payment_provider,
            metrics,
        }
    }
}
