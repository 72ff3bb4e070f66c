use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use orders_service::api::{create_router, AppState};
use orders_service::config::AppConfig;
use orders_service::metrics::Metrics;
use orders_service::outbox_dispatcher::{OutboxDispatcher, OutboxDispatcherConfig};
use orders_service::payment_provider::FakePaymentProvider;
use orders_service::rate_limiter::RateLimiter;
use orders_service::store::PostgresStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().unwrap_or_else(|e| {
        eprintln!("failed to load config: {e}");
        std::process::exit(1);
    });

    init_logging(&config);

    info!(app = %config.app_name, "starting orders-service");

    let store = Arc::new(PostgresStore::new(&config.database.url, config.database.max_connections).await?);
    store.migrate().await?;

    let base_url = format!("http://127.0.0.1:{}", config.server_port);
    let payment_provider: Arc<dyn orders_service::payment_provider::PaymentProvider> =
        Arc::new(FakePaymentProvider::new(
            base_url,
            config.fake_payment.enabled,
            config.fake_payment.success_rate,
            config.payment_webhook_secret.clone(),
        ));

    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.orders_per_minute));
    let metrics = Arc::new(Metrics::new());

    let dispatcher_config = OutboxDispatcherConfig {
        poll_interval: std::time::Duration::from_secs(config.outbox.worker_interval_secs),
        max_attempts: config.outbox.max_attempts,
        retry_base_delay: std::time::Duration::from_secs(config.outbox.retry_base_delay_secs),
        claim_batch_size: config.outbox.claim_batch_size,
    };
    let (dispatcher, dispatcher_stop) = OutboxDispatcher::new(
        store.clone(),
        dispatcher_config,
        payment_provider.clone(),
        metrics.clone(),
    );
    let dispatcher_handle = tokio::spawn(dispatcher.run());

    let state = AppState::new(
        store.clone(),
        Arc::new(config.clone()),
        rate_limiter,
        payment_provider,
        metrics,
    );
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("listening on http://{addr}");
    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down outbox dispatcher");
    dispatcher_stop.signal();
    if let Err(e) = dispatcher_handle.await {
        warn!("outbox dispatcher task panicked: {e}");
    }

    Ok(())
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},sqlx=warn", config.logging.level)));

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("failed to install SIGTERM handler: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
