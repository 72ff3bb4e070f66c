use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

/// Application configuration, loaded from a TOML file and overridden by
/// `ORDERS_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    #[serde(default = "default_server_port")]
    pub server_port: u16,

    pub admin_secret: String,
    pub payment_webhook_secret: String,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub outbox: OutboxConfig,
    #[serde(default)]
    pub fake_payment: FakePaymentConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

fn default_server_port() -> u16 {
    8000
}

fn default_app_name() -> String {
    "orders-service".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_orders_per_minute")]
    pub orders_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            orders_per_minute: default_orders_per_minute(),
        }
    }
}

fn default_orders_per_minute() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutboxConfig {
    #[serde(default = "default_worker_interval_secs")]
    pub worker_interval_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
    #[serde(default = "default_retry_base_delay_secs")]
    pub retry_base_delay_secs: u64,
    #[serde(default = "default_claim_batch_size")]
    pub claim_batch_size: i64,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            worker_interval_secs: default_worker_interval_secs(),
            max_attempts: default_max_attempts(),
            retry_base_delay_secs: default_retry_base_delay_secs(),
            claim_batch_size: default_claim_batch_size(),
        }
    }
}

fn default_worker_interval_secs() -> u64 {
    5
}

fn default_max_attempts() -> i32 {
    5
}

fn default_retry_base_delay_secs() -> u64 {
    1
}

fn default_claim_batch_size() -> i64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct FakePaymentConfig {
    #[serde(default = "default_fake_payment_enabled")]
    pub enabled: bool,
    #[serde(default = "default_fake_payment_success_rate")]
    pub success_rate: Decimal,
}

impl Default for FakePaymentConfig {
    fn default() -> Self {
        Self {
            enabled: default_fake_payment_enabled(),
            success_rate: default_fake_payment_success_rate(),
        }
    }
}

fn default_fake_payment_enabled() -> bool {
    true
}

fn default_fake_payment_success_rate() -> Decimal {
    Decimal::new(8, 1) // 0.8
}

impl AppConfig {
    /// Load configuration from `config/default.toml` (or a single file path)
    /// plus `ORDERS_*` environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_path = config_dir.as_ref();

        let mut builder = Config::builder()
            .set_default("app_name", "orders-service")?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("server_port", 8000)?
            .set_default("database.max_connections", 5)?
            .set_default("rate_limit.orders_per_minute", 5)?
            .set_default("outbox.worker_interval_secs", 5)?
            .set_default("outbox.max_attempts", 5)?
            .set_default("outbox.retry_base_delay_secs", 1)?
            .set_default("outbox.claim_batch_size", 10)?
            .set_default("fake_payment.enabled", true)?
            .set_default("fake_payment.success_rate", "0.8")?;

        if config_path.is_file() {
            builder = builder.add_source(File::from(config_path).required(true));
        } else {
            builder = builder
                .add_source(File::from(config_path.join("default.toml")).required(false))
                .add_source(
                    File::from(config_path.join(
                        std::env::var("ORDERS_ENV").unwrap_or_else(|_| "development".to_string()),
                    ))
                    .required(false),
                );
        }

        builder = builder.add_source(
            Environment::with_prefix("ORDERS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
