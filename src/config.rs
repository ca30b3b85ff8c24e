use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_long_enough_for_hs256";

/// Payment provider (hosted checkout) settings.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PaymentConfig {
    /// Provider API base URL
    #[serde(default = "default_payment_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub api_key: String,
    /// HMAC key used to sign payment-link requests
    #[serde(default)]
    pub checksum_key: String,
    #[serde(default = "default_return_url")]
    pub return_url: String,
    #[serde(default = "default_cancel_url")]
    pub cancel_url: String,
    /// Outbound provider call timeout (seconds)
    #[serde(default = "default_provider_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Window a created payment link stays payable (seconds)
    #[serde(default = "default_link_timeout_secs")]
    pub link_timeout_secs: i64,
    /// A pending payment younger than this is still reusable (minutes)
    #[serde(default = "default_stale_after_mins")]
    pub stale_after_mins: i64,
    /// Interval of the background payment-timeout sweep (seconds)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            base_url: default_payment_base_url(),
            client_id: String::new(),
            api_key: String::new(),
            checksum_key: String::new(),
            return_url: default_return_url(),
            cancel_url: default_cancel_url(),
            request_timeout_secs: default_provider_timeout_secs(),
            link_timeout_secs: default_link_timeout_secs(),
            stale_after_mins: default_stale_after_mins(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT secret key shared with the external auth issuer
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// JWT expiration in seconds (used when minting tokens for tooling/tests)
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: u64,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// DB pool sizing
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    /// Flat shipping fee added to every order
    #[serde(default = "default_shipping_fee")]
    pub shipping_fee: f64,

    /// Products below this on-hand quantity show in the low-stock report
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: i32,

    /// Window for the expiring-soon report and the automatic discount (days)
    #[serde(default = "default_expiring_soon_days")]
    pub expiring_soon_days: i64,

    /// Payment provider settings
    #[serde(default)]
    pub payment: PaymentConfig,
}

fn default_jwt_expiration() -> u64 {
    3600
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    10
}
fn default_shipping_fee() -> f64 {
    1000.0
}
fn default_low_stock_threshold() -> i32 {
    10
}
fn default_expiring_soon_days() -> i64 {
    30
}
fn default_payment_base_url() -> String {
    "https://api-merchant.payos.vn".to_string()
}
fn default_return_url() -> String {
    "http://localhost:3000/payment/success".to_string()
}
fn default_cancel_url() -> String {
    "http://localhost:3000/payment/cancel".to_string()
}
fn default_provider_timeout_secs() -> u64 {
    30
}
fn default_link_timeout_secs() -> i64 {
    120
}
fn default_stale_after_mins() -> i64 {
    30
}
fn default_sweep_interval_secs() -> u64 {
    30
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] ConfigError),
    #[error("configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

impl AppConfig {
    /// Minimal constructor used by tests and tooling.
    pub fn new(database_url: impl Into<String>, jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            jwt_secret: jwt_secret.into(),
            jwt_expiration_secs: default_jwt_expiration(),
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            environment: "test".to_string(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: true,
            cors_allowed_origins: None,
            db_max_connections: 1,
            db_min_connections: 1,
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            shipping_fee: default_shipping_fee(),
            low_stock_threshold: default_low_stock_threshold(),
            expiring_soon_days: default_expiring_soon_days(),
            payment: PaymentConfig::default(),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development" || self.environment == "test"
    }

    pub fn shipping_fee_decimal(&self) -> rust_decimal::Decimal {
        rust_decimal::Decimal::from_f64_retain(self.shipping_fee)
            .unwrap_or(rust_decimal::Decimal::ZERO)
    }
}

/// Load configuration from `config/default.toml`, an environment-specific
/// overlay, and `APP__*` environment variables (highest precedence).
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = std::env::var("RUN_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let mut builder = Config::builder()
        .set_default("environment", run_env.clone())?
        .set_default("jwt_secret", DEV_DEFAULT_JWT_SECRET)?
        .set_default("database_url", "sqlite://glowcart.db?mode=rwc")?;

    let default_path = Path::new(CONFIG_DIR).join("default.toml");
    if default_path.exists() {
        builder = builder.add_source(File::from(default_path));
    }
    let env_path = Path::new(CONFIG_DIR).join(format!("{run_env}.toml"));
    if env_path.exists() {
        builder = builder.add_source(File::from(env_path));
    }

    let cfg: AppConfig = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?
        .try_deserialize()?;

    cfg.validate()?;
    info!(environment = %cfg.environment, port = cfg.port, "configuration loaded");
    Ok(cfg)
}

/// Initialize the global tracing subscriber.
pub fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
