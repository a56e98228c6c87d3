use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    pub identity: IdentityConfig,
    pub business_rules: BusinessRules,
    pub expiry: ExpiryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// How long an unpaid order keeps its seats and stock.
    pub transaction_hold_seconds: u64,
    /// Used when an event has no settings row of its own.
    #[serde(default = "default_adult_age")]
    pub default_adult_minimum_age: u32,
    #[serde(default = "default_max_items")]
    pub default_max_items_per_order: u32,
    /// Bound on each post-commit call: expiry enqueue and event publish.
    #[serde(default = "default_side_effect_timeout")]
    pub side_effect_timeout_ms: u64,
}

fn default_adult_age() -> u32 { 17 }
fn default_max_items() -> u32 { 5 }
fn default_side_effect_timeout() -> u64 { 2000 }

impl BusinessRules {
    pub fn transaction_hold(&self) -> Duration {
        Duration::from_secs(self.transaction_hold_seconds)
    }

    pub fn side_effect_timeout(&self) -> Duration {
        Duration::from_millis(self.side_effect_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
    /// Verifies the payment gateway's service token.
    pub gateway_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Include error details in API responses. Keep off in production.
    #[serde(default)]
    pub verbose_errors: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 10 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_expiry_key")]
    pub expiry_queue_key: String,
}

fn default_expiry_key() -> String { "tessera:expiry".to_string() }

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    #[serde(default = "default_order_topic")]
    pub order_topic: String,
}

fn default_order_topic() -> String { "orders.reserved".to_string() }

#[derive(Debug, Deserialize, Clone)]
pub struct IdentityConfig {
    pub base_url: String,
    #[serde(default = "default_identity_timeout")]
    pub timeout_ms: u64,
}

fn default_identity_timeout() -> u64 { 5000 }

impl IdentityConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExpiryConfig {
    pub poll_interval_ms: u64,
    pub batch_size: usize,
    /// Hard limit for a single release.
    pub execution_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_seconds: u64,
    /// Run the expiry worker inside the API process.
    #[serde(default = "default_embedded_worker")]
    pub embedded_worker: bool,
}

fn default_embedded_worker() -> bool { true }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `TESSERA__SERVER__PORT=8080`
            .add_source(config::Environment::with_prefix("TESSERA").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
