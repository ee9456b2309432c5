//! Application configuration
//!
//! This module provides centralized configuration management using the
//! `config` crate. Configuration can be loaded from environment variables
//! and config files.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub vault: VaultConfig,
    pub market: MarketDataConfig,
    pub gateway: GatewayConfig,
    pub notifier: NotifierConfig,
    pub scheduler: SchedulerConfig,
}

/// Database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

/// Credential vault configuration
///
/// The key is loaded once at process startup from a secured configuration
/// source; rotation is an operational concern outside this process.
#[derive(Debug, Deserialize, Clone)]
pub struct VaultConfig {
    /// Base64-encoded 32-byte AES-256-GCM key
    pub key: String,
}

/// Quote source configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MarketDataConfig {
    /// Base URL of the quote API
    pub base_url: String,

    /// API token
    pub api_key: String,

    /// Request timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

/// Payment gateway configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    /// Base URL of the payment API
    pub base_url: String,

    /// Secret API key (bearer auth)
    pub api_key: String,

    /// Probe charge amount in minor currency units
    ///
    /// The renewal check books a constant nominal charge rather than the
    /// subscription price; point this at a verify-only endpoint amount if
    /// the provider offers one.
    #[serde(default = "default_probe_amount")]
    pub probe_amount_cents: u32,

    /// Probe charge currency
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Request timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_probe_amount() -> u32 {
    499
}

fn default_currency() -> String {
    "eur".to_string()
}

fn default_http_timeout() -> u64 {
    30
}

/// Notification relay configuration
#[derive(Debug, Deserialize, Clone)]
pub struct NotifierConfig {
    /// Endpoint the rendered notifications are posted to
    pub endpoint: String,

    /// Sender identity included in each notification
    #[serde(default = "default_sender")]
    pub sender: String,

    /// Request timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_sender() -> String {
    "FinWatch <no-reply@finwatch.app>".to_string()
}

/// Scheduler timing configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    /// Seconds between price polls for one alert
    #[serde(default = "default_alert_poll")]
    pub alert_poll_secs: u64,

    /// Seconds between billing sweeps
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Days a subscription stays paid before it is due again
    #[serde(default = "default_billing_period")]
    pub billing_period_days: i64,
}

fn default_alert_poll() -> u64 {
    300
}

fn default_sweep_interval() -> u64 {
    86_400
}

fn default_billing_period() -> i64 {
    30
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            alert_poll_secs: 300,
            sweep_interval_secs: 86_400,
            billing_period_days: 30,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with default values
            .set_default("database.max_connections", 10)?
            .set_default("gateway.probe_amount_cents", 499)?
            .set_default("gateway.currency", "eur")?
            .set_default("gateway.timeout_secs", 30)?
            .set_default("market.timeout_secs", 30)?
            .set_default("notifier.timeout_secs", 30)?
            .set_default("scheduler.alert_poll_secs", 300)?
            .set_default("scheduler.sweep_interval_secs", 86_400)?
            .set_default("scheduler.billing_period_days", 30)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables with FINWATCH_ prefix
            .add_source(
                Environment::with_prefix("FINWATCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("FINWATCH").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
