//! Application configuration loaded from environment variables.

use std::time::Duration;

use domain::Money;
use fulfillment::{FeePolicy, FulfillmentConfig};

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `json` for JSON lines, anything else for text
/// - `DATABASE_URL`: PostgreSQL URL; without it documents stay in memory
/// - `DELIVERY_FEE_CENTS`, `FREE_DELIVERY_THRESHOLD_CENTS`
/// - `PAYMENT_TIMEOUT_SECS`, `SWEEP_INTERVAL_SECS`, `PURGE_INTERVAL_SECS`
/// - `CANCELLED_RETENTION_DAYS`, `LOCATION_TTL_SECS`
///
/// Unparsable values fall back to the default.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub fulfillment: FulfillmentConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parse = |key: &str| lookup(key).and_then(|v| v.trim().parse::<i64>().ok());
        let positive = |key: &str| parse(key).filter(|v| *v > 0);
        let defaults = Config::default();
        let mut fulfillment = defaults.fulfillment;

        if let Some(cents) = parse("DELIVERY_FEE_CENTS").filter(|c| *c >= 0) {
            fulfillment.fees.delivery_fee = Money::from_cents(cents);
        }
        if let Some(cents) = parse("FREE_DELIVERY_THRESHOLD_CENTS").filter(|c| *c >= 0) {
            fulfillment.fees.free_delivery_threshold = Some(Money::from_cents(cents));
        }
        if let Some(secs) = positive("PAYMENT_TIMEOUT_SECS") {
            fulfillment.payment_timeout = chrono::Duration::seconds(secs);
        }
        if let Some(secs) = positive("SWEEP_INTERVAL_SECS") {
            fulfillment.sweep_interval = Duration::from_secs(secs.unsigned_abs());
        }
        if let Some(secs) = positive("PURGE_INTERVAL_SECS") {
            fulfillment.purge_interval = Duration::from_secs(secs.unsigned_abs());
        }
        if let Some(days) = positive("CANCELLED_RETENTION_DAYS") {
            fulfillment.cancelled_retention = chrono::Duration::days(days);
        }
        if let Some(secs) = positive("LOCATION_TTL_SECS") {
            fulfillment.location_ttl = chrono::Duration::seconds(secs);
        }

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match lookup("LOG_FORMAT") {
                Some(format) if format.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            fulfillment,
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn fees(&self) -> FeePolicy {
        self.fulfillment.fees
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            fulfillment: FulfillmentConfig::default(),
        }
    }
}
