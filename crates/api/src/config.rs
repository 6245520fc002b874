//! Application configuration loaded from environment variables.

use payments::{DEFAULT_TOLERANCE_SECS, STRIPE_API_BASE};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: Postgres connection string; unset means in-memory store
/// - `STRIPE_SECRET_KEY`: Stripe API key; unset means in-memory provider
/// - `STRIPE_WEBHOOK_SECRET`: webhook signing secret
/// - `STRIPE_API_BASE`: Stripe API base URL (default: `https://api.stripe.com`)
/// - `PUBLIC_BASE_URL`: base of checkout return URLs (default: tenant storefront)
/// - `CHECKOUT_CURRENCY`: ISO currency of checkout sessions (default: `"eur"`)
/// - `WEBHOOK_TOLERANCE_SECS`: accepted signature age (default: `300`)
/// - `PROVIDER_TIMEOUT_SECS`: payment provider request timeout (default: `10`)
/// - `ALLOW_TENANT_OVERRIDE`: honor explicit tenant ids, for staging and
///   preview hosts (default: `false`)
/// - `RATE_LIMIT_PER_MINUTE`: checkout requests per client per minute, `0` disables (default: `30`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub stripe_api_base: String,
    pub public_base_url: Option<String>,
    pub checkout_currency: String,
    pub webhook_tolerance_secs: i64,
    pub provider_timeout_secs: u64,
    pub allow_tenant_override: bool,
    pub rate_limit_per_minute: u32,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_source(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: parse_or(non_empty("PORT"), defaults.port),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: non_empty("DATABASE_URL"),
            stripe_secret_key: non_empty("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: non_empty("STRIPE_WEBHOOK_SECRET"),
            stripe_api_base: non_empty("STRIPE_API_BASE").unwrap_or(defaults.stripe_api_base),
            public_base_url: non_empty("PUBLIC_BASE_URL"),
            checkout_currency: non_empty("CHECKOUT_CURRENCY")
                .map(|c| c.to_ascii_lowercase())
                .unwrap_or(defaults.checkout_currency),
            webhook_tolerance_secs: parse_or(
                non_empty("WEBHOOK_TOLERANCE_SECS"),
                defaults.webhook_tolerance_secs,
            ),
            provider_timeout_secs: parse_or(
                non_empty("PROVIDER_TIMEOUT_SECS"),
                defaults.provider_timeout_secs,
            ),
            allow_tenant_override: non_empty("ALLOW_TENANT_OVERRIDE")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.allow_tenant_override),
            rate_limit_per_minute: parse_or(
                non_empty("RATE_LIMIT_PER_MINUTE"),
                defaults.rate_limit_per_minute,
            ),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            stripe_secret_key: None,
            stripe_webhook_secret: None,
            stripe_api_base: STRIPE_API_BASE.to_string(),
            public_base_url: None,
            checkout_currency: "eur".to_string(),
            webhook_tolerance_secs: DEFAULT_TOLERANCE_SECS,
            provider_timeout_secs: 10,
            allow_tenant_override: false,
            rate_limit_per_minute: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_source(|key| map.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.checkout_currency, "eur");
        assert_eq!(config.webhook_tolerance_secs, 300);
        assert_eq!(config.provider_timeout_secs, 10);
        assert!(!config.allow_tenant_override);
        assert_eq!(config.rate_limit_per_minute, 30);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_reads_overrides() {
        let config = from_pairs(&[
            ("PORT", "8081"),
            ("DATABASE_URL", "postgres://localhost/bookings"),
            ("CHECKOUT_CURRENCY", "USD"),
            ("ALLOW_TENANT_OVERRIDE", "true"),
            ("RATE_LIMIT_PER_MINUTE", "0"),
        ]);
        assert_eq!(config.port, 8081);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/bookings"));
        assert_eq!(config.checkout_currency, "usd");
        assert!(config.allow_tenant_override);
        assert_eq!(config.rate_limit_per_minute, 0);
    }

    #[test]
    fn test_invalid_and_empty_values_fall_back() {
        let config = from_pairs(&[
            ("PORT", "not-a-port"),
            ("DATABASE_URL", "  "),
            ("ALLOW_TENANT_OVERRIDE", "maybe"),
        ]);
        assert_eq!(config.port, 3000);
        assert!(config.database_url.is_none());
        assert!(!config.allow_tenant_override);
    }
}
