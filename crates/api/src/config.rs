//! Application configuration loaded from environment variables.

use std::time::Duration;

use saga::{DEFAULT_STRIPE_API_BASE, StripeConfig};

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Some(LogFormat::Pretty),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables (and an optional `.env` file loaded by
/// the binary before calling [`Config::from_env`]):
/// - `HOST` bind address (default: `"0.0.0.0"`)
/// - `PORT` listen port (default: `3000`)
/// - `RUST_LOG` tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` `"pretty"` or `"json"` (default: `"pretty"`)
/// - `DATABASE_URL` Postgres connection string; unset runs in memory
/// - `STRIPE_API_KEY` enables the Stripe gateway; unset uses the in-memory one
/// - `STRIPE_API_BASE`, `PAYMENT_CURRENCY` (default: `"cad"`)
/// - `PAYMENT_TIMEOUT_MS` (default: `10000`)
/// - `CHECKOUT_SUCCESS_URL`, `CHECKOUT_CANCEL_URL`
/// - `CORS_ORIGIN` allowed browser origin; unset allows any
/// - `TOKEN_TTL_HOURS` session lifetime (default: `24`)
/// - `ADMIN_USERNAME`, `ADMIN_PASSWORD` bootstrap administrator
#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub stripe_api_key: Option<String>,
    pub stripe_api_base: String,
    pub payment_currency: String,
    pub payment_timeout: Duration,
    pub checkout_success_url: String,
    pub checkout_cancel_url: String,
    pub cors_origin: Option<String>,
    pub token_ttl_hours: i64,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: non_empty("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: non_empty("LOG_FORMAT")
                .and_then(|f| LogFormat::parse(&f))
                .unwrap_or(defaults.log_format),
            database_url: non_empty("DATABASE_URL"),
            stripe_api_key: non_empty("STRIPE_API_KEY"),
            stripe_api_base: non_empty("STRIPE_API_BASE").unwrap_or(defaults.stripe_api_base),
            payment_currency: non_empty("PAYMENT_CURRENCY")
                .map(|c| c.to_lowercase())
                .unwrap_or(defaults.payment_currency),
            payment_timeout: non_empty("PAYMENT_TIMEOUT_MS")
                .and_then(|ms| ms.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.payment_timeout),
            checkout_success_url: non_empty("CHECKOUT_SUCCESS_URL")
                .unwrap_or(defaults.checkout_success_url),
            checkout_cancel_url: non_empty("CHECKOUT_CANCEL_URL")
                .unwrap_or(defaults.checkout_cancel_url),
            cors_origin: non_empty("CORS_ORIGIN"),
            token_ttl_hours: non_empty("TOKEN_TTL_HOURS")
                .and_then(|h| h.parse().ok())
                .filter(|h: &i64| *h > 0)
                .unwrap_or(defaults.token_ttl_hours),
            admin_username: non_empty("ADMIN_USERNAME"),
            admin_password: non_empty("ADMIN_PASSWORD"),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.token_ttl_hours)
    }

    /// Stripe settings, when an API key is configured.
    pub fn stripe(&self) -> Option<StripeConfig> {
        self.stripe_api_key.as_ref().map(|api_key| StripeConfig {
            api_key: api_key.clone(),
            api_base: self.stripe_api_base.clone(),
            currency: self.payment_currency.clone(),
            success_url: self.checkout_success_url.clone(),
            cancel_url: self.checkout_cancel_url.clone(),
        })
    }

    /// Administrator credentials, when both halves are set.
    pub fn admin_credentials(&self) -> Option<(&str, &str)> {
        match (&self.admin_username, &self.admin_password) {
            (Some(username), Some(password)) => Some((username.as_str(), password.as_str())),
            _ => None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            stripe_api_key: None,
            stripe_api_base: DEFAULT_STRIPE_API_BASE.to_string(),
            payment_currency: "cad".to_string(),
            payment_timeout: Duration::from_millis(10_000),
            checkout_success_url: "http://localhost:5000/success.html".to_string(),
            checkout_cancel_url: "http://localhost:5000/cancel.html".to_string(),
            cors_origin: None,
            token_ttl_hours: 24,
            admin_username: None,
            admin_password: None,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redacted = |v: &Option<String>| v.as_ref().map(|_| "**redacted**");
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("database_url", &redacted(&self.database_url))
            .field("stripe_api_key", &redacted(&self.stripe_api_key))
            .field("stripe_api_base", &self.stripe_api_base)
            .field("payment_currency", &self.payment_currency)
            .field("payment_timeout", &self.payment_timeout)
            .field("checkout_success_url", &self.checkout_success_url)
            .field("checkout_cancel_url", &self.checkout_cancel_url)
            .field("cors_origin", &self.cors_origin)
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("admin_username", &self.admin_username)
            .field("admin_password", &redacted(&self.admin_password))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.payment_currency, "cad");
        assert_eq!(config.payment_timeout, Duration::from_secs(10));
        assert_eq!(config.token_ttl_hours, 24);
        assert!(config.database_url.is_none());
        assert!(config.stripe().is_none());
        assert!(config.admin_credentials().is_none());
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
    fn test_lookup_overrides_defaults() {
        let config = from_pairs(&[
            ("PORT", "5000"),
            ("DATABASE_URL", "postgres://localhost/storefront"),
            ("STRIPE_API_KEY", "sk_test_1"),
            ("PAYMENT_CURRENCY", "USD"),
            ("PAYMENT_TIMEOUT_MS", "250"),
            ("TOKEN_TTL_HOURS", "2"),
            ("ADMIN_USERNAME", "admin"),
            ("ADMIN_PASSWORD", "secret"),
        ]);

        assert_eq!(config.addr(), "0.0.0.0:5000");
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/storefront")
        );
        assert_eq!(config.payment_timeout, Duration::from_millis(250));
        assert_eq!(config.token_ttl(), chrono::Duration::hours(2));
        assert_eq!(config.admin_credentials(), Some(("admin", "secret")));

        let stripe = config.stripe().unwrap();
        assert_eq!(stripe.api_key, "sk_test_1");
        assert_eq!(stripe.currency, "usd");
        assert_eq!(stripe.api_base, DEFAULT_STRIPE_API_BASE);
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = from_pairs(&[
            ("PORT", "not-a-port"),
            ("PAYMENT_TIMEOUT_MS", "soon"),
            ("TOKEN_TTL_HOURS", "-3"),
            ("DATABASE_URL", "  "),
        ]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.payment_timeout, Duration::from_secs(10));
        assert_eq!(config.token_ttl_hours, 24);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_log_format_selection() {
        assert_eq!(from_pairs(&[("LOG_FORMAT", "json")]).log_format, LogFormat::Json);
        assert_eq!(from_pairs(&[("LOG_FORMAT", " JSON ")]).log_format, LogFormat::Json);
        assert_eq!(from_pairs(&[("LOG_FORMAT", "pretty")]).log_format, LogFormat::Pretty);
        assert_eq!(from_pairs(&[("LOG_FORMAT", "xml")]).log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = from_pairs(&[
            ("STRIPE_API_KEY", "sk_live_secret"),
            ("ADMIN_PASSWORD", "hunter2"),
        ]);
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk_live_secret"));
        assert!(!debug.contains("hunter2"));
    }
}
