//! Application configuration loaded from environment variables.

use std::time::Duration;

use orchestrator::OrchestratorConfig;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `CART_SERVICE_URL` — cart collaborator base URL
/// - `CATALOG_SERVICE_URL` — catalog collaborator base URL
/// - `RESERVATION_TTL_SECS` — inventory hold lifetime
/// - `CANCELLATION_WINDOW_HOURS` — customer cancellation window
/// - `RETURN_WINDOW_DAYS` — post-delivery return window
/// - `CACHE_TTL_SECS` — order cache entry lifetime
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub cart_service_url: String,
    pub catalog_service_url: String,
    pub orchestrator: OrchestratorConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut orchestrator = OrchestratorConfig::default();
        if let Some(secs) = env_parse::<u64>("RESERVATION_TTL_SECS") {
            orchestrator.reservation_ttl = Duration::from_secs(secs);
        }
        if let Some(hours) = env_parse::<i64>("CANCELLATION_WINDOW_HOURS") {
            orchestrator.cancellation_window_hours = hours;
        }
        if let Some(days) = env_parse::<i64>("RETURN_WINDOW_DAYS") {
            orchestrator.return_window_days = days;
        }
        if let Some(secs) = env_parse::<u64>("CACHE_TTL_SECS") {
            orchestrator.cache_ttl = Duration::from_secs(secs);
        }

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_parse("PORT").unwrap_or(3000),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            cart_service_url: std::env::var("CART_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:3001".to_string()),
            catalog_service_url: std::env::var("CATALOG_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:3002".to_string()),
            orchestrator,
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            cart_service_url: "http://localhost:3001".to_string(),
            catalog_service_url: "http://localhost:3002".to_string(),
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
