//! Application configuration loaded from environment variables.

use std::time::Duration;

use orchestrator::OrchestratorConfig;

/// Output format of the log subscriber.
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
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL connection string; orders are kept in
///   memory when unset
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `INVENTORY_CALL_TIMEOUT_MS`, `CUSTOMER_CALL_TIMEOUT_MS`: per-call
///   timeout for each collaborator (default: `2000`)
/// - `CREATE_ORDER_TIMEOUT_SECS` (default: `30`) and
///   `PROCESS_ORDER_TIMEOUT_SECS` (default: `60`)
/// - `STALE_ORDER_AGE_HOURS`: age at which the bulk sweep cancels pending
///   orders (default: `24`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub inventory_call_timeout: Duration,
    pub customer_call_timeout: Duration,
    pub create_order_timeout: Duration,
    pub process_order_timeout: Duration,
    pub stale_order_age: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults for
    /// missing or unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

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
            database_max_connections: lookup("DATABASE_MAX_CONNECTIONS")
                .and_then(|n| n.parse().ok())
                .unwrap_or(defaults.database_max_connections),
            inventory_call_timeout: parsed("INVENTORY_CALL_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.inventory_call_timeout),
            customer_call_timeout: parsed("CUSTOMER_CALL_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.customer_call_timeout),
            create_order_timeout: parsed("CREATE_ORDER_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.create_order_timeout),
            process_order_timeout: parsed("PROCESS_ORDER_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.process_order_timeout),
            stale_order_age: parsed("STALE_ORDER_AGE_HOURS")
                .map(|hours| Duration::from_secs(hours.saturating_mul(3600)))
                .unwrap_or(defaults.stale_order_age),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Workflow settings with the overrides from this configuration applied.
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let mut config = OrchestratorConfig {
            create_timeout: self.create_order_timeout,
            process_timeout: self.process_order_timeout,
            stale_order_age: self.stale_order_age,
            ..OrchestratorConfig::default()
        };
        config.inventory.call_timeout = self.inventory_call_timeout;
        config.customer.call_timeout = self.customer_call_timeout;
        config
    }
}

impl Default for Config {
    fn default() -> Self {
        let workflows = OrchestratorConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 10,
            inventory_call_timeout: workflows.inventory.call_timeout,
            customer_call_timeout: workflows.customer.call_timeout,
            create_order_timeout: workflows.create_timeout,
            process_order_timeout: workflows.process_timeout,
            stale_order_age: workflows.stale_order_age,
        }
    }
}
