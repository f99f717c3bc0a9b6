//! Application configuration loaded from environment variables.

use std::time::Duration;

/// Server and worker configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `ORDER_WORKERS` / `REFUND_WORKERS` / `NOTIFICATION_WORKERS` — worker
///   counts per queue (defaults: 4 / 2 / 1)
/// - `CHARGE_SUCCESS_RATE` / `REFUND_SUCCESS_RATE` — gateway stub
///   probabilities (defaults: 0.90 / 0.95)
/// - `GATEWAY_MIN_LATENCY_MS` / `GATEWAY_MAX_LATENCY_MS` — simulated
///   gateway latency bounds (defaults: 1000 / 3000)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub order_workers: usize,
    pub refund_workers: usize,
    pub notification_workers: usize,
    pub charge_success_rate: f64,
    pub refund_success_rate: f64,
    pub gateway_min_latency: Duration,
    pub gateway_max_latency: Duration,
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_parsed("PORT", 3000),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            order_workers: env_parsed("ORDER_WORKERS", 4),
            refund_workers: env_parsed("REFUND_WORKERS", 2),
            notification_workers: env_parsed("NOTIFICATION_WORKERS", 1),
            charge_success_rate: env_parsed("CHARGE_SUCCESS_RATE", 0.90),
            refund_success_rate: env_parsed("REFUND_SUCCESS_RATE", 0.95),
            gateway_min_latency: Duration::from_millis(env_parsed("GATEWAY_MIN_LATENCY_MS", 1000)),
            gateway_max_latency: Duration::from_millis(env_parsed("GATEWAY_MAX_LATENCY_MS", 3000)),
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
            order_workers: 4,
            refund_workers: 2,
            notification_workers: 1,
            charge_success_rate: 0.90,
            refund_success_rate: 0.95,
            gateway_min_latency: Duration::from_millis(1000),
            gateway_max_latency: Duration::from_millis(3000),
        }
    }
}
