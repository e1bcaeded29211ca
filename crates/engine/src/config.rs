//! Engine configuration loaded from environment variables.

use std::time::Duration;

/// Engine configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `ORDER_NUMBER_PREFIX` — order number prefix (default: `"ORD"`)
/// - `RETURN_NUMBER_PREFIX` — return number prefix (default: `"RET"`)
/// - `PAYMENT_GATEWAY_TIMEOUT_MS` — gateway call timeout (default: `5000`)
/// - `LOW_STOCK_THRESHOLD` — default threshold for new stock records
///   (default: `5`)
/// - `RESERVATION_TTL_MINUTES` — expiry applied to order reservations;
///   unset means reservations never expire (default: unset)
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub order_prefix: String,
    pub return_prefix: String,
    pub gateway_timeout: Duration,
    pub default_low_stock_threshold: i64,
    pub reservation_ttl: Option<Duration>,
}

impl EngineConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            order_prefix: std::env::var("ORDER_NUMBER_PREFIX").unwrap_or_else(|_| "ORD".to_string()),
            return_prefix: std::env::var("RETURN_NUMBER_PREFIX")
                .unwrap_or_else(|_| "RET".to_string()),
            gateway_timeout: std::env::var("PAYMENT_GATEWAY_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(Duration::from_millis(5000)),
            default_low_stock_threshold: std::env::var("LOW_STOCK_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            reservation_ttl: std::env::var("RESERVATION_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(|minutes: u64| Duration::from_secs(minutes * 60)),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            order_prefix: "ORD".to_string(),
            return_prefix: "RET".to_string(),
            gateway_timeout: Duration::from_millis(5000),
            default_low_stock_threshold: 5,
            reservation_ttl: None,
        }
    }
}
