//! Orchestrator tunables.

use std::time::Duration;

/// Knobs for checkout, reservation, cancellation, return, and caching
/// behaviour.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Prefix stamped onto generated order numbers.
    pub order_number_prefix: String,
    /// How many candidate numbers to try before giving up on a
    /// uniqueness collision streak.
    pub max_order_number_attempts: u32,
    /// How long an inventory hold survives without being committed or
    /// released.
    pub reservation_ttl: Duration,
    /// Hours after placement during which a customer may cancel a
    /// paid-and-confirmed order.
    pub cancellation_window_hours: i64,
    /// Days after delivery during which a return may be requested.
    pub return_window_days: i64,
    /// Lifetime of cached orders and listing pages.
    pub cache_ttl: Duration,
    /// Upper bound on cached entries per keyspace.
    pub cache_capacity: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            order_number_prefix: "ORD".to_string(),
            max_order_number_attempts: 5,
            reservation_ttl: Duration::from_secs(30 * 60),
            cancellation_window_hours: 24,
            return_window_days: 7,
            cache_ttl: Duration::from_secs(60 * 60),
            cache_capacity: 10_000,
        }
    }
}
