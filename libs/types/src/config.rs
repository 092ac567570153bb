//! Engine configuration
//!
//! Defaults are compiled in; the gateway layers file and environment
//! overrides on top at startup.

use rust_decimal::Decimal;
use serde::Deserialize;

// ── Default value functions ─────────────────────────────────────────

/// Default commission rate: 0.1% of notional.
fn default_commission_rate() -> Decimal {
    Decimal::new(1, 3)
}

/// Default per-owner active order cap: 50.
fn default_max_orders_per_user() -> usize {
    50
}

/// Default order lifetime when no expiry is given: 24 h.
fn default_order_expiry_hours() -> i64 {
    24
}

/// Default periodic matching tick: 5 000 ms.
fn default_matching_interval_ms() -> u64 {
    5_000
}

/// Default quantity-confirmation deadline: 60 s.
fn default_qcsm_deadline_secs() -> u64 {
    60
}

/// Default negotiation turn deadline: 30 s.
fn default_negotiation_deadline_secs() -> u64 {
    30
}

/// Default competitive-quote alert cap: 20% fractional spread.
fn default_spread_alert_cap() -> Decimal {
    Decimal::new(2, 1)
}

/// Default TTL of the in-memory order book mirror: 30 s.
fn default_order_book_mirror_ttl_secs() -> u64 {
    30
}

/// Tunable engine parameters
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_commission_rate")]
    pub commission_rate: Decimal,
    #[serde(default = "default_max_orders_per_user")]
    pub max_orders_per_user: usize,
    #[serde(default = "default_order_expiry_hours")]
    pub order_expiry_hours: i64,
    #[serde(default = "default_matching_interval_ms")]
    pub matching_interval_ms: u64,
    #[serde(default = "default_qcsm_deadline_secs")]
    pub qcsm_deadline_secs: u64,
    #[serde(default = "default_negotiation_deadline_secs")]
    pub negotiation_deadline_secs: u64,
    #[serde(default = "default_spread_alert_cap")]
    pub spread_alert_cap: Decimal,
    #[serde(default = "default_order_book_mirror_ttl_secs")]
    pub order_book_mirror_ttl_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            commission_rate: default_commission_rate(),
            max_orders_per_user: default_max_orders_per_user(),
            order_expiry_hours: default_order_expiry_hours(),
            matching_interval_ms: default_matching_interval_ms(),
            qcsm_deadline_secs: default_qcsm_deadline_secs(),
            negotiation_deadline_secs: default_negotiation_deadline_secs(),
            spread_alert_cap: default_spread_alert_cap(),
            order_book_mirror_ttl_secs: default_order_book_mirror_ttl_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::*;

    #[test]
    fn test_defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.commission_rate, Decimal::from_str("0.001").unwrap());
        assert_eq!(cfg.max_orders_per_user, 50);
        assert_eq!(cfg.order_expiry_hours, 24);
        assert_eq!(cfg.matching_interval_ms, 5_000);
        assert_eq!(cfg.qcsm_deadline_secs, 60);
        assert_eq!(cfg.spread_alert_cap, Decimal::from_str("0.2").unwrap());
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"max_orders_per_user": 10, "qcsm_deadline_secs": 5}"#)
                .unwrap();
        assert_eq!(cfg.max_orders_per_user, 10);
        assert_eq!(cfg.qcsm_deadline_secs, 5);
        assert_eq!(cfg.order_expiry_hours, 24);
    }
}
