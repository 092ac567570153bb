//! Cache key layout and TTLs

use std::time::Duration;
use types::contract::ContractId;

/// Serialized active-order list for one contract.
pub fn orderbook(contract: &ContractId) -> String {
    format!("orderbook:{}", contract)
}

/// Best bid price for one contract.
pub fn best_bid(contract: &ContractId) -> String {
    format!("market:{}:best_bid", contract)
}

/// Best offer price for one contract.
pub fn best_offer(contract: &ContractId) -> String {
    format!("market:{}:best_offer", contract)
}

/// Process-wide "anything to match" flag.
pub const HAS_ACTIVE_ORDERS: &str = "matching:has_active_orders";

/// Timestamp of the last matching pass, read only by health checks.
pub const LAST_RUN: &str = "matching:last_run";

/// Order book entries live at most an hour.
pub const BOOK_TTL: Duration = Duration::from_secs(3600);

/// Flags live at most five minutes.
pub const FLAG_TTL: Duration = Duration::from_secs(300);
