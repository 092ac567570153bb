//! Normalized order intents consumed by the service
//!
//! Upstream adapters (HTTP, command parsing) produce these; every field is
//! raw and validated here, not at the transport edge.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use types::order::Side;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub side: Side,
    pub price: Decimal,
    pub monthyear: String,
    pub product: String,
    pub qty: u32,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateOrderRequest {
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub qty: Option<u32>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl UpdateOrderRequest {
    pub fn is_empty(&self) -> bool {
        self.price.is_none() && self.qty.is_none() && self.expires_at.is_none()
    }

    /// Whether this update can change match outcomes.
    pub fn touches_book(&self) -> bool {
        self.price.is_some() || self.qty.is_some()
    }
}
