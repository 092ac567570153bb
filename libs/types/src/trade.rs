//! Trade records
//!
//! A trade is an immutable fact produced when a bid and an offer meet at a
//! price. The execution price is always the offer's (resting sell) price.

use crate::contract::ContractId;
use crate::ids::{OrderId, TradeId, UserId};
use crate::numeric::{Lots, Price};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Commission charged on a trade: `qty × price × rate`, rounded to two
/// decimal places half away from zero.
pub fn commission(qty: Lots, price: Price, rate: Decimal) -> Decimal {
    (qty.as_decimal() * price.as_decimal() * rate)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// How a trade relates to the two orders' quantities
///
/// Carried with events for consumers; settlement is identical in all cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FillClass {
    /// Both orders fully filled
    FullMatch,
    /// The buyer retains unfilled quantity
    PartialFillBuyer,
    /// The seller retains unfilled quantity
    PartialFillSeller,
}

/// An executed trade between one bid and one offer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub contract: ContractId,
    pub price: Price,
    pub qty: Lots,
    pub buyer_order: OrderId,
    pub seller_order: OrderId,
    pub buyer: UserId,
    pub seller: UserId,
    pub commission: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Trade {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        contract: ContractId,
        price: Price,
        qty: Lots,
        buyer_order: OrderId,
        seller_order: OrderId,
        buyer: UserId,
        seller: UserId,
        commission: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TradeId::new(),
            contract,
            price,
            qty,
            buyer_order,
            seller_order,
            buyer,
            seller,
            commission,
            created_at,
        }
    }

    /// Notional value (price × quantity)
    pub fn trade_value(&self) -> Decimal {
        self.qty.as_decimal() * self.price.as_decimal()
    }

    /// A trade must never pair a user with themselves.
    pub fn validate_no_self_trade(&self) -> bool {
        self.buyer != self.seller
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> DateTime<Utc> {
        "2026-01-10T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_commission_default_rate() {
        // 50 lots at 100.00 with 0.1% commission = 5.00
        let c = commission(
            Lots::new(50),
            Price::from_u64(100),
            Decimal::from_str("0.001").unwrap(),
        );
        assert_eq!(c, Decimal::from_str("5.00").unwrap());
    }

    #[test]
    fn test_commission_rounds_half_away_from_zero() {
        // 1 lot at 2.345 with 0.1% = 0.002345 -> 0.00
        let c = commission(
            Lots::new(1),
            Price::from_str("2.345").unwrap(),
            Decimal::from_str("0.001").unwrap(),
        );
        assert_eq!(c, Decimal::from_str("0.00").unwrap());

        // 15 lots at 3.50 with 0.1% = 0.0525 -> 0.05
        let c = commission(
            Lots::new(15),
            Price::from_str("3.50").unwrap(),
            Decimal::from_str("0.001").unwrap(),
        );
        assert_eq!(c, Decimal::from_str("0.05").unwrap());

        // Exact midpoint rounds away from zero: 5 lots at 1.00 = 0.005 -> 0.01
        let c = commission(
            Lots::new(5),
            Price::from_u64(1),
            Decimal::from_str("0.001").unwrap(),
        );
        assert_eq!(c, Decimal::from_str("0.01").unwrap());
    }

    #[test]
    fn test_trade_creation() {
        let trade = Trade::new(
            ContractId::parse("jan26-silver").unwrap(),
            Price::from_u64(100),
            Lots::new(50),
            OrderId::new(),
            OrderId::new(),
            UserId::new(),
            UserId::new(),
            Decimal::from_str("5.00").unwrap(),
            ts(),
        );

        assert_eq!(trade.trade_value(), Decimal::from(5000));
        assert!(trade.validate_no_self_trade());
    }

    #[test]
    fn test_self_trade_detection() {
        let user = UserId::new();
        let trade = Trade::new(
            ContractId::parse("jan26-silver").unwrap(),
            Price::from_u64(100),
            Lots::new(1),
            OrderId::new(),
            OrderId::new(),
            user,
            user,
            Decimal::ZERO,
            ts(),
        );
        assert!(!trade.validate_no_self_trade());
    }

    #[test]
    fn test_fill_class_wire_format() {
        assert_eq!(
            serde_json::to_string(&FillClass::FullMatch).unwrap(),
            "\"FULL_MATCH\""
        );
        assert_eq!(
            serde_json::to_string(&FillClass::PartialFillBuyer).unwrap(),
            "\"PARTIAL_FILL_BUYER\""
        );
        assert_eq!(
            serde_json::to_string(&FillClass::PartialFillSeller).unwrap(),
            "\"PARTIAL_FILL_SELLER\""
        );
    }

    #[test]
    fn test_trade_serialization() {
        let trade = Trade::new(
            ContractId::parse("dec25-wheat").unwrap(),
            Price::from_str("42.75").unwrap(),
            Lots::new(12),
            OrderId::new(),
            OrderId::new(),
            UserId::new(),
            UserId::new(),
            Decimal::from_str("0.51").unwrap(),
            ts(),
        );
        let json = serde_json::to_string(&trade).unwrap();
        let back: Trade = serde_json::from_str(&json).unwrap();
        assert_eq!(trade, back);
    }
}
