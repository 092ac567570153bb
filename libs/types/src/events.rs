//! Event taxonomy for the cache bus and session fanout
//!
//! One closed enum with a variant per wire `type`; payloads are typed, and
//! dispatch everywhere is a match on the variant. Envelopes serialize as
//! `{type, data, timestamp}`.

use crate::contract::ContractId;
use crate::ids::{OrderId, TradeId, UserId};
use crate::numeric::{Lots, Price};
use crate::order::{Order, OrderStatus, Side};
use crate::trade::{FillClass, Trade};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order as exposed to event consumers and API callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderView {
    pub id: OrderId,
    pub owner: UserId,
    pub contract: ContractId,
    pub side: Side,
    pub price: Price,
    pub original_qty: Lots,
    pub remaining_qty: Lots,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            owner: order.owner,
            contract: order.contract.clone(),
            side: order.side,
            price: order.price,
            original_qty: order.original_qty,
            remaining_qty: order.remaining_qty,
            status: order.status,
            created_at: order.created_at,
            expires_at: order.expires_at,
        }
    }
}

/// Trade as emitted on the bus, with its fill classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeView {
    pub id: TradeId,
    pub contract: ContractId,
    pub price: Price,
    pub qty: Lots,
    pub buyer_order: OrderId,
    pub seller_order: OrderId,
    pub buyer: UserId,
    pub seller: UserId,
    pub commission: Decimal,
    pub class: FillClass,
    pub created_at: DateTime<Utc>,
}

impl TradeView {
    pub fn from_trade(trade: &Trade, class: FillClass) -> Self {
        Self {
            id: trade.id,
            contract: trade.contract.clone(),
            price: trade.price,
            qty: trade.qty,
            buyer_order: trade.buyer_order,
            seller_order: trade.seller_order,
            buyer: trade.buyer,
            seller: trade.seller,
            commission: trade.commission,
            class,
            created_at: trade.created_at,
        }
    }
}

/// Which side of the best-price snapshot moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeType {
    pub bid_changed: bool,
    pub offer_changed: bool,
}

/// Best-price change broadcast for one contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceChange {
    pub contract: ContractId,
    pub best_bid: Option<Price>,
    pub best_offer: Option<Price>,
    pub previous_best_bid: Option<Price>,
    pub previous_best_offer: Option<Price>,
    pub change_type: ChangeType,
    pub timestamp: DateTime<Utc>,
}

/// Trade direction from the recipient's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Request asking the smaller party to raise their quantity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    pub confirmation_key: String,
    /// Recipient: the party with the smaller remaining quantity
    pub user: UserId,
    pub contract: ContractId,
    pub your_order_id: OrderId,
    pub counterparty_order_id: OrderId,
    pub your_qty: Lots,
    pub counterparty_qty: Lots,
    pub additional_qty: Lots,
    pub price: Price,
    pub side: TradeSide,
    pub message: String,
    pub deadline_seconds: u64,
}

/// Acknowledgement that a quantity lift was accepted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationReceipt {
    pub confirmation_key: String,
    pub user: UserId,
    pub contract: ContractId,
    pub new_qty: Lots,
}

/// Why a pending confirmation ended without a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeclineCause {
    Declined,
    TimedOut,
}

/// Notice that a confirmation ended without a trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclineNotice {
    pub confirmation_key: String,
    /// Recipient
    pub user: UserId,
    pub contract: ContractId,
    pub order_id: OrderId,
    pub cause: DeclineCause,
    pub message: String,
}

/// Per-party fill notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillNotice {
    pub order_id: OrderId,
    pub owner: UserId,
    pub contract: ContractId,
    pub side: Side,
    pub price: Price,
    pub qty: Lots,
    pub remaining_qty: Lots,
    pub message: String,
}

/// Informational alert to a best-price holder when the spread is tight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitiveQuote {
    /// Recipient: the holder of `order_id`
    pub user: UserId,
    pub contract: ContractId,
    pub order_id: OrderId,
    pub side: Side,
    pub your_price: Price,
    pub counter_price: Price,
    pub message: String,
}

/// Turn notification in a quantity negotiation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegotiationNotice {
    pub key: String,
    pub user: UserId,
    pub contract: ContractId,
    pub message: String,
    pub deadline_seconds: u64,
}

/// Every event the core publishes, tagged with its wire `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum MarketEvent {
    #[serde(rename = "order:created")]
    OrderCreated(OrderView),
    #[serde(rename = "order:updated")]
    OrderUpdated(OrderView),
    #[serde(rename = "order:cancelled")]
    OrderCancelled(OrderView),
    #[serde(rename = "trade:executed")]
    TradeExecuted(TradeView),
    #[serde(rename = "market:update")]
    MarketUpdate(CompetitiveQuote),
    #[serde(rename = "market:price_changed")]
    PriceChanged(PriceChange),
    #[serde(rename = "order:matched")]
    OrderMatched(FillNotice),
    #[serde(rename = "order:filled")]
    OrderFilled(FillNotice),
    #[serde(rename = "order:partial_fill")]
    OrderPartialFill(FillNotice),
    #[serde(rename = "quantity:confirmation_request")]
    ConfirmationRequested(ConfirmationRequest),
    #[serde(rename = "quantity:partial_fill_approval")]
    PartialFillApproved(ConfirmationReceipt),
    #[serde(rename = "quantity:partial_fill_declined")]
    PartialFillDeclined(DeclineNotice),
    #[serde(rename = "quantity:counterparty_declined")]
    CounterpartyDeclined(DeclineNotice),
    #[serde(rename = "negotiation:your_turn")]
    NegotiationYourTurn(NegotiationNotice),
}

impl MarketEvent {
    /// Canonical wire tag for logging and tests.
    pub fn kind(&self) -> &'static str {
        match self {
            MarketEvent::OrderCreated(_) => "order:created",
            MarketEvent::OrderUpdated(_) => "order:updated",
            MarketEvent::OrderCancelled(_) => "order:cancelled",
            MarketEvent::TradeExecuted(_) => "trade:executed",
            MarketEvent::MarketUpdate(_) => "market:update",
            MarketEvent::PriceChanged(_) => "market:price_changed",
            MarketEvent::OrderMatched(_) => "order:matched",
            MarketEvent::OrderFilled(_) => "order:filled",
            MarketEvent::OrderPartialFill(_) => "order:partial_fill",
            MarketEvent::ConfirmationRequested(_) => "quantity:confirmation_request",
            MarketEvent::PartialFillApproved(_) => "quantity:partial_fill_approval",
            MarketEvent::PartialFillDeclined(_) => "quantity:partial_fill_declined",
            MarketEvent::CounterpartyDeclined(_) => "quantity:counterparty_declined",
            MarketEvent::NegotiationYourTurn(_) => "negotiation:your_turn",
        }
    }

    /// Contract the event concerns, when it has one.
    pub fn contract(&self) -> Option<&ContractId> {
        match self {
            MarketEvent::OrderCreated(v)
            | MarketEvent::OrderUpdated(v)
            | MarketEvent::OrderCancelled(v) => Some(&v.contract),
            MarketEvent::TradeExecuted(v) => Some(&v.contract),
            MarketEvent::MarketUpdate(v) => Some(&v.contract),
            MarketEvent::PriceChanged(v) => Some(&v.contract),
            MarketEvent::OrderMatched(v)
            | MarketEvent::OrderFilled(v)
            | MarketEvent::OrderPartialFill(v) => Some(&v.contract),
            MarketEvent::ConfirmationRequested(v) => Some(&v.contract),
            MarketEvent::PartialFillApproved(v) => Some(&v.contract),
            MarketEvent::PartialFillDeclined(v) | MarketEvent::CounterpartyDeclined(v) => {
                Some(&v.contract)
            }
            MarketEvent::NegotiationYourTurn(v) => Some(&v.contract),
        }
    }
}

/// Wire envelope: the tagged event plus a publication timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(flatten)]
    pub event: MarketEvent,
    pub timestamp: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn at(event: MarketEvent, timestamp: DateTime<Utc>) -> Self {
        Self { event, timestamp }
    }

    pub fn now(event: MarketEvent) -> Self {
        Self::at(event, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> DateTime<Utc> {
        "2026-01-10T12:00:00Z".parse().unwrap()
    }

    fn price_change() -> PriceChange {
        PriceChange {
            contract: ContractId::parse("jan26-silver").unwrap(),
            best_bid: Some(Price::from_u64(101)),
            best_offer: Some(Price::from_u64(103)),
            previous_best_bid: Some(Price::from_u64(100)),
            previous_best_offer: Some(Price::from_u64(103)),
            change_type: ChangeType {
                bid_changed: true,
                offer_changed: false,
            },
            timestamp: ts(),
        }
    }

    #[test]
    fn test_envelope_wire_shape() {
        let env = EventEnvelope::at(MarketEvent::PriceChanged(price_change()), ts());
        let json = serde_json::to_value(&env).unwrap();

        assert_eq!(json["type"], "market:price_changed");
        assert_eq!(json["data"]["contract"], "jan26-silver");
        assert_eq!(json["data"]["best_bid"], "101");
        assert_eq!(json["timestamp"], "2026-01-10T12:00:00Z");
    }

    #[test]
    fn test_envelope_roundtrip() {
        let env = EventEnvelope::at(MarketEvent::PriceChanged(price_change()), ts());
        let json = serde_json::to_string(&env).unwrap();
        let back: EventEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(env, back);
    }

    #[test]
    fn test_kind_matches_serde_tag() {
        let req = ConfirmationRequest {
            confirmation_key: "jan26-silver:a:b".into(),
            user: UserId::new(),
            contract: ContractId::parse("jan26-silver").unwrap(),
            your_order_id: OrderId::new(),
            counterparty_order_id: OrderId::new(),
            your_qty: Lots::new(15),
            counterparty_qty: Lots::new(50),
            additional_qty: Lots::new(35),
            price: Price::from_u64(100),
            side: TradeSide::Buy,
            message: "reply YES or NO".into(),
            deadline_seconds: 60,
        };
        let event = MarketEvent::ConfirmationRequested(req);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.kind());
        assert_eq!(json["data"]["side"], "BUY");
        assert_eq!(json["data"]["additional_qty"], 35);
    }

    #[test]
    fn test_decline_cause_wire_format() {
        assert_eq!(
            serde_json::to_string(&DeclineCause::TimedOut).unwrap(),
            "\"TIMED_OUT\""
        );
    }

    #[test]
    fn test_contract_accessor() {
        let env = MarketEvent::PriceChanged(price_change());
        assert_eq!(env.contract().unwrap().as_str(), "jan26-silver");
    }
}
