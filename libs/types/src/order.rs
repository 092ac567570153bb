//! Order lifecycle types
//!
//! Orders are created `Active` and end in exactly one of the terminal
//! states: `Matched` (fully filled), `Cancelled` (owner action), or
//! `Expired` (deadline passed). Terminal states are absorbing.

use crate::contract::ContractId;
use crate::ids::{OrderId, UserId};
use crate::numeric::{Lots, Price};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side (buy intent or sell intent)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy order
    Bid,
    /// Sell order
    Offer,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Bid => Side::Offer,
            Side::Offer => Side::Bid,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bid => write!(f, "BID"),
            Side::Offer => write!(f, "OFFER"),
        }
    }
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Live and visible to the matcher
    Active,
    /// Fully filled (terminal)
    Matched,
    /// Cancelled by the owner (terminal)
    Cancelled,
    /// Expiry deadline passed (terminal)
    Expired,
}

impl OrderStatus {
    /// Check if status is terminal (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Active)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Active => write!(f, "ACTIVE"),
            OrderStatus::Matched => write!(f, "MATCHED"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
            OrderStatus::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// A resting limit order for one contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub owner: UserId,
    pub contract: ContractId,
    pub side: Side,
    pub price: Price,
    pub original_qty: Lots,
    pub remaining_qty: Lots,
    pub status: OrderStatus,
    /// Set when the order reaches `Matched`
    pub counterparty: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a new active order
    pub fn new(
        owner: UserId,
        contract: ContractId,
        side: Side,
        price: Price,
        qty: Lots,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OrderId::new(),
            owner,
            contract,
            side,
            price,
            original_qty: qty,
            remaining_qty: qty,
            status: OrderStatus::Active,
            counterparty: None,
            created_at,
            expires_at,
            updated_at: created_at,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == OrderStatus::Active
    }

    /// Visible to the matcher and to market-data consumers.
    pub fn is_visible(&self) -> bool {
        self.is_active() && !self.remaining_qty.is_zero()
    }

    pub fn has_fills(&self) -> bool {
        self.remaining_qty < self.original_qty
    }

    pub fn filled_qty(&self) -> Lots {
        self.original_qty.saturating_sub(self.remaining_qty)
    }

    /// Fill accounting: remaining never exceeds original.
    pub fn check_invariant(&self) -> bool {
        self.remaining_qty <= self.original_qty
    }

    /// Reduce remaining quantity by a fill, transitioning to `Matched`
    /// when nothing is left.
    ///
    /// # Panics
    /// Panics on a fill against an inactive order or exceeding remaining.
    pub fn apply_fill(&mut self, qty: Lots, counterparty: UserId, timestamp: DateTime<Utc>) {
        assert!(self.is_active(), "Fill against inactive order");
        self.remaining_qty = self
            .remaining_qty
            .checked_sub(qty)
            .expect("Fill would exceed remaining quantity");
        if self.remaining_qty.is_zero() {
            self.status = OrderStatus::Matched;
            self.counterparty = Some(counterparty);
        }
        self.updated_at = timestamp;
        assert!(self.check_invariant(), "Invariant violated after fill");
    }

    /// Replace the limit price. Allowed only while `Active`.
    pub fn reprice(&mut self, price: Price, timestamp: DateTime<Utc>) {
        assert!(self.is_active(), "Reprice of inactive order");
        self.price = price;
        self.updated_at = timestamp;
    }

    /// Replace the original quantity, clamping remaining to the new size.
    ///
    /// Callers must reject resizes of `original_qty` once fills have
    /// occurred; the quantity-confirmation lift goes through here after the
    /// no-fills check because it raises both quantities together.
    pub fn resize(&mut self, qty: Lots, timestamp: DateTime<Utc>) {
        assert!(self.is_active(), "Resize of inactive order");
        self.original_qty = qty;
        if self.remaining_qty > qty {
            self.remaining_qty = qty;
        }
        self.updated_at = timestamp;
    }

    /// Raise both original and remaining quantity to `qty` (confirmation
    /// accept path).
    pub fn lift_to(&mut self, qty: Lots, timestamp: DateTime<Utc>) {
        assert!(self.is_active(), "Lift of inactive order");
        self.original_qty = qty;
        self.remaining_qty = qty;
        self.updated_at = timestamp;
    }

    /// # Panics
    /// Panics if the order is already terminal
    pub fn cancel(&mut self, timestamp: DateTime<Utc>) {
        assert!(self.is_active(), "Cannot cancel terminal order");
        self.status = OrderStatus::Cancelled;
        self.updated_at = timestamp;
    }

    /// # Panics
    /// Panics if the order is already terminal
    pub fn expire(&mut self, timestamp: DateTime<Utc>) {
        assert!(self.is_active(), "Cannot expire terminal order");
        self.status = OrderStatus::Expired;
        self.updated_at = timestamp;
    }

    /// Whether the expiry deadline has passed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
