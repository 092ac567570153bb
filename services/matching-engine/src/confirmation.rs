//! Quantity-confirmation state and the declined set
//!
//! When best bid and best offer meet on price but not on quantity, the
//! smaller party is asked once whether they will raise their quantity.
//! Exactly one confirmation may exist per (contract, bid, offer) key, and
//! a declined pair is not re-offered until one of its orders materially
//! changes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use types::contract::ContractId;
use types::errors::ConfirmationError;
use types::events::TradeSide;
use types::ids::{OrderId, UserId};
use types::numeric::{Lots, Price};
use types::order::Order;

/// Build the canonical pair key `contract:bid_id:offer_id`.
pub fn pair_key(contract: &ContractId, bid: OrderId, offer: OrderId) -> String {
    format!(
        "{}:{}:{}",
        contract,
        bid.as_uuid().simple(),
        offer.as_uuid().simple()
    )
}

/// The transient record of one outstanding quantity question.
#[derive(Debug, Clone)]
pub struct PendingConfirmation {
    pub key: String,
    pub contract: ContractId,
    pub bid_id: OrderId,
    pub offer_id: OrderId,
    /// BUY when the buyer is the smaller party
    pub smaller_side: TradeSide,
    pub smaller_user: UserId,
    pub larger_user: UserId,
    pub smaller_order: OrderId,
    pub larger_order: OrderId,
    pub smaller_qty: Lots,
    pub larger_qty: Lots,
    pub price: Price,
    pub deadline: DateTime<Utc>,
}

impl PendingConfirmation {
    pub fn additional_qty(&self) -> Lots {
        self.larger_qty.saturating_sub(self.smaller_qty)
    }

    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }

    /// Resolve the quantity a YES reply commits to. Absent means "raise
    /// to the counterparty's size"; an explicit value must stay within
    /// [current size, counterparty size] — responders never set their
    /// order beyond what the counterparty put up.
    pub fn confirmed_qty(&self, new_qty: Option<u32>) -> Result<Lots, ConfirmationError> {
        let target = match new_qty {
            Some(q) => Lots::try_new(q).ok_or_else(|| {
                ConfirmationError::Unparseable("quantity must be positive".into())
            })?,
            None => self.larger_qty,
        };
        if target < self.smaller_qty {
            return Err(ConfirmationError::Unparseable(
                "quantity is below your current order size".into(),
            ));
        }
        if target > self.larger_qty {
            return Err(ConfirmationError::Unparseable(
                "quantity exceeds the counterparty's order size".into(),
            ));
        }
        Ok(target)
    }
}

/// What an order looked like when its pair was declined. A declined entry
/// only suppresses re-offers while both fingerprints still hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    price: Price,
    remaining: Lots,
}

impl Fingerprint {
    fn of(order: &Order) -> Self {
        Self {
            price: order.price,
            remaining: order.remaining_qty,
        }
    }

    fn still_matches(&self, order: &Order) -> bool {
        order.is_active() && Fingerprint::of(order) == *self
    }
}

#[derive(Debug, Clone)]
struct DeclinedEntry {
    bid: Fingerprint,
    offer: Fingerprint,
}

/// All confirmation state. Owned exclusively by the matching engine.
#[derive(Default)]
pub struct ConfirmationBook {
    pending: HashMap<String, PendingConfirmation>,
    declined: HashMap<String, DeclinedEntry>,
}

impl ConfirmationBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this pair was declined and neither order has changed since.
    /// Stale entries are dropped on the way through.
    pub fn is_declined(&mut self, key: &str, bid: &Order, offer: &Order) -> bool {
        match self.declined.get(key) {
            Some(entry)
                if entry.bid.still_matches(bid) && entry.offer.still_matches(offer) =>
            {
                true
            }
            Some(_) => {
                self.declined.remove(key);
                false
            }
            None => false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&PendingConfirmation> {
        self.pending.get(key)
    }

    pub fn has_pending(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }

    /// Record a new pending confirmation. Refused when one already exists
    /// for this key.
    pub fn open(&mut self, pending: PendingConfirmation) -> Result<(), ConfirmationError> {
        if self.pending.contains_key(&pending.key) {
            return Err(ConfirmationError::Duplicate);
        }
        self.pending.insert(pending.key.clone(), pending);
        Ok(())
    }

    /// Remove and return a pending confirmation on its terminal transition.
    pub fn take(&mut self, key: &str) -> Option<PendingConfirmation> {
        self.pending.remove(key)
    }

    /// Memoize a declined pair so it is not re-offered while unchanged.
    pub fn mark_declined(&mut self, key: &str, bid: &Order, offer: &Order) {
        self.declined.insert(
            key.to_string(),
            DeclinedEntry {
                bid: Fingerprint::of(bid),
                offer: Fingerprint::of(offer),
            },
        );
    }

    /// Drop a declined entry (renegotiation accepted).
    pub fn clear_declined(&mut self, key: &str) {
        self.declined.remove(key);
    }

    /// Resolve a messaging-channel reply: the sender plus an order-id
    /// prefix name exactly the confirmation whose smaller order is theirs.
    pub fn find_for_prefix(&self, user: UserId, prefix: &str) -> Option<&PendingConfirmation> {
        self.pending
            .values()
            .find(|p| p.smaller_user == user && p.smaller_order.matches_prefix(prefix))
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use types::order::Side;

    fn ts() -> DateTime<Utc> {
        "2026-01-10T12:00:00Z".parse().unwrap()
    }

    fn contract() -> ContractId {
        ContractId::parse("jan26-silver").unwrap()
    }

    fn order(side: Side, price: u64, qty: u32) -> Order {
        Order::new(
            UserId::new(),
            contract(),
            side,
            Price::from_u64(price),
            Lots::new(qty),
            ts(),
            ts() + Duration::hours(24),
        )
    }

    fn pending_for(bid: &Order, offer: &Order) -> PendingConfirmation {
        PendingConfirmation {
            key: pair_key(&contract(), bid.id, offer.id),
            contract: contract(),
            bid_id: bid.id,
            offer_id: offer.id,
            smaller_side: TradeSide::Buy,
            smaller_user: bid.owner,
            larger_user: offer.owner,
            smaller_order: bid.id,
            larger_order: offer.id,
            smaller_qty: bid.remaining_qty,
            larger_qty: offer.remaining_qty,
            price: offer.price,
            deadline: ts() + Duration::seconds(60),
        }
    }

    #[test]
    fn test_pair_key_shape() {
        let bid = order(Side::Bid, 100, 15);
        let offer = order(Side::Offer, 100, 50);
        let key = pair_key(&contract(), bid.id, offer.id);
        assert!(key.starts_with("jan26-silver:"));
        assert_eq!(key.split(':').count(), 3);
    }

    #[test]
    fn test_duplicate_open_refused() {
        let bid = order(Side::Bid, 100, 15);
        let offer = order(Side::Offer, 100, 50);
        let mut book = ConfirmationBook::new();

        book.open(pending_for(&bid, &offer)).unwrap();
        let err = book.open(pending_for(&bid, &offer)).unwrap_err();
        assert_eq!(err, ConfirmationError::Duplicate);
        assert_eq!(book.pending_count(), 1);
    }

    #[test]
    fn test_take_is_terminal() {
        let bid = order(Side::Bid, 100, 15);
        let offer = order(Side::Offer, 100, 50);
        let mut book = ConfirmationBook::new();
        let pending = pending_for(&bid, &offer);
        let key = pending.key.clone();

        book.open(pending).unwrap();
        assert!(book.take(&key).is_some());
        assert!(book.take(&key).is_none());
    }

    #[test]
    fn test_declined_suppresses_while_unchanged() {
        let bid = order(Side::Bid, 100, 15);
        let offer = order(Side::Offer, 100, 50);
        let key = pair_key(&contract(), bid.id, offer.id);
        let mut book = ConfirmationBook::new();

        book.mark_declined(&key, &bid, &offer);
        assert!(book.is_declined(&key, &bid, &offer));
        // Still suppressed on a second look.
        assert!(book.is_declined(&key, &bid, &offer));
    }

    #[test]
    fn test_declined_cleared_by_price_change() {
        let bid = order(Side::Bid, 100, 15);
        let offer = order(Side::Offer, 100, 50);
        let key = pair_key(&contract(), bid.id, offer.id);
        let mut book = ConfirmationBook::new();

        book.mark_declined(&key, &bid, &offer);
        let mut repriced = bid.clone();
        repriced.reprice(Price::from_u64(101), ts());
        assert!(!book.is_declined(&key, &repriced, &offer));
        // The stale entry is gone for good.
        assert!(!book.is_declined(&key, &bid, &offer));
    }

    #[test]
    fn test_declined_cleared_by_termination() {
        let bid = order(Side::Bid, 100, 15);
        let offer = order(Side::Offer, 100, 50);
        let key = pair_key(&contract(), bid.id, offer.id);
        let mut book = ConfirmationBook::new();

        book.mark_declined(&key, &bid, &offer);
        let mut cancelled = offer.clone();
        cancelled.cancel(ts());
        assert!(!book.is_declined(&key, &bid, &cancelled));
    }

    #[test]
    fn test_clear_declined_reopens_pair() {
        let bid = order(Side::Bid, 100, 15);
        let offer = order(Side::Offer, 100, 50);
        let key = pair_key(&contract(), bid.id, offer.id);
        let mut book = ConfirmationBook::new();

        book.mark_declined(&key, &bid, &offer);
        book.clear_declined(&key);
        assert!(!book.is_declined(&key, &bid, &offer));
    }

    #[test]
    fn test_find_for_prefix_checks_owner_and_order() {
        let bid = order(Side::Bid, 100, 15);
        let offer = order(Side::Offer, 100, 50);
        let mut book = ConfirmationBook::new();
        let pending = pending_for(&bid, &offer);
        book.open(pending).unwrap();

        let prefix = bid.id.short();
        assert!(book.find_for_prefix(bid.owner, &prefix).is_some());
        // Wrong user, right prefix.
        assert!(book.find_for_prefix(offer.owner, &prefix).is_none());
        // Right user, wrong prefix.
        assert!(book.find_for_prefix(bid.owner, "ffffffff").is_none());
    }

    #[test]
    fn test_deadline_boundary_is_inclusive() {
        let bid = order(Side::Bid, 100, 15);
        let offer = order(Side::Offer, 100, 50);
        let pending = pending_for(&bid, &offer);

        assert!(!pending.is_past_deadline(pending.deadline - Duration::seconds(1)));
        // Exactly at the deadline counts as past it.
        assert!(pending.is_past_deadline(pending.deadline));
    }

    #[test]
    fn test_additional_qty() {
        let bid = order(Side::Bid, 100, 15);
        let offer = order(Side::Offer, 100, 50);
        let pending = pending_for(&bid, &offer);
        assert_eq!(pending.additional_qty(), Lots::new(35));
    }

    #[test]
    fn test_confirmed_qty_bounds() {
        let bid = order(Side::Bid, 100, 15);
        let offer = order(Side::Offer, 100, 50);
        let pending = pending_for(&bid, &offer);

        // Absent means the counterparty's size.
        assert_eq!(pending.confirmed_qty(None).unwrap(), Lots::new(50));
        assert_eq!(pending.confirmed_qty(Some(50)).unwrap(), Lots::new(50));
        // Keeping the current size is allowed (no-op lift).
        assert_eq!(pending.confirmed_qty(Some(15)).unwrap(), Lots::new(15));
        // Below current, above counterparty, and zero are all refused.
        assert!(pending.confirmed_qty(Some(14)).is_err());
        assert!(pending.confirmed_qty(Some(51)).is_err());
        assert!(pending.confirmed_qty(Some(0)).is_err());
    }
}
