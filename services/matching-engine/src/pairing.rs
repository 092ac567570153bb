//! Best-pair selection
//!
//! Pure functions over a contract's visible orders. Price beats time,
//! earlier time wins, and a pairing that would trade an owner with
//! themselves is skipped in favor of the next-best counterparty.

use types::order::{Order, Side};

/// Outcome of scanning one contract's book.
#[derive(Debug, Clone)]
pub enum PairOutcome {
    /// One or both sides empty, or no pairing with distinct owners exists.
    Empty,
    /// Best eligible pair does not cross; carries the pair for alerting.
    Spread { bid: Order, offer: Order },
    /// Best eligible pair crosses or meets; trade or confirmation follows.
    Crossed { bid: Order, offer: Order },
}

/// Bids in matching priority: highest price first, then oldest.
pub fn sorted_bids(orders: &[Order]) -> Vec<&Order> {
    let mut bids: Vec<&Order> = orders
        .iter()
        .filter(|o| o.is_visible() && o.side == Side::Bid)
        .collect();
    bids.sort_by(|a, b| {
        b.price
            .cmp(&a.price)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
    bids
}

/// Offers in matching priority: lowest price first, then oldest.
pub fn sorted_offers(orders: &[Order]) -> Vec<&Order> {
    let mut offers: Vec<&Order> = orders
        .iter()
        .filter(|o| o.is_visible() && o.side == Side::Offer)
        .collect();
    offers.sort_by(|a, b| {
        a.price
            .cmp(&b.price)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
    offers
}

/// Select the best bid/offer pairing with distinct owners.
///
/// Crossing pairs are searched over the whole book in priority order: a
/// same-owner pairing at the top must not hide a crossing pair further
/// down either side. Only when nothing crosses does the book report its
/// independent best prices for alerting.
pub fn select_pair(orders: &[Order]) -> PairOutcome {
    let bids = sorted_bids(orders);
    let offers = sorted_offers(orders);

    for bid in &bids {
        for offer in &offers {
            if offer.price > bid.price {
                // Offers are price-sorted; nothing later crosses this bid.
                break;
            }
            if bid.owner != offer.owner {
                return PairOutcome::Crossed {
                    bid: (*bid).clone(),
                    offer: (*offer).clone(),
                };
            }
        }
    }

    // Nothing crosses. The spread pair is the independent best of each
    // side; when one owner tops both sides, advance whichever side
    // yields the tighter eligible spread.
    let (Some(&best_bid), Some(&best_offer)) = (bids.first(), offers.first()) else {
        return PairOutcome::Empty;
    };
    if best_bid.owner != best_offer.owner {
        return PairOutcome::Spread {
            bid: best_bid.clone(),
            offer: best_offer.clone(),
        };
    }
    let next_bid = bids.iter().find(|b| b.owner != best_offer.owner);
    let next_offer = offers.iter().find(|o| o.owner != best_bid.owner);
    match (next_bid, next_offer) {
        (None, None) => PairOutcome::Empty,
        (Some(bid), None) => PairOutcome::Spread {
            bid: (*bid).clone(),
            offer: best_offer.clone(),
        },
        (None, Some(offer)) => PairOutcome::Spread {
            bid: best_bid.clone(),
            offer: (*offer).clone(),
        },
        (Some(bid), Some(offer)) => {
            let keep_bid = offer.price.as_decimal() - best_bid.price.as_decimal();
            let keep_offer = best_offer.price.as_decimal() - bid.price.as_decimal();
            if keep_bid <= keep_offer {
                PairOutcome::Spread {
                    bid: best_bid.clone(),
                    offer: (*offer).clone(),
                }
            } else {
                PairOutcome::Spread {
                    bid: (*bid).clone(),
                    offer: best_offer.clone(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use types::contract::ContractId;
    use types::ids::UserId;
    use types::numeric::{Lots, Price};

    fn ts() -> DateTime<Utc> {
        "2026-01-10T12:00:00Z".parse().unwrap()
    }

    fn order(owner: UserId, side: Side, price: u64, qty: u32, age_secs: i64) -> Order {
        Order::new(
            owner,
            ContractId::parse("jan26-silver").unwrap(),
            side,
            Price::from_u64(price),
            Lots::new(qty),
            ts() + Duration::seconds(age_secs),
            ts() + Duration::hours(24),
        )
    }

    #[test]
    fn test_empty_book() {
        assert!(matches!(select_pair(&[]), PairOutcome::Empty));
    }

    #[test]
    fn test_one_sided_book() {
        let orders = vec![order(UserId::new(), Side::Bid, 100, 10, 0)];
        assert!(matches!(select_pair(&orders), PairOutcome::Empty));
    }

    #[test]
    fn test_equal_prices_cross() {
        let buyer = UserId::new();
        let seller = UserId::new();
        let orders = vec![
            order(buyer, Side::Bid, 100, 10, 0),
            order(seller, Side::Offer, 100, 10, 1),
        ];
        match select_pair(&orders) {
            PairOutcome::Crossed { bid, offer } => {
                assert_eq!(bid.owner, buyer);
                assert_eq!(offer.owner, seller);
            }
            other => panic!("expected Crossed, got {:?}", other),
        }
    }

    #[test]
    fn test_spread_reports_best_pair() {
        let orders = vec![
            order(UserId::new(), Side::Bid, 95, 10, 0),
            order(UserId::new(), Side::Bid, 90, 10, 1),
            order(UserId::new(), Side::Offer, 100, 10, 0),
            order(UserId::new(), Side::Offer, 105, 10, 1),
        ];
        match select_pair(&orders) {
            PairOutcome::Spread { bid, offer } => {
                assert_eq!(bid.price, Price::from_u64(95));
                assert_eq!(offer.price, Price::from_u64(100));
            }
            other => panic!("expected Spread, got {:?}", other),
        }
    }

    #[test]
    fn test_price_time_priority_at_a_level() {
        let early = UserId::new();
        let late = UserId::new();
        let seller = UserId::new();
        let orders = vec![
            order(late, Side::Bid, 50, 5, 10),
            order(early, Side::Bid, 50, 5, 0),
            order(seller, Side::Offer, 50, 5, 20),
        ];
        match select_pair(&orders) {
            PairOutcome::Crossed { bid, .. } => assert_eq!(bid.owner, early),
            other => panic!("expected Crossed, got {:?}", other),
        }
    }

    #[test]
    fn test_self_trade_skipped_entirely() {
        // One user on both sides of the only possible pairing.
        let owner = UserId::new();
        let orders = vec![
            order(owner, Side::Bid, 50, 10, 0),
            order(owner, Side::Offer, 50, 10, 1),
        ];
        assert!(matches!(select_pair(&orders), PairOutcome::Empty));
    }

    #[test]
    fn test_self_trade_falls_to_next_counterparty() {
        let shared = UserId::new();
        let other = UserId::new();
        let orders = vec![
            order(shared, Side::Bid, 100, 10, 0),
            order(other, Side::Bid, 100, 10, 5),
            order(shared, Side::Offer, 100, 10, 0),
        ];
        match select_pair(&orders) {
            PairOutcome::Crossed { bid, offer } => {
                // The shared owner's bid is older but cannot pair with
                // their own offer; the later bid trades instead.
                assert_eq!(bid.owner, other);
                assert_eq!(offer.owner, shared);
            }
            other => panic!("expected Crossed, got {:?}", other),
        }
    }

    #[test]
    fn test_same_owner_top_pair_does_not_hide_crossing_pair() {
        let shared = UserId::new();
        let other = UserId::new();
        let third = UserId::new();
        // The oldest bid and the best offer share an owner; the younger
        // bid at the same price still crosses that offer and must trade.
        let orders = vec![
            order(shared, Side::Bid, 100, 10, 0),
            order(other, Side::Bid, 100, 10, 5),
            order(shared, Side::Offer, 100, 10, 0),
            order(third, Side::Offer, 101, 10, 5),
        ];
        match select_pair(&orders) {
            PairOutcome::Crossed { bid, offer } => {
                assert_eq!(bid.owner, other);
                assert_eq!(offer.owner, shared);
                assert_eq!(offer.price, Price::from_u64(100));
            }
            outcome => panic!("expected Crossed, got {:?}", outcome),
        }
    }

    #[test]
    fn test_shared_top_spread_advances_tighter_side() {
        let shared = UserId::new();
        let other = UserId::new();
        // One owner tops both sides with no cross anywhere. Advancing the
        // bid (92 -> 100) is tighter than advancing the offer (95 -> 105).
        let orders = vec![
            order(shared, Side::Bid, 95, 10, 0),
            order(other, Side::Bid, 92, 10, 5),
            order(shared, Side::Offer, 100, 10, 0),
            order(other, Side::Offer, 105, 10, 5),
        ];
        match select_pair(&orders) {
            PairOutcome::Spread { bid, offer } => {
                assert_eq!(bid.price, Price::from_u64(92));
                assert_eq!(offer.price, Price::from_u64(100));
                assert_ne!(bid.owner, offer.owner);
            }
            outcome => panic!("expected Spread, got {:?}", outcome),
        }
    }

    #[test]
    fn test_matched_orders_are_invisible() {
        let buyer = UserId::new();
        let seller = UserId::new();
        let mut filled = order(buyer, Side::Bid, 100, 10, 0);
        filled.apply_fill(Lots::new(10), seller, ts());
        let orders = vec![filled, order(seller, Side::Offer, 100, 10, 1)];
        assert!(matches!(select_pair(&orders), PairOutcome::Empty));
    }

    #[test]
    fn test_crossed_prices_trade_at_offer() {
        let buyer = UserId::new();
        let seller = UserId::new();
        let orders = vec![
            order(buyer, Side::Bid, 105, 10, 0),
            order(seller, Side::Offer, 100, 10, 1),
        ];
        match select_pair(&orders) {
            PairOutcome::Crossed { bid, offer } => {
                assert_eq!(bid.price, Price::from_u64(105));
                assert_eq!(offer.price, Price::from_u64(100));
            }
            other => panic!("expected Crossed, got {:?}", other),
        }
    }
}
