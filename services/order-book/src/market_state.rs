//! Best-price snapshots and cache refresh
//!
//! Shared by the order book service and the matching engine: after any
//! mutation of a contract's book the caller refreshes here, and a
//! `market:price_changed` broadcast goes out only when one of the two best
//! prices actually moved.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;

use market_cache::{keys, EventBus, TtlCache};
use store::Store;
use types::contract::ContractId;
use types::events::{ChangeType, EventEnvelope, MarketEvent, OrderView, PriceChange};
use types::numeric::Price;
use types::order::{Order, Side};

/// Best bid / best offer for one contract; both absent when a side is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BestPrices {
    pub bid: Option<Price>,
    pub offer: Option<Price>,
}

/// Compute best prices over visible orders.
pub fn best_prices(orders: &[Order]) -> BestPrices {
    let bid = orders
        .iter()
        .filter(|o| o.is_visible() && o.side == Side::Bid)
        .map(|o| o.price)
        .max();
    let offer = orders
        .iter()
        .filter(|o| o.is_visible() && o.side == Side::Offer)
        .map(|o| o.price)
        .min();
    BestPrices { bid, offer }
}

/// Sort a contract's visible orders into display/matching order:
/// bids best-first (price desc, then oldest), offers best-first
/// (price asc, then oldest).
pub fn sort_book(orders: &mut Vec<Order>) {
    orders.retain(|o| o.is_visible());
    orders.sort_by(|a, b| match (a.side, b.side) {
        (Side::Bid, Side::Offer) => std::cmp::Ordering::Less,
        (Side::Offer, Side::Bid) => std::cmp::Ordering::Greater,
        (Side::Bid, Side::Bid) => b
            .price
            .cmp(&a.price)
            .then_with(|| a.created_at.cmp(&b.created_at)),
        (Side::Offer, Side::Offer) => a
            .price
            .cmp(&b.price)
            .then_with(|| a.created_at.cmp(&b.created_at)),
    });
}

/// Holds the authoritative previous best-price snapshot per contract and
/// pushes refreshed projections into the cache.
pub struct MarketState {
    store: Arc<Store>,
    cache: Arc<TtlCache>,
    bus: EventBus,
    snapshots: DashMap<ContractId, BestPrices>,
}

impl MarketState {
    pub fn new(store: Arc<Store>, cache: Arc<TtlCache>, bus: EventBus) -> Self {
        Self {
            store,
            cache,
            bus,
            snapshots: DashMap::new(),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn cache(&self) -> &TtlCache {
        &self.cache
    }

    /// Refresh the cached book and best prices for one contract.
    ///
    /// Returns the broadcast change when a best price moved; the cache is
    /// refreshed either way.
    pub fn refresh(&self, contract: &ContractId) -> Option<PriceChange> {
        let mut orders = self.store.visible_orders_for_contract(contract);
        sort_book(&mut orders);
        let best = best_prices(&orders);

        let views: Vec<OrderView> = orders.iter().map(OrderView::from).collect();
        self.cache
            .put(&keys::orderbook(contract), &views, keys::BOOK_TTL);
        self.cache
            .put(&keys::best_bid(contract), &best.bid, keys::BOOK_TTL);
        self.cache
            .put(&keys::best_offer(contract), &best.offer, keys::BOOK_TTL);
        self.cache.put(
            keys::HAS_ACTIVE_ORDERS,
            &self.store.has_active_orders(),
            keys::FLAG_TTL,
        );

        let previous = self
            .snapshots
            .insert(contract.clone(), best)
            .unwrap_or_default();
        if previous == best {
            return None;
        }

        let change = PriceChange {
            contract: contract.clone(),
            best_bid: best.bid,
            best_offer: best.offer,
            previous_best_bid: previous.bid,
            previous_best_offer: previous.offer,
            change_type: ChangeType {
                bid_changed: previous.bid != best.bid,
                offer_changed: previous.offer != best.offer,
            },
            timestamp: Utc::now(),
        };
        self.bus
            .publish(MarketEvent::PriceChanged(change.clone()));
        Some(change)
    }

    /// Current snapshot for a contract (empty when never refreshed).
    pub fn snapshot(&self, contract: &ContractId) -> BestPrices {
        self.snapshots
            .get(contract)
            .map(|s| *s)
            .unwrap_or_default()
    }

    /// Cached book for pass planning; `None` on a cache miss.
    pub fn cached_book(&self, contract: &ContractId) -> Option<Vec<OrderView>> {
        self.cache.get(&keys::orderbook(contract))
    }

    /// Drop the cached book after a write; the next reader re-reads the
    /// store.
    pub fn invalidate_book(&self, contract: &ContractId) {
        self.cache.remove(&keys::orderbook(contract));
    }

    /// Subscribe a consumer to everything published through this state.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<EventEnvelope> {
        self.bus.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration};
    use types::ids::UserId;
    use types::numeric::Lots;
    use types::user::User;

    fn ts() -> DateTime<Utc> {
        "2026-01-10T12:00:00Z".parse().unwrap()
    }

    fn contract() -> ContractId {
        ContractId::parse("jan26-silver").unwrap()
    }

    fn state() -> (Arc<Store>, MarketState) {
        let store = Arc::new(Store::ephemeral());
        let cache = Arc::new(TtlCache::new());
        let bus = EventBus::new();
        let market = MarketState::new(store.clone(), cache, bus);
        (store, market)
    }

    fn seed_order(store: &Store, side: Side, price: u64, qty: u32, offset_secs: i64) -> Order {
        let user = User::new("t");
        let owner = user.id;
        store.insert_user(user).unwrap();
        let order = Order::new(
            owner,
            contract(),
            side,
            Price::from_u64(price),
            Lots::new(qty),
            ts() + Duration::seconds(offset_secs),
            ts() + Duration::hours(24),
        );
        store.insert_order(order.clone()).unwrap();
        order
    }

    #[test]
    fn test_best_prices_empty_book() {
        assert_eq!(best_prices(&[]), BestPrices::default());
    }

    #[test]
    fn test_sort_book_price_time_priority() {
        let store = Store::ephemeral();
        let b1 = seed_order(&store, Side::Bid, 50, 5, 0);
        let b2 = seed_order(&store, Side::Bid, 50, 5, 10);
        let b3 = seed_order(&store, Side::Bid, 51, 5, 20);
        let o1 = seed_order(&store, Side::Offer, 60, 5, 0);
        let o2 = seed_order(&store, Side::Offer, 59, 5, 10);

        let mut book = store.visible_orders_for_contract(&contract());
        sort_book(&mut book);

        let ids: Vec<_> = book.iter().map(|o| o.id).collect();
        // Bids first: highest price, then oldest at a level. Offers after:
        // lowest price first.
        assert_eq!(ids, vec![b3.id, b1.id, b2.id, o2.id, o1.id]);
    }

    #[test]
    fn test_first_refresh_reports_change() {
        let (store, market) = state();
        seed_order(&store, Side::Bid, 100, 5, 0);

        let change = market.refresh(&contract()).unwrap();
        assert_eq!(change.best_bid, Some(Price::from_u64(100)));
        assert_eq!(change.previous_best_bid, None);
        assert!(change.change_type.bid_changed);
        assert!(!change.change_type.offer_changed);
    }

    #[test]
    fn test_refresh_without_movement_is_silent() {
        let (store, market) = state();
        seed_order(&store, Side::Bid, 100, 5, 0);
        market.refresh(&contract()).unwrap();

        // A deeper bid does not move the best price.
        seed_order(&store, Side::Bid, 99, 5, 10);
        assert!(market.refresh(&contract()).is_none());
    }

    #[test]
    fn test_refresh_updates_cache_even_when_silent() {
        let (store, market) = state();
        seed_order(&store, Side::Bid, 100, 5, 0);
        market.refresh(&contract()).unwrap();
        seed_order(&store, Side::Bid, 99, 5, 10);
        market.refresh(&contract());

        let book = market.cached_book(&contract()).unwrap();
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn test_create_then_cancel_restores_snapshot() {
        let (store, market) = state();
        let o = seed_order(&store, Side::Bid, 100, 5, 0);
        market.refresh(&contract());

        store
            .update_order(o.id, |row| -> Result<(), store::StoreError> {
                row.cancel(ts() + Duration::seconds(1));
                Ok(())
            })
            .unwrap();
        let change = market.refresh(&contract()).unwrap();
        assert_eq!(change.best_bid, None);
        assert_eq!(market.snapshot(&contract()), BestPrices::default());
    }
}
