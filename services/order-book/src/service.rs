//! Order book service: the single writer for order state
//!
//! Validates and records lifecycle operations, publishes lifecycle events,
//! keeps per-contract best-price snapshots current, and nudges the matching
//! engine after every write.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use market_cache::EventBus;
use store::Store;
use types::config::EngineConfig;
use types::contract::ContractId;
use types::errors::OrderError;
use types::events::{MarketEvent, OrderView};
use types::ids::{OrderId, UserId};
use types::numeric::Price;
use types::order::{Order, Side};
use types::trade::Trade;

use crate::market_state::{sort_book, MarketState};
use crate::requests::{CreateOrderRequest, UpdateOrderRequest};
use crate::validate::{validate_create, validate_expiry, validate_price, validate_qty};

/// One contract's visible book, sorted for display.
#[derive(Debug, Clone, Serialize)]
pub struct ContractBook {
    pub contract: ContractId,
    pub bids: Vec<OrderView>,
    pub offers: Vec<OrderView>,
    pub best_bid: Option<Price>,
    pub best_offer: Option<Price>,
}

/// Per-user account overview.
#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub user: UserId,
    pub name: String,
    pub active_order_count: usize,
    pub open_bid_lots: u32,
    pub open_offer_lots: u32,
    pub recent_trades: Vec<Trade>,
}

pub struct OrderBookService {
    store: Arc<Store>,
    market: Arc<MarketState>,
    bus: EventBus,
    match_tx: Option<mpsc::UnboundedSender<ContractId>>,
    config: EngineConfig,
}

impl OrderBookService {
    pub fn new(
        store: Arc<Store>,
        market: Arc<MarketState>,
        match_tx: Option<mpsc::UnboundedSender<ContractId>>,
        config: EngineConfig,
    ) -> Self {
        let bus = market.bus().clone();
        Self {
            store,
            market,
            bus,
            match_tx,
            config,
        }
    }

    /// Validate, persist, announce, and schedule matching for a new order.
    pub fn create_order(
        &self,
        owner: UserId,
        req: CreateOrderRequest,
    ) -> Result<OrderView, OrderError> {
        let now = Utc::now();
        let valid = validate_create(
            req.price,
            &req.monthyear,
            &req.product,
            req.qty,
            req.expires_at,
            self.config.order_expiry_hours,
            now,
        )?;

        let active = self.store.active_order_count(owner);
        if active >= self.config.max_orders_per_user {
            return Err(OrderError::LimitExceeded {
                limit: self.config.max_orders_per_user,
            });
        }

        let order = Order::new(
            owner,
            valid.contract,
            req.side,
            valid.price,
            valid.qty,
            now,
            valid.expires_at,
        );
        self.store.insert_order(order.clone())?;
        info!(order = %order.id, contract = %order.contract, side = %order.side, "order created");

        let view = OrderView::from(&order);
        self.bus.publish(MarketEvent::OrderCreated(view.clone()));
        self.market.refresh(&order.contract);
        self.trigger_match(order.contract.clone());
        Ok(view)
    }

    /// Mutate price, quantity, or expiry of an active order.
    pub fn update_order(
        &self,
        owner: UserId,
        order_id: OrderId,
        req: UpdateOrderRequest,
    ) -> Result<OrderView, OrderError> {
        if req.is_empty() {
            return Err(OrderError::invalid("update", "no fields to change"));
        }
        let now = Utc::now();
        let touches_book = req.touches_book();

        let (_, after) = self.store.update_order(order_id, |order| {
            check_owned_active(order, owner)?;
            if let Some(price) = req.price {
                order.reprice(validate_price(price)?, now);
            }
            if let Some(qty) = req.qty {
                if order.has_fills() {
                    return Err(OrderError::invalid(
                        "qty",
                        "order already has fills; quantity is locked",
                    ));
                }
                order.resize(validate_qty(qty)?, now);
            }
            if let Some(at) = req.expires_at {
                order.expires_at = validate_expiry(at, now)?;
                order.updated_at = now;
            }
            Ok(())
        })?;

        info!(order = %after.id, contract = %after.contract, "order updated");
        let view = OrderView::from(&after);
        self.bus.publish(MarketEvent::OrderUpdated(view.clone()));
        self.market.refresh(&after.contract);
        if touches_book {
            self.trigger_match(after.contract.clone());
        }
        Ok(view)
    }

    /// Cancel an active order owned by the caller.
    pub fn cancel_order(&self, owner: UserId, order_id: OrderId) -> Result<OrderView, OrderError> {
        let now = Utc::now();
        let (_, after) = self.store.update_order(order_id, |order| {
            check_owned_active(order, owner)?;
            order.cancel(now);
            Ok::<(), OrderError>(())
        })?;

        info!(order = %after.id, contract = %after.contract, "order cancelled");
        let view = OrderView::from(&after);
        self.bus.publish(MarketEvent::OrderCancelled(view.clone()));
        self.market.refresh(&after.contract);
        Ok(view)
    }

    // ── Read views ──────────────────────────────────────────────────

    pub fn user_orders(&self, owner: UserId) -> Vec<OrderView> {
        let mut orders = self.store.orders_for_user(owner);
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders.iter().map(OrderView::from).collect()
    }

    /// All contracts with visible orders, each book sorted bids
    /// best-first then offers best-first.
    pub fn market_data(&self) -> Vec<ContractBook> {
        let mut books = BTreeMap::new();
        for contract in self.store.contracts_with_active_orders() {
            let mut orders = self.store.visible_orders_for_contract(&contract);
            sort_book(&mut orders);
            let best = crate::market_state::best_prices(&orders);
            let (bids, offers): (Vec<&Order>, Vec<&Order>) =
                orders.iter().partition(|o| o.side == Side::Bid);
            books.insert(
                contract.clone(),
                ContractBook {
                    contract,
                    bids: bids.into_iter().map(OrderView::from).collect(),
                    offers: offers.into_iter().map(OrderView::from).collect(),
                    best_bid: best.bid,
                    best_offer: best.offer,
                },
            );
        }
        books.into_values().collect()
    }

    pub fn recent_trades(&self, limit: usize) -> Vec<Trade> {
        self.store.recent_trades(limit)
    }

    pub fn user_trades(&self, owner: UserId, limit: usize) -> Vec<Trade> {
        self.store.trades_for_user(owner, limit)
    }

    pub fn account_summary(&self, owner: UserId) -> Result<AccountSummary, OrderError> {
        let user = self.store.user(owner).ok_or(OrderError::NotFound)?;
        let orders = self.store.orders_for_user(owner);
        let open = |side: Side| -> u32 {
            orders
                .iter()
                .filter(|o| o.is_visible() && o.side == side)
                .map(|o| o.remaining_qty.get())
                .sum()
        };
        Ok(AccountSummary {
            user: owner,
            name: user.name,
            active_order_count: orders.iter().filter(|o| o.is_active()).count(),
            open_bid_lots: open(Side::Bid),
            open_offer_lots: open(Side::Offer),
            recent_trades: self.store.trades_for_user(owner, 10),
        })
    }

    // ── Maintenance ─────────────────────────────────────────────────

    /// Expire overdue orders, announcing each and refreshing the books
    /// they sat on. Returns the number expired.
    pub fn expire_due(&self, now: DateTime<Utc>) -> Result<usize, OrderError> {
        let expired = self.store.expire_due_orders(now)?;
        let mut contracts: Vec<ContractId> =
            expired.iter().map(|o| o.contract.clone()).collect();
        contracts.sort();
        contracts.dedup();

        for order in &expired {
            info!(order = %order.id, "order expired");
            self.bus
                .publish(MarketEvent::OrderUpdated(OrderView::from(order)));
        }
        for contract in contracts {
            self.market.refresh(&contract);
        }
        Ok(expired.len())
    }

    fn trigger_match(&self, contract: ContractId) {
        if let Some(tx) = &self.match_tx {
            if tx.send(contract).is_err() {
                warn!("matching engine is gone; pass request dropped");
            }
        }
    }
}

/// Ownership masquerades as absence: callers never learn whether an id
/// they don't own exists.
fn check_owned_active(order: &Order, owner: UserId) -> Result<(), OrderError> {
    if order.owner != owner {
        return Err(OrderError::NotFound);
    }
    if !order.is_active() {
        return Err(OrderError::Immutable {
            status: order.status,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_cache::TtlCache;
    use rust_decimal::Decimal;
    use types::numeric::Lots;
    use types::order::OrderStatus;
    use types::user::User;

    struct Harness {
        store: Arc<Store>,
        service: OrderBookService,
        match_rx: mpsc::UnboundedReceiver<ContractId>,
    }

    fn harness() -> Harness {
        let store = Arc::new(Store::ephemeral());
        let cache = Arc::new(TtlCache::new());
        let bus = EventBus::new();
        let market = Arc::new(MarketState::new(store.clone(), cache, bus));
        let (tx, rx) = mpsc::unbounded_channel();
        let service = OrderBookService::new(
            store.clone(),
            market,
            Some(tx),
            EngineConfig::default(),
        );
        Harness {
            store,
            service,
            match_rx: rx,
        }
    }

    fn seed_user(store: &Store) -> UserId {
        let user = User::new("trader");
        let id = user.id;
        store.insert_user(user).unwrap();
        id
    }

    fn bid(price: u64, qty: u32) -> CreateOrderRequest {
        CreateOrderRequest {
            side: Side::Bid,
            price: Decimal::from(price),
            monthyear: "jan26".into(),
            product: "silver".into(),
            qty,
            expires_at: None,
        }
    }

    #[test]
    fn test_create_order_persists_and_schedules_match() {
        let mut h = harness();
        let owner = seed_user(&h.store);

        let view = h.service.create_order(owner, bid(100, 50)).unwrap();
        assert_eq!(view.status, OrderStatus::Active);
        assert_eq!(view.contract.as_str(), "jan26-silver");
        assert_eq!(view.remaining_qty, Lots::new(50));

        // Row landed in the store and a pass was requested.
        assert!(h.store.order(view.id).is_some());
        assert_eq!(
            h.match_rx.try_recv().unwrap().as_str(),
            "jan26-silver"
        );
    }

    #[test]
    fn test_create_order_validation_has_no_side_effects() {
        let mut h = harness();
        let owner = seed_user(&h.store);

        let err = h
            .service
            .create_order(
                owner,
                CreateOrderRequest {
                    qty: 0,
                    ..bid(100, 1)
                },
            )
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidInput { field: "qty", .. }));
        assert!(h.store.orders_for_user(owner).is_empty());
        assert!(h.match_rx.try_recv().is_err());
    }

    #[test]
    fn test_active_order_cap() {
        let h = harness();
        let owner = seed_user(&h.store);
        let config = EngineConfig {
            max_orders_per_user: 2,
            ..EngineConfig::default()
        };
        let service = OrderBookService::new(
            h.store.clone(),
            Arc::new(MarketState::new(
                h.store.clone(),
                Arc::new(TtlCache::new()),
                EventBus::new(),
            )),
            None,
            config,
        );

        service.create_order(owner, bid(100, 1)).unwrap();
        service.create_order(owner, bid(101, 1)).unwrap();
        let err = service.create_order(owner, bid(102, 1)).unwrap_err();
        assert!(matches!(err, OrderError::LimitExceeded { limit: 2 }));
    }

    #[test]
    fn test_update_clamps_remaining() {
        let h = harness();
        let owner = seed_user(&h.store);
        let view = h.service.create_order(owner, bid(100, 50)).unwrap();

        let updated = h
            .service
            .update_order(
                owner,
                view.id,
                UpdateOrderRequest {
                    qty: Some(20),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.original_qty, Lots::new(20));
        assert_eq!(updated.remaining_qty, Lots::new(20));
    }

    #[test]
    fn test_update_requires_ownership() {
        let h = harness();
        let owner = seed_user(&h.store);
        let stranger = seed_user(&h.store);
        let view = h.service.create_order(owner, bid(100, 50)).unwrap();

        let err = h
            .service
            .update_order(
                stranger,
                view.id,
                UpdateOrderRequest {
                    price: Some(Decimal::from(120)),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(err, OrderError::NotFound);
        // Untouched.
        assert_eq!(
            h.store.order(view.id).unwrap().price,
            Price::from_u64(100)
        );
    }

    #[test]
    fn test_cancel_then_further_ops_are_immutable() {
        let h = harness();
        let owner = seed_user(&h.store);
        let view = h.service.create_order(owner, bid(100, 50)).unwrap();

        h.service.cancel_order(owner, view.id).unwrap();
        let err = h.service.cancel_order(owner, view.id).unwrap_err();
        assert!(matches!(
            err,
            OrderError::Immutable {
                status: OrderStatus::Cancelled
            }
        ));
    }

    #[test]
    fn test_market_data_excludes_invisible_orders() {
        let h = harness();
        let owner = seed_user(&h.store);
        let kept = h.service.create_order(owner, bid(100, 50)).unwrap();
        let gone = h.service.create_order(owner, bid(99, 10)).unwrap();
        h.service.cancel_order(owner, gone.id).unwrap();

        let books = h.service.market_data();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].bids.len(), 1);
        assert_eq!(books[0].bids[0].id, kept.id);
        assert_eq!(books[0].best_bid, Some(Price::from_u64(100)));
        assert_eq!(books[0].best_offer, None);
    }

    #[test]
    fn test_update_empty_request_rejected() {
        let h = harness();
        let owner = seed_user(&h.store);
        let view = h.service.create_order(owner, bid(100, 50)).unwrap();

        let err = h
            .service
            .update_order(owner, view.id, UpdateOrderRequest::default())
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidInput { .. }));
    }

    #[test]
    fn test_expire_due_marks_and_counts() {
        let h = harness();
        let owner = seed_user(&h.store);
        let view = h.service.create_order(owner, bid(100, 50)).unwrap();

        let expired = h
            .service
            .expire_due(Utc::now() + chrono::Duration::hours(25))
            .unwrap();
        assert_eq!(expired, 1);
        assert_eq!(
            h.store.order(view.id).unwrap().status,
            OrderStatus::Expired
        );
    }

    #[test]
    fn test_account_summary_counts_open_lots() {
        let h = harness();
        let owner = seed_user(&h.store);
        h.service.create_order(owner, bid(100, 50)).unwrap();
        h.service.create_order(owner, bid(99, 25)).unwrap();

        let summary = h.service.account_summary(owner).unwrap();
        assert_eq!(summary.active_order_count, 2);
        assert_eq!(summary.open_bid_lots, 75);
        assert_eq!(summary.open_offer_lots, 0);
    }
}
