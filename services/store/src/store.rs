//! The persistent store
//!
//! Single-writer relational tables behind one lock, journaled before any
//! mutation returns. The trade commit is the one multi-row transaction:
//! both orders are re-read and re-validated inside the lock, so no cached
//! view can ever be the basis of a fill.

use std::path::Path;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::info;

use types::contract::ContractId;
use types::ids::{OrderId, UserId};
use types::numeric::Lots;
use types::order::Order;
use types::trade::{commission, FillClass, Trade};
use types::user::User;

use crate::error::StoreError;
use crate::journal::{replay, Journal};
use crate::records::StoreRecord;
use crate::tables::Tables;

/// Request for the atomic trade transaction.
#[derive(Debug, Clone)]
pub struct TradeCommitRequest {
    pub bid_id: OrderId,
    pub offer_id: OrderId,
    /// Confirmation-accept path: raise this order to the given quantity
    /// before computing the fill.
    pub lift: Option<(OrderId, Lots)>,
    pub commission_rate: Decimal,
    pub now: DateTime<Utc>,
}

/// Result of a committed trade transaction.
#[derive(Debug, Clone)]
pub struct TradeCommit {
    pub trade: Trade,
    pub bid_after: Order,
    pub offer_after: Order,
    pub class: FillClass,
}

struct Inner {
    tables: Tables,
    journal: Option<Journal>,
}

impl Inner {
    fn journal_append(&mut self, record: &StoreRecord, now_ms: i64, durable: bool) -> Result<(), StoreError> {
        if let Some(journal) = self.journal.as_mut() {
            journal.append(record, now_ms, durable)?;
        }
        Ok(())
    }
}

/// Durable record of users, orders, and trades.
pub struct Store {
    inner: RwLock<Inner>,
}

impl Store {
    /// In-memory store with no journal (tests, ephemeral runs).
    pub fn ephemeral() -> Self {
        Self {
            inner: RwLock::new(Inner {
                tables: Tables::default(),
                journal: None,
            }),
        }
    }

    /// Open a journaled store, replaying any existing journal first.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let replayed = replay(path)?;
        let mut tables = Tables::default();
        let count = replayed.records.len();
        for record in replayed.records {
            tables.apply(record);
        }
        info!(records = count, path = %path.display(), "store recovered");
        let journal = Journal::open(path, replayed.next_sequence)?;
        Ok(Self {
            inner: RwLock::new(Inner {
                tables,
                journal: Some(journal),
            }),
        })
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    // ── Users ───────────────────────────────────────────────────────

    pub fn insert_user(&self, user: User) -> Result<(), StoreError> {
        let mut inner = self.write();
        if inner.tables.user(user.id).is_some() {
            return Err(StoreError::Duplicate { entity: "user" });
        }
        let record = StoreRecord::UserInserted(user.clone());
        inner.journal_append(&record, Utc::now().timestamp_millis(), false)?;
        inner.tables.insert_user(user)
    }

    pub fn user(&self, id: UserId) -> Option<User> {
        self.read().tables.user(id).cloned()
    }

    pub fn user_by_handle(&self, handle: &str) -> Option<User> {
        self.read().tables.user_by_handle(handle).cloned()
    }

    // ── Orders ──────────────────────────────────────────────────────

    pub fn insert_order(&self, order: Order) -> Result<(), StoreError> {
        let mut inner = self.write();
        if inner.tables.user(order.owner).is_none() {
            return Err(StoreError::ForeignKey(format!(
                "order owner {} does not exist",
                order.owner
            )));
        }
        if inner.tables.order(order.id).is_some() {
            return Err(StoreError::Duplicate { entity: "order" });
        }
        let record = StoreRecord::OrderInserted(order.clone());
        inner.journal_append(&record, order.created_at.timestamp_millis(), false)?;
        inner.tables.insert_order(order)
    }

    pub fn order(&self, id: OrderId) -> Option<Order> {
        self.read().tables.order(id).cloned()
    }

    /// Atomically mutate one order.
    ///
    /// The closure runs on a copy under the write lock; nothing is applied
    /// or journaled unless it succeeds, so a failing precondition check
    /// leaves the row untouched.
    pub fn update_order<T, E>(
        &self,
        id: OrderId,
        f: impl FnOnce(&mut Order) -> Result<T, E>,
    ) -> Result<(T, Order), E>
    where
        E: From<StoreError>,
    {
        let mut inner = self.write();
        let mut order = inner
            .tables
            .order(id)
            .cloned()
            .ok_or(StoreError::NotFound { entity: "order" })?;
        let value = f(&mut order)?;
        let record = StoreRecord::OrderUpdated(order.clone());
        inner.journal_append(&record, order.updated_at.timestamp_millis(), false)?;
        inner.tables.put_order(order.clone());
        Ok((value, order))
    }

    pub fn orders_for_user(&self, owner: UserId) -> Vec<Order> {
        self.read()
            .tables
            .orders()
            .filter(|o| o.owner == owner)
            .cloned()
            .collect()
    }

    pub fn active_order_count(&self, owner: UserId) -> usize {
        self.read()
            .tables
            .orders()
            .filter(|o| o.owner == owner && o.is_active())
            .count()
    }

    pub fn visible_orders_for_contract(&self, contract: &ContractId) -> Vec<Order> {
        self.read().tables.visible_orders_for_contract(contract)
    }

    pub fn has_active_orders(&self) -> bool {
        self.read().tables.orders().any(|o| o.is_visible())
    }

    pub fn contracts_with_active_orders(&self) -> Vec<ContractId> {
        self.read().tables.contracts_with_visible_orders()
    }

    pub fn active_contracts_for(&self, owner: UserId) -> Vec<ContractId> {
        let inner = self.read();
        let mut contracts: Vec<ContractId> = inner
            .tables
            .orders()
            .filter(|o| o.owner == owner && o.is_visible())
            .map(|o| o.contract.clone())
            .collect();
        contracts.sort();
        contracts.dedup();
        contracts
    }

    /// Mark every overdue active order expired; returns the after-images.
    pub fn expire_due_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>, StoreError> {
        let mut inner = self.write();
        let due: Vec<OrderId> = inner
            .tables
            .orders()
            .filter(|o| o.is_active() && o.is_due(now))
            .map(|o| o.id)
            .collect();
        let mut expired = Vec::with_capacity(due.len());
        for id in due {
            let mut order = inner.tables.order(id).cloned().expect("row vanished");
            order.expire(now);
            let record = StoreRecord::OrderUpdated(order.clone());
            inner.journal_append(&record, now.timestamp_millis(), false)?;
            inner.tables.put_order(order.clone());
            expired.push(order);
        }
        Ok(expired)
    }

    // ── Trades ──────────────────────────────────────────────────────

    pub fn recent_trades(&self, limit: usize) -> Vec<Trade> {
        let inner = self.read();
        let trades = inner.tables.trades();
        trades.iter().rev().take(limit).cloned().collect()
    }

    pub fn trades_for_user(&self, owner: UserId, limit: usize) -> Vec<Trade> {
        let inner = self.read();
        inner
            .tables
            .trades()
            .iter()
            .rev()
            .filter(|t| t.buyer == owner || t.seller == owner)
            .take(limit)
            .cloned()
            .collect()
    }

    /// The atomic trade transaction.
    ///
    /// Re-reads both orders under the write lock, validates every
    /// precondition against current rows, applies the optional quantity
    /// lift, fills both sides, and appends a single durable journal
    /// record. Any failure leaves every row exactly as it was.
    pub fn commit_trade(&self, req: TradeCommitRequest) -> Result<TradeCommit, StoreError> {
        let mut inner = self.write();

        let mut bid = inner
            .tables
            .order(req.bid_id)
            .cloned()
            .ok_or(StoreError::NotFound { entity: "bid order" })?;
        let mut offer = inner
            .tables
            .order(req.offer_id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "offer order",
            })?;

        if bid.side != types::order::Side::Bid || offer.side != types::order::Side::Offer {
            return Err(StoreError::ForeignKey(
                "bid/offer ids do not name a bid and an offer".into(),
            ));
        }
        if bid.contract != offer.contract {
            return Err(StoreError::ContractMismatch);
        }
        for order in [&bid, &offer] {
            if !order.is_active() {
                return Err(StoreError::Inactive {
                    status: order.status,
                });
            }
        }
        if bid.owner == offer.owner {
            return Err(StoreError::SelfTrade);
        }
        if bid.price < offer.price {
            return Err(StoreError::NotCrossed);
        }

        if let Some((lift_id, lift_qty)) = req.lift {
            let target = if lift_id == bid.id {
                &mut bid
            } else if lift_id == offer.id {
                &mut offer
            } else {
                return Err(StoreError::NotFound {
                    entity: "lift order",
                });
            };
            target.lift_to(lift_qty, req.now);
        }

        let qty = bid.remaining_qty.min(offer.remaining_qty);
        if qty.is_zero() {
            return Err(StoreError::Inactive { status: bid.status });
        }
        // Execution price is the resting offer's price.
        let price = offer.price;
        let fee = commission(qty, price, req.commission_rate);

        let class = if bid.remaining_qty == offer.remaining_qty {
            FillClass::FullMatch
        } else if bid.remaining_qty > offer.remaining_qty {
            FillClass::PartialFillBuyer
        } else {
            FillClass::PartialFillSeller
        };

        let trade = Trade::new(
            bid.contract.clone(),
            price,
            qty,
            bid.id,
            offer.id,
            bid.owner,
            offer.owner,
            fee,
            req.now,
        );

        bid.apply_fill(qty, offer.owner, req.now);
        offer.apply_fill(qty, bid.owner, req.now);

        let record = StoreRecord::TradeCommitted {
            trade: trade.clone(),
            bid_after: bid.clone(),
            offer_after: offer.clone(),
        };
        inner.journal_append(&record, req.now.timestamp_millis(), true)?;

        inner.tables.put_order(bid.clone());
        inner.tables.put_order(offer.clone());
        inner
            .tables
            .insert_trade(trade.clone())
            .expect("referential integrity verified above");

        Ok(TradeCommit {
            trade,
            bid_after: bid,
            offer_after: offer,
            class,
        })
    }
}
