//! In-memory relations: users, orders, trades
//!
//! Orders reference users; trades reference users and orders on both
//! sides. Referential checks run on insert; replay applies after-images
//! without re-checking (they were checked when first committed).

use std::collections::HashMap;

use types::contract::ContractId;
use types::ids::{OrderId, UserId};
use types::order::Order;
use types::trade::Trade;
use types::user::User;

use crate::error::StoreError;
use crate::records::StoreRecord;

#[derive(Debug, Default)]
pub struct Tables {
    users: HashMap<UserId, User>,
    orders: HashMap<OrderId, Order>,
    /// Chronological, append-only
    trades: Vec<Trade>,
}

impl Tables {
    pub fn insert_user(&mut self, user: User) -> Result<(), StoreError> {
        if self.users.contains_key(&user.id) {
            return Err(StoreError::Duplicate { entity: "user" });
        }
        self.users.insert(user.id, user);
        Ok(())
    }

    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn user_by_handle(&self, handle: &str) -> Option<&User> {
        self.users
            .values()
            .find(|u| u.messaging_handle.as_deref() == Some(handle))
    }

    pub fn insert_order(&mut self, order: Order) -> Result<(), StoreError> {
        if !self.users.contains_key(&order.owner) {
            return Err(StoreError::ForeignKey(format!(
                "order owner {} does not exist",
                order.owner
            )));
        }
        if self.orders.contains_key(&order.id) {
            return Err(StoreError::Duplicate { entity: "order" });
        }
        self.orders.insert(order.id, order);
        Ok(())
    }

    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    pub fn order_mut(&mut self, id: OrderId) -> Option<&mut Order> {
        self.orders.get_mut(&id)
    }

    pub fn put_order(&mut self, order: Order) {
        self.orders.insert(order.id, order);
    }

    pub fn insert_trade(&mut self, trade: Trade) -> Result<(), StoreError> {
        for user in [trade.buyer, trade.seller] {
            if !self.users.contains_key(&user) {
                return Err(StoreError::ForeignKey(format!(
                    "trade party {} does not exist",
                    user
                )));
            }
        }
        for order in [trade.buyer_order, trade.seller_order] {
            if !self.orders.contains_key(&order) {
                return Err(StoreError::ForeignKey(format!(
                    "trade order {} does not exist",
                    order
                )));
            }
        }
        self.trades.push(trade);
        Ok(())
    }

    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// Apply one replayed journal record.
    pub fn apply(&mut self, record: StoreRecord) {
        match record {
            StoreRecord::UserInserted(user) => {
                self.users.insert(user.id, user);
            }
            StoreRecord::OrderInserted(order) | StoreRecord::OrderUpdated(order) => {
                self.orders.insert(order.id, order);
            }
            StoreRecord::TradeCommitted {
                trade,
                bid_after,
                offer_after,
            } => {
                self.orders.insert(bid_after.id, bid_after);
                self.orders.insert(offer_after.id, offer_after);
                self.trades.push(trade);
            }
        }
    }

    pub fn visible_orders_for_contract(&self, contract: &ContractId) -> Vec<Order> {
        self.orders
            .values()
            .filter(|o| o.is_visible() && &o.contract == contract)
            .cloned()
            .collect()
    }

    pub fn contracts_with_visible_orders(&self) -> Vec<ContractId> {
        let mut contracts: Vec<ContractId> = self
            .orders
            .values()
            .filter(|o| o.is_visible())
            .map(|o| o.contract.clone())
            .collect();
        contracts.sort();
        contracts.dedup();
        contracts
    }
}
