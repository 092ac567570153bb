//! Journal record types
//!
//! Each record is the after-image of the rows a commit touched, so replay
//! is a straight application in sequence order.

use serde::{Deserialize, Serialize};
use types::order::Order;
use types::trade::Trade;
use types::user::User;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record")]
pub enum StoreRecord {
    UserInserted(User),
    OrderInserted(Order),
    OrderUpdated(Order),
    /// One atomic trade: the trade row plus both order after-images
    TradeCommitted {
        trade: Trade,
        bid_after: Order,
        offer_after: Order,
    },
}

impl StoreRecord {
    pub fn tag(&self) -> &'static str {
        match self {
            StoreRecord::UserInserted(_) => "user_inserted",
            StoreRecord::OrderInserted(_) => "order_inserted",
            StoreRecord::OrderUpdated(_) => "order_updated",
            StoreRecord::TradeCommitted { .. } => "trade_committed",
        }
    }
}
