//! Order book service
//!
//! Single writer for order lifecycle state: validation, persistence,
//! lifecycle events, best-price snapshots, and match scheduling.

pub mod market_state;
pub mod requests;
pub mod service;
pub mod validate;

pub use market_state::{best_prices, BestPrices, MarketState};
pub use requests::{CreateOrderRequest, UpdateOrderRequest};
pub use service::{AccountSummary, ContractBook, OrderBookService};
