//! Persistent store for the trading venue
//!
//! Users, orders, and trades with referential integrity, an atomic trade
//! transaction, and an append-only CRC32C journal replayed on startup.

pub mod error;
pub mod journal;
pub mod records;
pub mod store;
pub mod tables;

pub use error::StoreError;
pub use records::StoreRecord;
pub use store::{Store, TradeCommit, TradeCommitRequest};
