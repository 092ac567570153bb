//! Shared domain types for the commodity-contract trading venue
//!
//! Identifier newtypes, contract identifiers, decimal price / integer lot
//! quantities, order and trade lifecycle types, the closed event taxonomy,
//! engine configuration, and the shared error enums.

pub mod config;
pub mod contract;
pub mod errors;
pub mod events;
pub mod ids;
pub mod numeric;
pub mod order;
pub mod trade;
pub mod user;
