//! Matching engine
//!
//! Per-contract price-time matching, atomic trade execution, the
//! quantity-confirmation protocol for price-equal quantity mismatches,
//! and competitive-quote alerting.

pub mod alerts;
pub mod confirmation;
pub mod engine;
pub mod inbound;
pub mod pairing;

pub use confirmation::{pair_key, PendingConfirmation};
pub use engine::MatchingEngine;
pub use inbound::{parse_reply, TextReply};
pub use pairing::{select_pair, PairOutcome};
