//! Shared application state

use std::sync::Arc;

use jsonwebtoken::DecodingKey;

use matching_engine::MatchingEngine;
use order_book::OrderBookService;
use session_fanout::SessionFanout;
use store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub orders: Arc<OrderBookService>,
    pub engine: Arc<MatchingEngine>,
    pub fanout: Arc<SessionFanout>,
    pub auth: Arc<AuthKeys>,
}

/// Verification material for session tokens. Token issuance lives outside
/// the core; we only check what arrives.
pub struct AuthKeys {
    pub decoding: DecodingKey,
}

impl AuthKeys {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret),
        }
    }
}
