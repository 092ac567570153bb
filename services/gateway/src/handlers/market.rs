//! Read-only market and account endpoints

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use order_book::{AccountSummary, ContractBook};
use types::trade::Trade;

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TradeQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

pub async fn market_data(State(state): State<AppState>) -> Json<Vec<ContractBook>> {
    Json(state.orders.market_data())
}

pub async fn recent_trades(
    State(state): State<AppState>,
    Query(query): Query<TradeQuery>,
) -> Json<Vec<Trade>> {
    Json(state.orders.recent_trades(query.limit.min(100)))
}

pub async fn my_trades(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<TradeQuery>,
) -> Json<Vec<Trade>> {
    Json(state.orders.user_trades(user.user_id, query.limit.min(100)))
}

pub async fn account_summary(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<AccountSummary>, ApiError> {
    Ok(Json(state.orders.account_summary(user.user_id)?))
}
