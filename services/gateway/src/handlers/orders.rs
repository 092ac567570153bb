//! Order lifecycle endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use order_book::{CreateOrderRequest, UpdateOrderRequest};
use types::events::OrderView;
use types::ids::OrderId;

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::state::AppState;

pub async fn create_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<OrderView>, ApiError> {
    let view = state.orders.create_order(user.user_id, payload)?;
    Ok(Json(view))
}

pub async fn update_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<OrderId>,
    Json(payload): Json<UpdateOrderRequest>,
) -> Result<Json<OrderView>, ApiError> {
    let view = state.orders.update_order(user.user_id, order_id, payload)?;
    Ok(Json(view))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<OrderId>,
) -> Result<Json<Value>, ApiError> {
    let view = state.orders.cancel_order(user.user_id, order_id)?;
    Ok(Json(json!({
        "cancelled": view.id,
        "status": view.status,
    })))
}

pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Json<Vec<OrderView>> {
    Json(state.orders.user_orders(user.user_id))
}
