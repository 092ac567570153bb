//! Route table

use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{market, orders, users, ws};
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/orders", post(orders::create_order).get(orders::list_orders))
        .route(
            "/orders/:id",
            patch(orders::update_order).delete(orders::cancel_order),
        )
        .route("/market", get(market::market_data))
        .route("/trades", get(market::recent_trades))
        .route("/trades/mine", get(market::my_trades))
        .route("/account", get(market::account_summary))
        .route("/ws", get(ws::ws_handler));

    // Trusted collaborators only; never expose publicly.
    let internal_routes = Router::new().route("/users", post(users::create_user));

    Router::new()
        .nest("/v1", api_routes)
        .nest("/internal", internal_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
