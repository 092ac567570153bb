//! Process bootstrap: wire the store, cache, bus, fan-out, matching
//! engine, and order book service together, then serve the HTTP and
//! WebSocket surface.

mod auth;
mod error;
mod handlers;
mod router;
mod settings;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use market_cache::{EventBus, TtlCache};
use matching_engine::MatchingEngine;
use order_book::{MarketState, OrderBookService};
use session_fanout::{HttpMessageSink, MessageSink, NullSink, SessionFanout};
use store::Store;

use crate::settings::Settings;
use crate::state::{AppState, AuthKeys};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = Settings::load()?;
    info!(journal = %settings.journal_path, "starting venue core");

    let store = Arc::new(Store::open(&settings.journal_path)?);
    let cache = Arc::new(TtlCache::new());
    let bus = EventBus::new();
    let market = Arc::new(MarketState::new(store.clone(), cache, bus.clone()));

    let sink: Arc<dyn MessageSink> = match &settings.messaging_endpoint {
        Some(endpoint) => {
            info!(endpoint, "messaging sink enabled");
            Arc::new(HttpMessageSink::new(endpoint.clone()))
        }
        None => {
            warn!("no messaging endpoint configured; out-of-band notices are dropped");
            Arc::new(NullSink)
        }
    };
    let fanout = SessionFanout::new(store.clone(), sink);
    tokio::spawn(fanout.clone().run(bus.subscribe()));

    let (pass_tx, pass_rx) = mpsc::unbounded_channel();
    let engine = MatchingEngine::new(store.clone(), market.clone(), settings.engine.clone());
    tokio::spawn(engine.clone().run(pass_rx));

    let orders = Arc::new(OrderBookService::new(
        store.clone(),
        market,
        Some(pass_tx),
        settings.engine.clone(),
    ));

    // Expiry sweep rides the matching cadence.
    {
        let orders = orders.clone();
        let period = std::time::Duration::from_millis(settings.engine.matching_interval_ms);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            loop {
                tick.tick().await;
                match orders.expire_due(Utc::now()) {
                    Ok(0) => {}
                    Ok(n) => info!(expired = n, "expired overdue orders"),
                    Err(e) => warn!(error = %e, "expiry sweep failed"),
                }
            }
        });
    }

    let app_state = AppState {
        store,
        orders,
        engine,
        fanout,
        auth: Arc::new(AuthKeys::from_secret(settings.jwt_secret.as_bytes())),
    };
    let app = router::create_router(app_state);

    let addr: SocketAddr = settings.listen.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
