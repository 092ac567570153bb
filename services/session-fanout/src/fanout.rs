//! Session fan-out
//!
//! Consumes the event bus, resolves each event to its target rooms, and
//! pushes envelopes to live sessions plus text to the external messaging
//! channel for the handful of event types that warrant it.

use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use store::Store;
use types::events::{EventEnvelope, MarketEvent};
use types::ids::UserId;

use crate::rooms::{RoomRegistry, SessionId};
use crate::routing::{route, sink_payload};
use crate::sink::{MessageSink, SEND_TIMEOUT};

pub struct SessionFanout {
    registry: Mutex<RoomRegistry>,
    store: Arc<Store>,
    sink: Arc<dyn MessageSink>,
}

impl SessionFanout {
    pub fn new(store: Arc<Store>, sink: Arc<dyn MessageSink>) -> Arc<Self> {
        Arc::new(Self {
            registry: Mutex::new(RoomRegistry::new()),
            store,
            sink,
        })
    }

    /// Attach an authenticated session. The user is auto-joined to their
    /// private room and to the market room of every contract they hold an
    /// active order in.
    pub fn attach_session(
        &self,
        user: UserId,
    ) -> (SessionId, mpsc::UnboundedReceiver<EventEnvelope>) {
        let is_admin = self
            .store
            .user(user)
            .map(|u| u.is_admin)
            .unwrap_or(false);
        let contracts = self.store.active_contracts_for(user);
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self
            .registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .attach(user, is_admin, contracts, tx);
        info!(session = id, user = %user, "session attached");
        (id, rx)
    }

    pub fn detach_session(&self, id: SessionId) {
        self.registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .detach(id);
        debug!(session = id, "session detached");
    }

    pub fn session_count(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .session_count()
    }

    /// Pump the bus until it closes.
    pub async fn run(self: Arc<Self>, mut rx: broadcast::Receiver<EventEnvelope>) {
        loop {
            match rx.recv().await {
                Ok(envelope) => self.dispatch(envelope).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "fanout lagged behind the bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// Deliver one envelope: session rooms first, then room-membership
    /// upkeep, then the messaging channel.
    pub async fn dispatch(&self, envelope: EventEnvelope) {
        let rooms = route(&envelope.event);
        {
            let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
            for session in registry.members(&rooms) {
                if !registry.deliver(session, envelope.clone()) {
                    debug!(session, "session receiver gone; will detach on close");
                }
            }
        }

        self.sync_participation(&envelope.event);

        if let Some((user, text)) = sink_payload(&envelope.event) {
            self.send_to_handle(user, &text).await;
        }
    }

    /// Contract-room membership follows active-order participation: any
    /// event that can end a user's last active order in a contract
    /// re-syncs their rooms.
    fn sync_participation(&self, event: &MarketEvent) {
        let users: Vec<UserId> = match event {
            MarketEvent::OrderCancelled(v) | MarketEvent::OrderUpdated(v) => vec![v.owner],
            MarketEvent::TradeExecuted(t) => vec![t.buyer, t.seller],
            _ => return,
        };
        let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        for user in users {
            let contracts = self.store.active_contracts_for(user);
            registry.sync_market_rooms(user, &contracts);
        }
    }

    async fn send_to_handle(&self, user: UserId, text: &str) {
        let Some(handle) = self.store.user(user).and_then(|u| u.messaging_handle) else {
            return;
        };
        match tokio::time::timeout(SEND_TIMEOUT, self.sink.send(&handle, text)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(user = %user, error = %e, "messaging send failed"),
            Err(_) => warn!(user = %user, "messaging send abandoned after timeout"),
        }
    }
}
