//! The matching engine
//!
//! Runs a periodic pass over every contract with active orders plus an
//! on-demand pass whenever the order book service reports a write. Trade
//! commits for one contract are serialized behind a per-contract lock;
//! different contracts proceed in parallel. The engine exclusively owns
//! pending quantity confirmations, the declined set, and alert throttling.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use market_cache::{keys, EventBus};
use order_book::MarketState;
use store::{Store, TradeCommit, TradeCommitRequest};
use types::config::EngineConfig;
use types::contract::ContractId;
use types::errors::ConfirmationError;
use types::events::{
    ConfirmationReceipt, ConfirmationRequest, DeclineCause, DeclineNotice, FillNotice,
    MarketEvent, NegotiationNotice, OrderView, TradeSide, TradeView,
};
use types::ids::{OrderId, UserId};
use types::numeric::Lots;
use types::order::{Order, Side};

use crate::alerts::AlertThrottle;
use crate::confirmation::{pair_key, ConfirmationBook, PendingConfirmation};
use crate::pairing::{select_pair, PairOutcome};

pub struct MatchingEngine {
    store: Arc<Store>,
    market: Arc<MarketState>,
    bus: EventBus,
    config: EngineConfig,
    confirmations: Mutex<ConfirmationBook>,
    alerts: Mutex<AlertThrottle>,
    /// Outstanding renegotiation invitations: pair key -> (invitee, deadline).
    negotiations: Mutex<HashMap<String, (UserId, DateTime<Utc>)>>,
    /// Per-contract serialization of the match-commit section.
    contract_locks: DashMap<ContractId, Arc<tokio::sync::Mutex<()>>>,
    /// Short-TTL mirror of visible orders for pass planning only; trades
    /// always re-read the store inside the commit.
    mirror: DashMap<ContractId, (Instant, Vec<Order>)>,
}

impl MatchingEngine {
    pub fn new(store: Arc<Store>, market: Arc<MarketState>, config: EngineConfig) -> Arc<Self> {
        let bus = market.bus().clone();
        Arc::new(Self {
            store,
            market,
            bus,
            config,
            confirmations: Mutex::new(ConfirmationBook::new()),
            alerts: Mutex::new(AlertThrottle::new()),
            negotiations: Mutex::new(HashMap::new()),
            contract_locks: DashMap::new(),
            mirror: DashMap::new(),
        })
    }

    /// Drive the periodic tick and on-demand pass requests forever.
    pub async fn run(self: Arc<Self>, mut pass_rx: mpsc::UnboundedReceiver<ContractId>) {
        let mut tick =
            tokio::time::interval(Duration::from_millis(self.config.matching_interval_ms));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    Arc::clone(&self).periodic_pass().await;
                }
                request = pass_rx.recv() => {
                    match request {
                        Some(contract) => {
                            // A write just happened; the mirror is stale.
                            self.invalidate_mirror(&contract);
                            Arc::clone(&self).match_contract(contract).await;
                        }
                        None => break,
                    }
                }
            }
        }
    }

    /// One pass over every contract with active orders, bounded by one
    /// tick of wall clock; leftover contracts roll to the next tick.
    pub async fn periodic_pass(self: Arc<Self>) {
        let cache = self.market.cache();
        let active = cache
            .get::<bool>(keys::HAS_ACTIVE_ORDERS)
            .unwrap_or_else(|| self.store.has_active_orders());
        cache.put(keys::HAS_ACTIVE_ORDERS, &active, keys::FLAG_TTL);
        if !active {
            return;
        }
        cache.put(keys::LAST_RUN, &Utc::now(), keys::FLAG_TTL);

        let budget = Duration::from_millis(self.config.matching_interval_ms);
        let started = Instant::now();
        for contract in self.store.contracts_with_active_orders() {
            if started.elapsed() >= budget {
                warn!("matching pass budget exhausted; remaining contracts roll over");
                break;
            }
            Arc::clone(&self).match_contract(contract).await;
        }
    }

    /// Match one contract: find the best eligible pair and trade, alert,
    /// or open a quantity confirmation.
    pub async fn match_contract(self: Arc<Self>, contract: ContractId) {
        let lock = self.contract_lock(&contract);
        let _guard = lock.lock().await;

        let orders = self.load_book(&contract);
        match select_pair(&orders) {
            PairOutcome::Empty => {}
            PairOutcome::Spread { bid, offer } => self.send_spread_alerts(&bid, &offer),
            PairOutcome::Crossed { bid, offer } => {
                if bid.remaining_qty == offer.remaining_qty {
                    self.execute_pair(&contract, bid.id, offer.id, None);
                } else if let Some((key, wait)) = self.open_confirmation(&bid, &offer) {
                    let engine = Arc::clone(&self);
                    tokio::spawn(async move {
                        tokio::time::sleep(wait).await;
                        engine.handle_deadline(&key);
                    });
                }
            }
        }
    }

    // ── Trade execution ─────────────────────────────────────────────

    /// Commit one trade. The caller holds the contract lock. A failed
    /// commit leaves both orders untouched and the next pass retries.
    fn execute_pair(
        &self,
        contract: &ContractId,
        bid_id: OrderId,
        offer_id: OrderId,
        lift: Option<(OrderId, Lots)>,
    ) -> Option<TradeCommit> {
        let request = TradeCommitRequest {
            bid_id,
            offer_id,
            lift,
            commission_rate: self.config.commission_rate,
            now: Utc::now(),
        };
        match self.store.commit_trade(request) {
            Ok(commit) => {
                info!(
                    trade = %commit.trade.id,
                    contract = %contract,
                    qty = %commit.trade.qty,
                    price = %commit.trade.price,
                    "trade executed"
                );
                self.post_commit(contract, &commit);
                Some(commit)
            }
            Err(e) if e.is_transient() => {
                warn!(contract = %contract, error = %e, "trade commit failed; will retry");
                None
            }
            Err(e) => {
                // The book moved under us; the next pass sees fresh rows.
                debug!(contract = %contract, error = %e, "pair no longer tradable");
                None
            }
        }
    }

    /// Best-effort notifications after the point of no return.
    fn post_commit(&self, contract: &ContractId, commit: &TradeCommit) {
        self.invalidate_mirror(contract);
        self.market.refresh(contract);

        let trade = &commit.trade;
        self.bus
            .publish(MarketEvent::TradeExecuted(TradeView::from_trade(
                trade,
                commit.class,
            )));

        for (order, side) in [
            (&commit.bid_after, Side::Bid),
            (&commit.offer_after, Side::Offer),
        ] {
            let verb = match side {
                Side::Bid => "bought",
                Side::Offer => "sold",
            };
            self.bus.publish(MarketEvent::OrderMatched(FillNotice {
                order_id: order.id,
                owner: order.owner,
                contract: contract.clone(),
                side,
                price: trade.price,
                qty: trade.qty,
                remaining_qty: order.remaining_qty,
                message: format!(
                    "Order {} matched: {} {} lots of {} @ {}.",
                    order.id.short(),
                    verb,
                    trade.qty,
                    contract,
                    trade.price
                ),
            }));

            let notice = FillNotice {
                order_id: order.id,
                owner: order.owner,
                contract: contract.clone(),
                side,
                price: trade.price,
                qty: trade.qty,
                remaining_qty: order.remaining_qty,
                message: if order.remaining_qty.is_zero() {
                    format!("Order {} is fully filled.", order.id.short())
                } else {
                    format!(
                        "Order {} partially filled; {} lots remaining.",
                        order.id.short(),
                        order.remaining_qty
                    )
                },
            };
            if order.remaining_qty.is_zero() {
                self.bus.publish(MarketEvent::OrderFilled(notice));
            } else {
                self.bus.publish(MarketEvent::OrderPartialFill(notice));
            }
        }
    }

    // ── Quantity confirmation protocol ──────────────────────────────

    /// Open a confirmation for a price-matched, quantity-mismatched pair.
    /// Returns the key and deadline delay for the caller to schedule, or
    /// None when the pair is declined or already pending.
    fn open_confirmation(&self, bid: &Order, offer: &Order) -> Option<(String, Duration)> {
        let key = pair_key(&bid.contract, bid.id, offer.id);
        let deadline_secs = self.config.qcsm_deadline_secs;
        let pending = {
            let mut book = self.confirmations.lock().unwrap_or_else(|e| e.into_inner());
            if book.is_declined(&key, bid, offer) {
                debug!(key = %key, "pair previously declined; not re-offering");
                return None;
            }
            if book.has_pending(&key) {
                return None;
            }

            let buyer_is_smaller = bid.remaining_qty < offer.remaining_qty;
            let (smaller, larger, smaller_side) = if buyer_is_smaller {
                (bid, offer, TradeSide::Buy)
            } else {
                (offer, bid, TradeSide::Sell)
            };
            let pending = PendingConfirmation {
                key: key.clone(),
                contract: bid.contract.clone(),
                bid_id: bid.id,
                offer_id: offer.id,
                smaller_side,
                smaller_user: smaller.owner,
                larger_user: larger.owner,
                smaller_order: smaller.id,
                larger_order: larger.id,
                smaller_qty: smaller.remaining_qty,
                larger_qty: larger.remaining_qty,
                price: offer.price,
                deadline: Utc::now() + chrono::Duration::seconds(deadline_secs as i64),
            };
            book.open(pending.clone()).ok()?;
            pending
        };

        info!(key = %pending.key, smaller = %pending.smaller_user, "quantity confirmation opened");
        self.bus
            .publish(MarketEvent::ConfirmationRequested(ConfirmationRequest {
                confirmation_key: pending.key.clone(),
                user: pending.smaller_user,
                contract: pending.contract.clone(),
                your_order_id: pending.smaller_order,
                counterparty_order_id: pending.larger_order,
                your_qty: pending.smaller_qty,
                counterparty_qty: pending.larger_qty,
                additional_qty: pending.additional_qty(),
                price: pending.price,
                side: pending.smaller_side,
                message: format!(
                    "A counterparty has {} lots of {} at your price of {}; you have {}. \
                     Reply YES {} to raise your order by {} lots and trade the full {}, \
                     or NO {} to keep your order as it is.",
                    pending.larger_qty,
                    pending.contract,
                    pending.price,
                    pending.smaller_qty,
                    pending.smaller_order.short(),
                    pending.additional_qty(),
                    pending.larger_qty,
                    pending.smaller_order.short(),
                ),
                deadline_seconds: deadline_secs,
            }));
        Some((key, Duration::from_secs(deadline_secs)))
    }

    /// Deadline expiry: an implicit NO unless a response already settled
    /// the confirmation.
    pub fn handle_deadline(&self, key: &str) {
        let pending = {
            let mut book = self.confirmations.lock().unwrap_or_else(|e| e.into_inner());
            match book.get(key) {
                Some(p) if p.is_past_deadline(Utc::now()) => book.take(key),
                _ => None,
            }
        };
        if let Some(pending) = pending {
            info!(key = %key, "confirmation deadline expired");
            self.finish_declined(pending, DeclineCause::TimedOut);
        }
    }

    /// A structured response from the session channel.
    pub async fn handle_session_response(
        self: Arc<Self>,
        user: UserId,
        key: &str,
        accepted: bool,
        new_qty: Option<u32>,
    ) -> Result<(), ConfirmationError> {
        let (pending, target) = {
            let mut book = self.confirmations.lock().unwrap_or_else(|e| e.into_inner());
            let pending = book.get(key).ok_or(ConfirmationError::UnknownKey {
                token: key.to_string(),
            })?;
            if pending.smaller_user != user {
                return Err(ConfirmationError::NotParty);
            }
            if pending.is_past_deadline(Utc::now()) {
                // Late responses are discarded; the deadline task declines.
                return Err(ConfirmationError::Expired);
            }
            // Resolve the quantity before removing anything: a malformed
            // accept is reported and the confirmation stays pending.
            let target = if accepted {
                Some(pending.confirmed_qty(new_qty)?)
            } else {
                None
            };
            (
                book.take(key).expect("checked present under the same lock"),
                target,
            )
        };

        match target {
            Some(target) => {
                self.accept_confirmation(pending, target).await;
                Ok(())
            }
            None => {
                info!(key = %key, "confirmation declined by responder");
                self.finish_declined(pending, DeclineCause::Declined);
                Ok(())
            }
        }
    }

    /// A free-text reply from the messaging channel. Returns the ack text
    /// for the responder.
    pub async fn handle_text_reply(
        self: Arc<Self>,
        sender_handle: &str,
        text: &str,
    ) -> Result<String, ConfirmationError> {
        let reply = crate::inbound::parse_reply(text)?;
        let user = self
            .store
            .user_by_handle(sender_handle)
            .ok_or(ConfirmationError::NotParty)?;
        let key = {
            let book = self.confirmations.lock().unwrap_or_else(|e| e.into_inner());
            book.find_for_prefix(user.id, &reply.order_prefix)
                .map(|p| p.key.clone())
        }
        .ok_or(ConfirmationError::UnknownKey {
            token: reply.order_prefix.clone(),
        })?;

        let accepted = reply.accepted;
        self.handle_session_response(user.id, &key, accepted, None)
            .await?;
        Ok(if accepted {
            "Confirmed. Your order has been raised and the trade is executing.".to_string()
        } else {
            "Declined. Your order is unchanged.".to_string()
        })
    }

    /// The larger party answers a renegotiation invitation. Accepting
    /// clears the declined entry so the next pass can re-offer the pair.
    pub fn handle_negotiation_response(
        &self,
        user: UserId,
        key: &str,
        accepted: bool,
    ) -> Result<(), ConfirmationError> {
        let mut negotiations = self.negotiations.lock().unwrap_or_else(|e| e.into_inner());
        let (invitee, deadline) =
            negotiations
                .get(key)
                .copied()
                .ok_or(ConfirmationError::UnknownKey {
                    token: key.to_string(),
                })?;
        if invitee != user {
            return Err(ConfirmationError::NotParty);
        }
        if Utc::now() >= deadline {
            negotiations.remove(key);
            return Err(ConfirmationError::Expired);
        }
        negotiations.remove(key);
        drop(negotiations);
        if accepted {
            let mut book = self.confirmations.lock().unwrap_or_else(|e| e.into_inner());
            book.clear_declined(key);
            info!(key = %key, "renegotiation accepted; pair eligible again");
        }
        Ok(())
    }

    /// Run the accept path with an already-validated target quantity.
    async fn accept_confirmation(self: Arc<Self>, pending: PendingConfirmation, target: Lots) {
        // Raising to the current size is a no-op; the trade still runs.
        let lift = (target != pending.smaller_qty).then_some((pending.smaller_order, target));

        info!(key = %pending.key, new_qty = %target, "confirmation accepted");
        self.bus
            .publish(MarketEvent::PartialFillApproved(ConfirmationReceipt {
                confirmation_key: pending.key.clone(),
                user: pending.smaller_user,
                contract: pending.contract.clone(),
                new_qty: target,
            }));

        let lock = self.contract_lock(&pending.contract);
        let _guard = lock.lock().await;
        let commit = self.execute_pair(&pending.contract, pending.bid_id, pending.offer_id, lift);
        if commit.is_none() {
            warn!(key = %pending.key, "accepted confirmation could not trade");
            self.bus
                .publish(MarketEvent::PartialFillDeclined(DeclineNotice {
                    confirmation_key: pending.key.clone(),
                    user: pending.smaller_user,
                    contract: pending.contract.clone(),
                    order_id: pending.smaller_order,
                    cause: DeclineCause::Declined,
                    message: "The trade could not be executed; your orders are unchanged.".into(),
                }));
        }
    }

    /// Common tail of NO and timeout: memoize the pair, tell both sides,
    /// invite the larger party to renegotiate.
    fn finish_declined(&self, pending: PendingConfirmation, cause: DeclineCause) {
        {
            let mut book = self.confirmations.lock().unwrap_or_else(|e| e.into_inner());
            if let (Some(bid), Some(offer)) = (
                self.store.order(pending.bid_id),
                self.store.order(pending.offer_id),
            ) {
                if bid.is_active() && offer.is_active() {
                    book.mark_declined(&pending.key, &bid, &offer);
                }
            }
        }

        let (smaller_msg, larger_msg) = match cause {
            DeclineCause::Declined => (
                "You declined; no trade was executed and your order remains active.",
                "The counterparty declined the quantity increase; no trade was executed.",
            ),
            DeclineCause::TimedOut => (
                "The confirmation window closed; no trade was executed and your order remains active.",
                "The counterparty did not respond in time; no trade was executed.",
            ),
        };
        self.bus
            .publish(MarketEvent::PartialFillDeclined(DeclineNotice {
                confirmation_key: pending.key.clone(),
                user: pending.smaller_user,
                contract: pending.contract.clone(),
                order_id: pending.smaller_order,
                cause,
                message: smaller_msg.to_string(),
            }));
        self.bus
            .publish(MarketEvent::CounterpartyDeclined(DeclineNotice {
                confirmation_key: pending.key.clone(),
                user: pending.larger_user,
                contract: pending.contract.clone(),
                order_id: pending.larger_order,
                cause,
                message: larger_msg.to_string(),
            }));

        // Offer the larger party a renegotiation window.
        let deadline =
            Utc::now() + chrono::Duration::seconds(self.config.negotiation_deadline_secs as i64);
        self.negotiations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(pending.key.clone(), (pending.larger_user, deadline));
        self.bus
            .publish(MarketEvent::NegotiationYourTurn(NegotiationNotice {
                key: pending.key.clone(),
                user: pending.larger_user,
                contract: pending.contract.clone(),
                message: format!(
                    "Reply within {}s if you want the pair reconsidered after adjusting your order.",
                    self.config.negotiation_deadline_secs
                ),
                deadline_seconds: self.config.negotiation_deadline_secs,
            }));
    }

    // ── Alerts ──────────────────────────────────────────────────────

    fn send_spread_alerts(&self, bid: &Order, offer: &Order) {
        let alerts = {
            let mut throttle = self.alerts.lock().unwrap_or_else(|e| e.into_inner());
            throttle.collect(bid, offer, self.config.spread_alert_cap)
        };
        for alert in alerts {
            self.bus.publish(MarketEvent::MarketUpdate(alert));
        }
    }

    // ── Book mirror ─────────────────────────────────────────────────

    fn load_book(&self, contract: &ContractId) -> Vec<Order> {
        let ttl = Duration::from_secs(self.config.order_book_mirror_ttl_secs);
        if let Some(entry) = self.mirror.get(contract) {
            let (cached_at, orders) = entry.value();
            if cached_at.elapsed() < ttl {
                return orders.clone();
            }
        }
        let orders = self.store.visible_orders_for_contract(contract);
        self.mirror
            .insert(contract.clone(), (Instant::now(), orders.clone()));
        orders
    }

    /// Drop the planning mirror for a contract. Every write path calls
    /// this so the next pass reads fresh rows.
    pub fn invalidate_mirror(&self, contract: &ContractId) {
        self.mirror.remove(contract);
    }

    fn contract_lock(&self, contract: &ContractId) -> Arc<tokio::sync::Mutex<()>> {
        self.contract_locks
            .entry(contract.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Pending confirmations currently outstanding (health output).
    pub fn pending_confirmations(&self) -> usize {
        self.confirmations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pending_count()
    }

    /// The order views the engine would plan a pass with right now.
    pub fn planning_view(&self, contract: &ContractId) -> Vec<OrderView> {
        self.load_book(contract)
            .iter()
            .map(OrderView::from)
            .collect()
    }
}
