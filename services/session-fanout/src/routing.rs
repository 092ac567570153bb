//! The event routing matrix
//!
//! One match from event variant to target rooms. Users only see a
//! contract's stream while they hold an active order in it, so anything
//! party-specific goes to the private user room, and only genuinely
//! market-wide events reach the contract room.

use types::events::MarketEvent;
use types::order::Side;

use crate::rooms::Room;

/// Rooms an event is delivered to.
pub fn route(event: &MarketEvent) -> Vec<Room> {
    match event {
        MarketEvent::OrderCreated(v) => vec![Room::User(v.owner)],
        // Offer-side edits are market-visible; bid-side edits stay private.
        MarketEvent::OrderUpdated(v) => match v.side {
            Side::Offer => vec![Room::User(v.owner), Room::Market(v.contract.clone())],
            Side::Bid => vec![Room::User(v.owner)],
        },
        MarketEvent::OrderCancelled(v) => vec![Room::User(v.owner)],
        MarketEvent::TradeExecuted(t) => vec![
            Room::User(t.buyer),
            Room::User(t.seller),
            Room::Market(t.contract.clone()),
        ],
        MarketEvent::PriceChanged(c) => vec![Room::Market(c.contract.clone())],
        MarketEvent::MarketUpdate(q) => vec![Room::User(q.user)],
        MarketEvent::OrderMatched(n)
        | MarketEvent::OrderFilled(n)
        | MarketEvent::OrderPartialFill(n) => vec![Room::User(n.owner)],
        MarketEvent::ConfirmationRequested(r) => vec![Room::User(r.user)],
        MarketEvent::PartialFillApproved(r) => vec![Room::User(r.user)],
        MarketEvent::PartialFillDeclined(n) | MarketEvent::CounterpartyDeclined(n) => {
            vec![Room::User(n.user)]
        }
        MarketEvent::NegotiationYourTurn(n) => vec![Room::User(n.user)],
    }
}

/// Text worth pushing to the external messaging channel, with its
/// recipient. Session-only events return None.
pub fn sink_payload(event: &MarketEvent) -> Option<(types::ids::UserId, String)> {
    match event {
        MarketEvent::ConfirmationRequested(r) => Some((r.user, r.message.clone())),
        MarketEvent::OrderFilled(n) | MarketEvent::OrderPartialFill(n) => {
            Some((n.owner, n.message.clone()))
        }
        MarketEvent::OrderCancelled(v) => Some((
            v.owner,
            format!("Order {} on {} has been cancelled.", v.id, v.contract),
        )),
        MarketEvent::PartialFillDeclined(n) | MarketEvent::CounterpartyDeclined(n) => {
            Some((n.user, n.message.clone()))
        }
        _ => None,
    }
}
