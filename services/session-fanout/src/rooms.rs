//! Session and room registry
//!
//! Sessions are addressed through rooms: a private per-user room, one room
//! per contract whose membership is everyone with an active order there,
//! and a global admin room. BTreeMaps keep iteration deterministic.

use std::collections::{BTreeMap, BTreeSet};

use tokio::sync::mpsc;

use types::contract::ContractId;
use types::events::EventEnvelope;
use types::ids::UserId;

/// Unique session identifier.
pub type SessionId = u64;

/// An addressable delivery group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Room {
    User(UserId),
    Market(ContractId),
    Admin,
}

#[derive(Debug)]
struct SessionState {
    user: UserId,
    tx: mpsc::UnboundedSender<EventEnvelope>,
}

/// Tracks connected sessions and their room memberships.
#[derive(Default)]
pub struct RoomRegistry {
    sessions: BTreeMap<SessionId, SessionState>,
    rooms: BTreeMap<Room, BTreeSet<SessionId>>,
    next_id: SessionId,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session: auto-joined to its user room, to the market
    /// room of every contract it holds an active order in, and to the
    /// admin room when flagged.
    pub fn attach(
        &mut self,
        user: UserId,
        is_admin: bool,
        active_contracts: Vec<ContractId>,
        tx: mpsc::UnboundedSender<EventEnvelope>,
    ) -> SessionId {
        self.next_id += 1;
        let id = self.next_id;
        self.sessions.insert(id, SessionState { user, tx });

        self.join(id, Room::User(user));
        for contract in active_contracts {
            self.join(id, Room::Market(contract));
        }
        if is_admin {
            self.join(id, Room::Admin);
        }
        id
    }

    /// Remove a session and every membership it held.
    pub fn detach(&mut self, id: SessionId) {
        self.sessions.remove(&id);
        for members in self.rooms.values_mut() {
            members.remove(&id);
        }
        self.rooms.retain(|_, members| !members.is_empty());
    }

    pub fn join(&mut self, id: SessionId, room: Room) {
        if self.sessions.contains_key(&id) {
            self.rooms.entry(room).or_default().insert(id);
        }
    }

    pub fn leave(&mut self, id: SessionId, room: &Room) {
        if let Some(members) = self.rooms.get_mut(room) {
            members.remove(&id);
            if members.is_empty() {
                self.rooms.remove(room);
            }
        }
    }

    /// Align a user's market-room memberships with the contracts they
    /// actually hold active orders in. Dropping the last active order in
    /// a contract drops them from that contract's room.
    pub fn sync_market_rooms(&mut self, user: UserId, active_contracts: &[ContractId]) {
        let session_ids: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.user == user)
            .map(|(id, _)| *id)
            .collect();

        let stale: Vec<Room> = self
            .rooms
            .keys()
            .filter(|room| match room {
                Room::Market(contract) => !active_contracts.contains(contract),
                _ => false,
            })
            .cloned()
            .collect();
        for room in stale {
            for id in &session_ids {
                self.leave(*id, &room);
            }
        }
        for contract in active_contracts {
            for id in &session_ids {
                self.join(*id, Room::Market(contract.clone()));
            }
        }
    }

    /// Session ids in any of the given rooms, deduplicated.
    pub fn members(&self, rooms: &[Room]) -> Vec<SessionId> {
        let mut ids = BTreeSet::new();
        for room in rooms {
            if let Some(members) = self.rooms.get(room) {
                ids.extend(members.iter().copied());
            }
        }
        ids.into_iter().collect()
    }

    /// Deliver to a session; false when the receiver is gone.
    pub fn deliver(&self, id: SessionId, envelope: EventEnvelope) -> bool {
        match self.sessions.get(&id) {
            Some(session) => session.tx.send(envelope).is_ok(),
            None => false,
        }
    }

    pub fn is_member(&self, id: SessionId, room: &Room) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|members| members.contains(&id))
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
